//! Report formatters.
//!
//! - [`text`]: human-readable summaries with colors
//! - [`json`]: machine-readable output for scripting
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::dedup::RunSummary;
//! use linkdupe::error::ExitCode;
//! use linkdupe::output::{JsonOutput, TextOutput};
//!
//! let summary = RunSummary::default();
//! TextOutput::write_summary(&summary, std::io::stdout()).unwrap();
//! JsonOutput::new("dedup", &summary, ExitCode::Success)
//!     .write_to(std::io::stdout())
//!     .unwrap();
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::TextOutput;
