//! JSON output for scripting.
//!
//! Every command prints one object:
//!
//! ```json
//! {
//!   "command": "dedup",
//!   "report": {
//!     "files_visited": 12,
//!     "registered": 9,
//!     "linked": 3,
//!     "bytes_reclaimed": 3072,
//!     "failures": [],
//!     "interrupted": false,
//!     "dry_run": false
//!   },
//!   "exit_code": 0,
//!   "exit_code_name": "LD000"
//! }
//! ```
//!
//! `report` is the serialized [`RunSummary`](crate::dedup::RunSummary),
//! [`Comparison`](crate::dedup::Comparison) or
//! [`RecoveryReport`](crate::dedup::RecoveryReport).

use std::io::Write;

use serde::Serialize;

use crate::error::ExitCode;

/// Envelope around a command's report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a, T: Serialize> {
    /// Name of the subcommand
    pub command: &'static str,
    /// The command's report
    pub report: &'a T,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "LD000")
    pub exit_code_name: &'static str,
}

impl<'a, T: Serialize> JsonOutput<'a, T> {
    /// Wrap `report` with the exit code of the run.
    #[must_use]
    pub fn new(command: &'static str, report: &'a T, exit_code: ExitCode) -> Self {
        Self {
            command,
            report,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)
    }
}
