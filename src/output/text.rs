//! Human-readable reports.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::dedup::{Comparison, RecoveryAction, RecoveryReport, RunSummary};
use crate::dedup::descriptor::DescriptorReport;

/// Text renderer for command reports.
pub struct TextOutput;

impl TextOutput {
    /// Write the summary of a dedup run.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_summary<W: Write>(summary: &RunSummary, mut w: W) -> io::Result<()> {
        let heading = if summary.dry_run {
            "Dry run summary (nothing was changed)"
        } else {
            "Summary"
        };
        writeln!(w, "{}", heading.bold())?;
        writeln!(w, "  files visited:   {}", summary.files_visited)?;
        writeln!(w, "  representatives: {}", summary.registered)?;
        if summary.dry_run {
            writeln!(w, "  would link:      {}", summary.would_link.green())?;
        } else {
            writeln!(w, "  linked:          {}", summary.linked.green())?;
        }
        writeln!(w, "  already linked:  {}", summary.already_linked)?;
        if summary.already_indexed > 0 {
            writeln!(w, "  already indexed: {}", summary.already_indexed)?;
        }
        writeln!(w, "  distinct:        {}", summary.distinct)?;
        if summary.skipped > 0 {
            writeln!(w, "  skipped:         {}", summary.skipped)?;
        }
        writeln!(
            w,
            "  reclaimed:       {}",
            ByteSize::b(summary.bytes_reclaimed).green()
        )?;

        if summary.has_failures() {
            writeln!(w, "  failed:          {}", summary.failure_count().red())?;
            for failure in &summary.failures {
                writeln!(w, "    {}: {}", failure.path.display(), failure.error.red())?;
            }
        }
        if summary.interrupted {
            writeln!(w, "{}", "Interrupted before the walk completed".yellow())?;
        }
        Ok(())
    }

    /// Write the result of comparing two files.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_comparison<W: Write>(comparison: &Comparison, mut w: W) -> io::Result<()> {
        write_descriptor(&comparison.left, &mut w)?;
        write_descriptor(&comparison.right, &mut w)?;

        let verdict = format!("{:?}", comparison.verdict);
        if comparison.equivalent {
            writeln!(w, "verdict: {} (equivalent)", verdict.green())
        } else {
            writeln!(w, "verdict: {} (not equivalent)", verdict.yellow())
        }
    }

    /// Write the result of a recovery pass.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_recovery<W: Write>(report: &RecoveryReport, mut w: W) -> io::Result<()> {
        for entry in &report.entries {
            let action = match entry.action {
                RecoveryAction::Restored => entry.action.green(),
                RecoveryAction::Cleaned => entry.action.cyan(),
                RecoveryAction::Conflict => entry.action.red(),
            };
            writeln!(w, "{:>9} {}", action, entry.parked.display())?;
        }
        for failure in &report.failures {
            writeln!(w, "{:>9} {}: {}", "failed".red(), failure.path.display(), failure.error)?;
        }
        writeln!(
            w,
            "{} restored, {} cleaned, {} conflicts, {} failed",
            report.count(RecoveryAction::Restored),
            report.count(RecoveryAction::Cleaned),
            report.count(RecoveryAction::Conflict),
            report.failures.len()
        )
    }
}

fn write_descriptor<W: Write>(report: &DescriptorReport, w: &mut W) -> io::Result<()> {
    writeln!(w, "{}", report.path.display().bold())?;
    writeln!(w, "  {}", report.key)?;
    if let Some(digest) = &report.digest {
        writeln!(w, "  sha1={}", digest)?;
    }
    Ok(())
}
