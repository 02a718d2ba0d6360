//! Markdown export implementation.
//!
//! Renders a report as Markdown for documentation and reporting.

use super::Exporter;
use crate::report::{format_size, AssetListing, Report};
use std::io::{self, Write};

/// Markdown exporter implementation.
pub struct MarkdownExporter;

fn write_listing<W: Write>(writer: &mut W, title: &str, listing: &AssetListing) -> io::Result<()> {
    writeln!(
        writer,
        "### {} ({} files, {})",
        title, listing.summary.files, listing.summary.size_human
    )?;
    writeln!(writer)?;
    if listing.items.is_empty() {
        writeln!(writer, "_None_")?;
        writeln!(writer)?;
        return Ok(());
    }
    writeln!(writer, "| Asset | Size | Referenced from |")?;
    writeln!(writer, "|-------|------|-----------------|")?;
    for item in &listing.items {
        writeln!(
            writer,
            "| `{}` | {} | {} |",
            item.path,
            item.size_human,
            item.references.join(", ")
        )?;
    }
    writeln!(writer)
}

impl Exporter for MarkdownExporter {
    fn export<W: Write>(&self, report: &Report, writer: &mut W) -> io::Result<()> {
        // Title
        writeln!(writer, "# Asset Optimization Report")?;
        writeln!(writer)?;
        writeln!(writer, "**Project:** {}", report.project)?;
        writeln!(
            writer,
            "**Mode:** {}{}",
            report.mode,
            if report.strict { " (strict)" } else { "" }
        )?;
        writeln!(writer)?;

        // Summary section
        writeln!(writer, "## Summary")?;
        writeln!(writer)?;
        writeln!(writer, "| Metric | Value |")?;
        writeln!(writer, "|--------|-------|")?;
        writeln!(writer, "| Before | {} |", report.before)?;
        writeln!(writer, "| After | {} |", report.after)?;
        writeln!(
            writer,
            "| Total saved | {} ({:.2}%) |",
            format_size(report.total_saved_bytes),
            report.total_saved_pct
        )?;
        writeln!(writer, "| Final weight | {} |", report.final_weight_human)?;
        if let Some(count) = report.api_compressions {
            writeln!(writer, "| API compressions this month | {} |", count)?;
        }
        writeln!(writer)?;

        if let Some(manifest) = &report.manifest {
            writeln!(writer, "## Deletion Manifest")?;
            writeln!(writer)?;
            writeln!(
                writer,
                "Wrote `{}` listing {}. Review it, then run `assetscope confirm-delete`.",
                manifest.path, manifest.summary
            )?;
            writeln!(writer)?;
        }

        if !report.compressed.is_empty() {
            writeln!(writer, "## Compression ({} files)", report.compressed.len())?;
            writeln!(writer)?;
            writeln!(writer, "| Asset | Before | After | Result |")?;
            writeln!(writer, "|-------|--------|-------|--------|")?;
            for outcome in &report.compressed {
                let result = match (&outcome.error_kind, outcome.replaced()) {
                    (Some(kind), _) => format!("failed: {}", kind),
                    (None, true) => "compressed".to_string(),
                    (None, false) => "already optimal".to_string(),
                };
                writeln!(
                    writer,
                    "| `{}` | {} | {} | {} |",
                    outcome.path,
                    format_size(outcome.before_bytes),
                    format_size(outcome.after_bytes),
                    result
                )?;
            }
            writeln!(writer)?;
        }

        if !report.deleted.is_empty() {
            writeln!(writer, "## Deleted ({} files)", report.deleted.len())?;
            writeln!(writer)?;
            writeln!(writer, "| Asset | Size | Backup |")?;
            writeln!(writer, "|-------|------|--------|")?;
            for file in &report.deleted {
                writeln!(
                    writer,
                    "| `{}` | {} | {} |",
                    file.path,
                    file.size_human,
                    file.backup_path.as_deref().unwrap_or("-")
                )?;
            }
            writeln!(writer)?;
        }

        if report.unused.is_some() || report.used.is_some() {
            writeln!(writer, "## Assets")?;
            writeln!(writer)?;
            if let Some(unused) = &report.unused {
                write_listing(writer, "Unused", unused)?;
            }
            if let Some(used) = &report.used {
                write_listing(writer, "Used", used)?;
            }
        }

        // Issues section (only if there are any)
        if !report.errors.is_empty() {
            writeln!(writer, "## Issues ({})", report.errors.len())?;
            writeln!(writer)?;
            for issue in &report.errors {
                writeln!(writer, "- {}", issue)?;
            }
            writeln!(writer)?;
        }

        // Footer
        writeln!(writer, "---")?;
        writeln!(writer, "*Generated by assetscope*")?;

        Ok(())
    }
}
