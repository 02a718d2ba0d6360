//! Plain-text export implementation.
//!
//! A fixed-width terminal summary.

use super::Exporter;
use crate::report::{format_size, AssetListing, Report};
use std::io::{self, Write};

const RULE_WIDTH: usize = 60;
const LISTING_LIMIT: usize = 15;

/// Plain-text exporter implementation.
pub struct TextExporter;

fn write_listing<W: Write>(
    writer: &mut W,
    title: &str,
    listing: &AssetListing,
    limit: Option<usize>,
) -> io::Result<()> {
    if listing.items.is_empty() {
        return Ok(());
    }
    writeln!(writer, "  {} ({}):", title, listing.summary)?;
    let shown = limit.unwrap_or(listing.items.len()).min(listing.items.len());
    for item in &listing.items[..shown] {
        writeln!(writer, "    {:<50} {:>10}", item.path, item.size_human)?;
    }
    if shown < listing.items.len() {
        writeln!(writer, "    ... and {} more", listing.items.len() - shown)?;
    }
    writeln!(writer)
}

impl Exporter for TextExporter {
    fn export<W: Write>(&self, report: &Report, writer: &mut W) -> io::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(writer, "{}", rule)?;
        writeln!(writer, "  Asset Optimization Report ({})", report.mode)?;
        writeln!(writer, "{}", rule)?;
        writeln!(writer, "  Project:          {}", report.project)?;
        if report.strict {
            writeln!(writer, "  Strict mode:      commented references ignored")?;
        }
        writeln!(writer)?;
        writeln!(writer, "  Before:           {}", report.before)?;
        writeln!(writer, "  After:            {}", report.after)?;
        writeln!(writer)?;

        if !report.compressed.is_empty() {
            let replaced = report.replaced().count();
            let failed = report.failed().count();
            let optimal = report.compressed.len() - replaced - failed;
            writeln!(writer, "  Compressed:       {} files", replaced)?;
            if optimal > 0 {
                writeln!(writer, "  Already optimal:  {} files", optimal)?;
            }
            if failed > 0 {
                writeln!(writer, "  Compress errors:  {}", failed)?;
            }
        }
        if !report.deleted.is_empty() {
            let bytes: u64 = report.deleted.iter().map(|d| d.size_bytes).sum();
            writeln!(
                writer,
                "  Deleted unused:   {} files ({} removed)",
                report.deleted.len(),
                format_size(bytes)
            )?;
        }
        if let Some(manifest) = &report.manifest {
            writeln!(writer, "  Manifest:         {} ({})", manifest.path, manifest.summary)?;
        }
        writeln!(writer)?;

        if let Some(unused) = &report.unused {
            write_listing(writer, "UNUSED ASSETS", unused, None)?;
        }
        if let Some(used) = &report.used {
            write_listing(writer, "USED ASSETS", used, Some(LISTING_LIMIT))?;
        }

        writeln!(
            writer,
            "  Total reduction:  {} saved ({:.1}%)",
            format_size(report.total_saved_bytes),
            report.total_saved_pct
        )?;
        writeln!(writer, "  Final ad weight:  {}", report.final_weight_human)?;
        if let Some(count) = report.api_compressions {
            writeln!(writer, "  API compressions: {} used this month", count)?;
        }

        if !report.errors.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "  Issues ({}):", report.errors.len())?;
            for issue in &report.errors {
                writeln!(writer, "    {}", issue)?;
            }
        }
        writeln!(writer, "{}", rule)?;
        Ok(())
    }
}
