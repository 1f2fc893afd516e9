//! Report rendering.
//!
//! Two shapes: a commented text table for eyeballing and piping into
//! plotting tools, and the full report as JSON. Both carry every raw
//! sample; summarizing is left to whatever consumes them.

use anyhow::Result;
use corelat_common::{MatrixReport, PairReport};
use std::io::Write;

/// Render the report as a commented text table.
pub fn write_text<W: Write>(out: &mut W, report: &PairReport) -> Result<()> {
    writeln!(out, "# corelat pair report")?;
    writeln!(out, "# cores: {} -> {}", report.core_a, report.core_b)?;
    writeln!(out, "# timebase: {}", report.timebase)?;
    writeln!(
        out,
        "# fidelity: {} (hardware_timebase={} policy_elevated={} pinned={})",
        report.fidelity.class(),
        report.fidelity.hardware_timebase,
        report.fidelity.policy_elevated,
        report.fidelity.pinned
    )?;
    writeln!(out, "# round trips per sample: {}", report.round_trips)?;
    writeln!(out, "# columns: index one_way_ns round_trip_ns ticks migrated")?;
    for (index, sample) in report.samples.iter().enumerate() {
        writeln!(
            out,
            "{} {:.2} {:.2} {} {}",
            index,
            sample.one_way_ns,
            sample.round_trip_ns,
            sample.ticks,
            u8::from(sample.migrated)
        )?;
    }
    Ok(())
}

/// Render the report as pretty-printed JSON.
pub fn write_json<W: Write>(out: &mut W, report: &PairReport) -> Result<()> {
    let json = report.to_json()?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Render a matrix sweep as one pair-report section per measured pair.
pub fn write_matrix_text<W: Write>(out: &mut W, report: &MatrixReport) -> Result<()> {
    writeln!(out, "# corelat matrix report")?;
    writeln!(out, "# cores: {}", report.cores)?;
    writeln!(
        out,
        "# pairs measured: {} of {}",
        report.reports.len(),
        report.cores * report.cores.saturating_sub(1)
    )?;
    for pair in &report.reports {
        writeln!(out)?;
        write_text(out, pair)?;
    }
    Ok(())
}

/// Render a matrix sweep as pretty-printed JSON.
pub fn write_matrix_json<W: Write>(out: &mut W, report: &MatrixReport) -> Result<()> {
    let json = report.to_json()?;
    writeln!(out, "{json}")?;
    Ok(())
}
