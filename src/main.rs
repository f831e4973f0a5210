//! rfm-dashboard: RFM segmentation dashboard CLI
//!
//! Loads the segmentation table once, then renders the dashboard for the
//! requested filters, either a single time or after every interactive command.

use anyhow::{Context, Result};
use clap::Parser;
use rfm_dashboard::{load_segment_table, report, run_session, viz, Args, Dashboard};
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();
    let table = load_segment_table(&args.input)
        .with_context(|| format!("cannot start dashboard from {}", args.input))?;

    let selection = args.selection(&table)?;
    let mut dashboard = Dashboard::new(
        &table,
        args.dashboard_config(),
        selection,
        args.view_toggles(),
    );
    debug!(elapsed_ms = start_time.elapsed().as_millis() as u64, "dashboard ready");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.interactive {
        let stdin = io::stdin();
        run_session(&mut dashboard, stdin.lock(), &mut out, |dashboard, out| {
            render(&args, dashboard, out)
        })?;
    } else {
        render(&args, &dashboard, &mut out)?;
    }

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "dashboard complete"
    );
    Ok(())
}

/// Recompute the snapshot and send it to every configured output
fn render<W: Write>(args: &Args, dashboard: &Dashboard<'_>, out: &mut W) -> Result<()> {
    let snapshot = dashboard.snapshot();
    report::render_report(&snapshot, dashboard.toggles(), out)?;

    if let Some(dir) = &args.output_dir {
        let charts = viz::render_charts(&snapshot, dashboard.toggles(), Path::new(dir))?;
        writeln!(out, "\n{} chart(s) saved to {}", charts.len(), dir)?;
    }
    if let Some(path) = &args.json {
        report::write_json(&snapshot, path)?;
        writeln!(out, "Snapshot saved to: {}", path)?;
    }

    Ok(())
}

/// Log to stderr; RUST_LOG overrides the level chosen by --verbose
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
