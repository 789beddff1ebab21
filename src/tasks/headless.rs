//! One-shot task runs for the `analyze` and `defrag` subcommands

use anyhow::Result;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{CoordinatorUpdate, TaskCoordinator, TaskEvent, TaskKind};
use crate::config::Config;
use crate::fragmentation::{CellCategory, FragmentationReport, MapSynthesizer};
use crate::integrations::devices::{find_device, list_devices, BlockDevice};
use crate::integrations::runner::{Elevation, SystemRunner};

/// Run a single task of `kind` against the device matching `query`
pub async fn run_once(config: &Config, kind: TaskKind, query: &str) -> Result<FragmentationReport> {
    let device = find_device(list_devices(&config.tools.lister).await?, query)?;
    let elevation = Elevation::detect(&config.tools.elevate);
    if let Some(helper) = elevation.helper() {
        eprintln!("Requesting privileges through {}", helper);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut coordinator = TaskCoordinator::new(
        Arc::new(SystemRunner),
        elevation,
        &config.tools,
        &config.defrag,
        tx,
    );
    drive(&mut coordinator, &mut rx, kind, &device).await
}

/// Start the task and consume its events until it finishes or Ctrl-C
pub(crate) async fn drive(
    coordinator: &mut TaskCoordinator,
    rx: &mut mpsc::UnboundedReceiver<TaskEvent>,
    kind: TaskKind,
    device: &BlockDevice,
) -> Result<FragmentationReport> {
    coordinator.start(kind, device)?;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                coordinator.cancel_all();
                anyhow::bail!(
                    "{} cancelled; the external process may still be running",
                    kind
                );
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    anyhow::bail!("task channel closed before {} finished", kind);
                };
                match coordinator.handle_event(event) {
                    Some(CoordinatorUpdate::Started { device, .. }) => {
                        eprintln!("Started {} of {}", kind, device);
                    }
                    Some(CoordinatorUpdate::Progress { percent, .. }) => {
                        eprintln!("  {:>3}%", percent);
                    }
                    Some(CoordinatorUpdate::Completed { report, warning, .. }) => {
                        if let Some(warning) = warning {
                            eprintln!("warning: {}", warning);
                        }
                        return Ok(report);
                    }
                    Some(CoordinatorUpdate::Failed { error, .. }) => return Err(error.into()),
                    None => {}
                }
            }
        }
    }
}

/// Plain-text summary of a report
pub fn describe_report(device: &str, report: &FragmentationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Device:            {}", device);
    let _ = writeln!(out, "Score:             {} ({})", report.score, report.score.band());
    let _ = writeln!(out, "Total files:       {}", report.total_files);
    let _ = writeln!(out, "Fragmented files:  {}", report.fragmented_files);
    match report.fragmented_ratio {
        Some(ratio) => {
            let _ = writeln!(out, "Fragmented ratio:  {:.1}%", ratio * 100.0);
        }
        None => {
            let _ = writeln!(out, "Fragmented ratio:  -");
        }
    }
    out
}

/// Illustrative occupancy map of `width` x `height` cells
pub fn render_map(config: &Config, report: &FragmentationReport, width: u32, height: u32) -> String {
    let grid = MapSynthesizer::new(config.map.seed, 1).grid_for(Some(report), width, height);
    let mut out = grid.to_text();
    let legend: Vec<String> = CellCategory::ALL
        .iter()
        .map(|c| format!("{} {}", c.glyph(), c.label()))
        .collect();
    let _ = writeln!(out, "{}", legend.join("  "));
    out.push_str("Layout is illustrative; only the proportions reflect the analysis.\n");
    out
}
