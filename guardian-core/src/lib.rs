pub mod audio;
pub mod backend;
pub mod badge;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod history;
pub mod host;
pub mod keywords;
pub mod link_filter;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod schedule;
pub mod store;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub fn run_console(args: &[String]) -> anyhow::Result<()> {
  let base = paths::base_dir()?;
  let config_path = paths::config_path(&base);
  let cfg = config::load_or_create_default(&config_path)?;

  logging::init(
    &paths::logs_dir(&base),
    &cfg.logging.level,
    cfg.logging.retention_days,
  )?;

  if args.iter().any(|a| a == "history") {
    return print_history(&base);
  }

  tracing::info!("starting Guardian coordinator (stdio host)");

  let backend = Arc::new(backend::HttpBackend::new(&cfg.backend)?);
  backend.probe_health();

  // stdout carries protocol lines only; logs go to file and stderr.
  let writer = host::EventWriter::stdout();
  let surface = Arc::new(host::StdioSurface::new(writer.clone()));
  let orchestrator = orchestrator::Orchestrator::new(
    &cfg,
    surface.clone(),
    surface,
    Some(paths::history_dir(&base)),
  );
  let (coordinator, handle) = coordinator::Coordinator::new(orchestrator, backend);

  let ctrlc_handle = handle.clone();
  ctrlc::set_handler(move || {
    ctrlc_handle.shutdown();
  })?;

  let loop_thread = std::thread::spawn(move || coordinator.run(Duration::from_millis(500)));

  let host_result = host::run(handle.clone(), writer);
  handle.shutdown();
  let _ = loop_thread.join();

  tracing::info!("coordinator stopped");
  host_result
}

fn print_history(base: &Path) -> anyhow::Result<()> {
  let records = history::list_recent(&paths::history_dir(base), 20)?;
  if records.is_empty() {
    println!("No scan records.");
    return Ok(());
  }

  for r in records {
    println!(
      "{}  risk={:<3} type={:<18} {}",
      r.created_at_unix_ms, r.risk_score, r.threat_type, r.url
    );
  }
  Ok(())
}
