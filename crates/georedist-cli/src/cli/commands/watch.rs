//! `georedist watch` – run the updater in the foreground and print its events.

use anyhow::Result;
use georedist_core::config::UpdaterConfig;
use georedist_core::{AutoUpdater, UpdateEvent};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

pub async fn run_watch(cfg: UpdaterConfig, period_hours: Option<u64>) -> Result<()> {
    let cfg = match period_hours {
        Some(h) => cfg.with_update_period(Duration::from_secs(h.max(1) * 60 * 60)),
        None => cfg,
    };
    let period = cfg.update_period;
    let updater = AutoUpdater::new_async(cfg).await?;
    let mut events = updater.subscribe();
    updater.start();
    println!(
        "watching {} database(s) in {} (every {}h); Ctrl-C to stop",
        updater.config().dbs.len(),
        updater.config().storage_dir.display(),
        period.as_secs() / 3600
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping updater");
                break;
            }
            ev = events.recv() => match ev {
                Ok(ev) => print_event(&ev),
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event receiver lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    updater.close();
    Ok(())
}

fn print_event(ev: &UpdateEvent) {
    match ev {
        UpdateEvent::Checking => println!("checking"),
        UpdateEvent::Downloading => println!("downloading"),
        UpdateEvent::CheckOk(_) => println!("up to date"),
        UpdateEvent::Updated(paths) => {
            for (db, path) in paths {
                println!("updated  {:<18} {}", db, path.display());
            }
        }
        UpdateEvent::DoneChecking => {}
        UpdateEvent::Failed { source, message } => println!("failed ({:?}): {}", source, message),
    }
}
