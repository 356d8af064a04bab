use std::path::Path;

use super::init_store;
use crate::config::AppConfig;
use crate::remote::QlikClient;
use crate::snapshot::{FsSnapshotWriter, SnapshotSink};
use crate::sync::{self, SyncContext, SyncReport, SyncScope};

fn print_report(report: &SyncReport) {
    println!();
    println!("Catalog sync ({})", report.scope);
    println!("{}", "─".repeat(20));
    println!("Apps seen:   {}", report.apps_seen);
    println!(
        "Streams:     {} created, {} updated, {} deleted",
        report.streams_created, report.streams_updated, report.streams_deleted
    );
    println!(
        "Models:      {} created, {} updated, {} deleted",
        report.models_created, report.models_updated, report.models_deleted
    );
    println!(
        "Fields:      {} created, {} updated, {} deleted, {} duplicates removed",
        report.fields_created,
        report.fields_updated,
        report.fields_deleted,
        report.duplicates_removed
    );
    println!("Snapshots:   {}", report.snapshots_written);

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            match (&warning.app_id, &warning.app_name) {
                (Some(id), Some(name)) => println!("  {id} ({name}): {}", warning.message),
                (Some(id), None) => println!("  {id}: {}", warning.message),
                _ => println!("  {}", warning.message),
            }
        }
    }
    println!();
}

pub fn run_sync(
    config_path: &Path,
    stream: Option<String>,
    model: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let store = init_store(&config)?;
    let client = QlikClient::new(&config.remote)?;
    let writer = FsSnapshotWriter::new(&config);

    let scope = match (stream, model) {
        (Some(stream), _) => SyncScope::Stream(stream),
        (None, Some(model)) => SyncScope::Model(model),
        (None, None) => SyncScope::All,
    };

    let ctx = SyncContext {
        store: &store,
        remote: &client,
        snapshots: config
            .sync
            .snapshots
            .then_some(&writer as &dyn SnapshotSink),
        lock_ttl: config.lock_ttl(),
    };
    let report = sync::run_sync(&ctx, &scope)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}
