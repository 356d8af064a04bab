use std::path::Path;

use serde::Serialize;

use super::init_store;
use crate::config::AppConfig;
use crate::store::{Catalog, Filter};
use crate::types::{Field, Model, Stream, SyncRun};

const RECENT_RUNS: i64 = 5;

#[derive(Serialize)]
struct CatalogStatus {
    streams: i64,
    models: i64,
    fields: i64,
    key_fields: i64,
    recent_runs: Vec<SyncRun>,
}

pub fn run_status(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let store = init_store(&config)?;

    let status = CatalogStatus {
        streams: store.count::<Stream>(&Filter::all())?,
        models: store.count::<Model>(&Filter::all())?,
        fields: store.count::<Field>(&Filter::all())?,
        key_fields: store.count::<Field>(&Filter::all().eq("source_table", ""))?,
        recent_runs: store.list_sync_runs(RECENT_RUNS)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("Catalog Status");
    println!("{}", "─".repeat(20));
    println!("Streams:  {}", status.streams);
    println!("Models:   {}", status.models);
    println!("Fields:   {} ({} key)", status.fields, status.key_fields);
    println!();

    if status.recent_runs.is_empty() {
        println!("No sync has run yet.");
    } else {
        println!("Recent syncs:");
        for run in &status.recent_runs {
            let finished = run
                .finished_at
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {}  {:<10} {:<48} apps={} warnings={}  finished={}",
                run.started_at.to_rfc3339(),
                run.status.as_str(),
                run.scope,
                run.apps_seen,
                run.warning_count,
                finished
            );
            if let Some(error) = &run.error {
                println!("      error: {error}");
            }
        }
    }
    println!();

    Ok(())
}
