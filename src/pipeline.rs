//! The update pipeline: every exchange job in a fixed order, with the
//! autofill SQL scripts run between them. The first job error aborts the
//! remaining sequence; a cleanup-script error is logged and skipped.

use std::time::Instant;

use chrono::NaiveDate;

use crate::jobs::{brvm, dse, jse, nse};
use crate::{constants, model, store};

pub async fn run(date: Option<NaiveDate>) -> model::Result<()> {
    let started = Instant::now();

    step("dse", dse::run(constants::DSE_MANIFEST, store::sqlite::init_connection()?)).await?;
    cleanup(constants::DSE_CLEANUP_SQL);

    step_sync("nse", || nse::run(constants::NSE_SNAPSHOT_DIR, store::sqlite::init_connection()?))?;
    cleanup(constants::NSE_CLEANUP_SQL);

    step(
        "jse",
        jse::run(constants::JSE_MANIFEST, date, false, store::sqlite::init_connection()?),
    )
    .await?;
    step(
        "jse-indices",
        jse::run(constants::JSE_INDICES_MANIFEST, date, true, store::sqlite::init_connection()?),
    )
    .await?;
    cleanup(constants::JSE_CLEANUP_SQL);

    step("brvm-fetch", brvm::fetch(constants::BRVM_SNAPSHOT_DIR)).await?;
    step_sync("brvm", || {
        brvm::run(constants::BRVM_SNAPSHOT_DIR, store::sqlite::init_connection()?)
    })?;

    log::info!("pipeline: all jobs finished in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

async fn step(name: &str, job: impl Future<Output = model::Result<()>>) -> model::Result<()> {
    log::info!("pipeline: === running {} ===", name);
    let started = Instant::now();
    let result = job.await;
    match &result {
        Ok(_) => log::info!("pipeline: finished {} in {:.2}s", name, started.elapsed().as_secs_f64()),
        Err(err) => log::error!("pipeline: {} failed, aborting run: {}", name, err),
    }
    result
}

fn step_sync(name: &str, job: impl FnOnce() -> model::Result<()>) -> model::Result<()> {
    log::info!("pipeline: === running {} ===", name);
    let started = Instant::now();
    let result = job();
    match &result {
        Ok(_) => log::info!("pipeline: finished {} in {:.2}s", name, started.elapsed().as_secs_f64()),
        Err(err) => log::error!("pipeline: {} failed, aborting run: {}", name, err),
    }
    result
}

// Cleanup scripts are best-effort: a failure here never stops the run.
fn cleanup(sql_file: &str) {
    log::info!("pipeline: === running SQL from {} ===", sql_file);
    let result = store::sqlite::init_connection()
        .and_then(|conn| store::sqlite::run_sql_file(&conn, sql_file));
    if let Err(err) = result {
        log::error!("pipeline: SQL script {} failed, continuing: {}", sql_file, err);
    }
}
