//! Run Mack chain ladder for every block of a CAS Loss Reserving Database extract
//!
//! Outputs one row per (lob, grcode, origin) with reserve and prediction error

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

use trikit::chainladder::{MackChainLadder, MackConfig, MackSummary};
use trikit::datasets::lrdb::{LossType, Lrdb, LrdbFilter, LrdbSpec};
use trikit::triangle::IncrTriangle;
use trikit::ReservingResult;

/// Mack summaries for every lrdb block
#[derive(Parser, Debug)]
#[command(name = "run_lrdb")]
struct Args {
    /// lrdb CSV extract
    input: String,

    /// Output CSV path
    #[arg(short, long, default_value = "lrdb_mack_output.csv")]
    output: String,

    /// Loss field (incurred | paid)
    #[arg(long, default_value = "incurred")]
    loss_type: String,

    /// Restrict to one line of business
    #[arg(long)]
    lob: Option<String>,
}

/// Flat output row
#[derive(Debug, Serialize)]
struct BlockRow {
    loss_key: String,
    grcode: u32,
    grname: String,
    origin: String,
    latest: f64,
    ultimate: f64,
    reserve: f64,
    rmsep: f64,
    cv: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let lrdb = Lrdb::from_path(&args.input)
        .with_context(|| format!("Failed to load {}", args.input))?;
    let loss_type: LossType = args.loss_type.parse()?;
    let specs: Vec<LrdbSpec> = lrdb
        .specs()
        .into_iter()
        .filter(|s| args.lob.as_ref().map_or(true, |lob| &s.loss_key == lob))
        .collect();
    println!("Loaded {} rows, {} blocks in {:?}", lrdb.rows().len(), specs.len(), start.elapsed());

    let run_start = Instant::now();
    let results: Vec<(LrdbSpec, ReservingResult<MackSummary>)> = specs
        .into_par_iter()
        .map(|spec| {
            let filter = LrdbFilter {
                loss_type,
                lob: Some(spec.loss_key.clone()),
                grcode: Some(spec.grcode),
                grname: None,
                train_only: true,
            };
            let summary = run_block(&lrdb, &filter);
            (spec, summary)
        })
        .collect();
    println!("Estimation complete in {:?}", run_start.elapsed());

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output))?;
    let mut failed = 0;
    for (spec, summary) in &results {
        let summary = match summary {
            Ok(summary) => summary,
            Err(e) => {
                log::warn!("{} / {} ({}): {e}", spec.loss_key, spec.grcode, spec.grname);
                failed += 1;
                continue;
            }
        };
        for row in summary.rows.iter().chain(std::iter::once(&summary.total)) {
            writer.serialize(BlockRow {
                loss_key: spec.loss_key.clone(),
                grcode: spec.grcode,
                grname: spec.grname.clone(),
                origin: row
                    .base
                    .origin
                    .map_or_else(|| "total".to_string(), |o| o.to_string()),
                latest: row.base.latest,
                ultimate: row.base.ultimate,
                reserve: row.base.reserve,
                rmsep: row.rmsep,
                cv: row.cv,
            })?;
        }
    }
    writer.flush()?;

    println!(
        "{} blocks written to {}, {} skipped",
        results.len() - failed,
        args.output,
        failed
    );
    Ok(())
}

fn run_block(lrdb: &Lrdb, filter: &LrdbFilter) -> ReservingResult<MackSummary> {
    let records = lrdb.select(filter)?;
    let tri = IncrTriangle::from_records(&records)?.to_cum();
    MackChainLadder::new(&tri, MackConfig::default())?.summary()
}
