//! Sample datasets and the CAS Loss Reserving Database filter
//!
//! Sample triangles are embedded at compile time so tests and the CLI work
//! without any files on disk.

pub mod lrdb;

use csv::Reader;

use crate::error::{ReservingError, ReservingResult};
use crate::triangle::LossRecord;

const RAA_CSV: &str = include_str!("../../data/raa.csv");

/// Names accepted by [`load`]
pub const DATASETS: &[&str] = &["raa"];

/// Load a named sample dataset as incremental long-format records
pub fn load(dataset: &str) -> ReservingResult<Vec<LossRecord>> {
    match dataset.to_ascii_lowercase().as_str() {
        "raa" => parse_records(RAA_CSV),
        _ => Err(ReservingError::selection("dataset", dataset)),
    }
}

/// RAA sample (Mack 1993): 10 origin years, 10 development years, incremental
#[cfg(test)]
pub(crate) fn raa() -> Vec<LossRecord> {
    parse_records(RAA_CSV).unwrap()
}

fn parse_records(data: &str) -> ReservingResult<Vec<LossRecord>> {
    let mut reader = Reader::from_reader(data.as_bytes());
    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: LossRecord = result?;
        records.push(record);
    }
    Ok(records)
}
