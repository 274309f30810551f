//! CAS Loss Reserving Database (lrdb) extracts
//!
//! The database partitions losses by line of business (`loss_key`) and NAIC
//! company (`grcode` / `grname`). Each block holds a 10x10 square; rows
//! flagged `train_ind = 1` form the upper-left triangle of actual experience.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use csv::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{ReservingError, ReservingResult};
use crate::triangle::LossRecord;

/// Raw CSV row of an lrdb extract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrdbRow {
    pub loss_key: String,
    pub grcode: u32,
    pub grname: String,
    pub origin: i32,
    pub dev: i32,
    pub incrd_loss: f64,
    pub paid_loss: f64,
    pub train_ind: u8,
}

/// Which loss field to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossType {
    Incurred,
    Paid,
}

impl FromStr for LossType {
    type Err = ReservingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with('i') {
            Ok(LossType::Incurred)
        } else if lower.starts_with('p') {
            Ok(LossType::Paid)
        } else {
            Err(ReservingError::selection("loss type", s))
        }
    }
}

/// Selection applied to an lrdb extract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrdbFilter {
    pub loss_type: LossType,
    pub lob: Option<String>,
    pub grcode: Option<u32>,
    pub grname: Option<String>,
    /// Keep only the upper-left (observed) portion
    pub train_only: bool,
}

impl Default for LrdbFilter {
    fn default() -> Self {
        Self {
            loss_type: LossType::Incurred,
            lob: Some("comauto".to_string()),
            grcode: Some(1767),
            grname: None,
            train_only: true,
        }
    }
}

/// Unique (lob, grcode, grname) combination
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LrdbSpec {
    pub loss_key: String,
    pub grcode: u32,
    pub grname: String,
}

/// In-memory lrdb extract
#[derive(Debug, Clone, Default)]
pub struct Lrdb {
    rows: Vec<LrdbRow>,
}

impl Lrdb {
    /// Load from any CSV reader
    pub fn from_reader<R: Read>(reader: R) -> ReservingResult<Self> {
        let mut csv_reader = Reader::from_reader(reader);
        let mut rows = Vec::new();
        for result in csv_reader.deserialize() {
            let row: LrdbRow = result?;
            rows.push(row);
        }
        Ok(Self { rows })
    }

    /// Load from a CSV file
    pub fn from_path<P: AsRef<Path>>(path: P) -> ReservingResult<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn rows(&self) -> &[LrdbRow] {
        &self.rows
    }

    /// Distinct lines of business
    pub fn lobs(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.loss_key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// grcode to grname mapping
    pub fn groups(&self) -> BTreeMap<u32, String> {
        self.rows
            .iter()
            .map(|r| (r.grcode, r.grname.clone()))
            .collect()
    }

    /// Distinct (lob, grcode, grname) combinations, sorted by lob then grcode
    pub fn specs(&self) -> Vec<LrdbSpec> {
        self.rows
            .iter()
            .map(|r| LrdbSpec {
                loss_key: r.loss_key.clone(),
                grcode: r.grcode,
                grname: r.grname.clone(),
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Filter to one block and return incremental (origin, dev, value) records
    ///
    /// Each key is validated against the rows remaining after the previous
    /// filters, so an unknown lob, grcode or grname is reported by name.
    pub fn select(&self, filter: &LrdbFilter) -> ReservingResult<Vec<LossRecord>> {
        let mut rows: Vec<&LrdbRow> = self.rows.iter().collect();

        if let Some(lob) = &filter.lob {
            if !rows.iter().any(|r| &r.loss_key == lob) {
                return Err(ReservingError::selection("lob", lob));
            }
            rows.retain(|r| &r.loss_key == lob);
        }
        if let Some(grcode) = filter.grcode {
            if !rows.iter().any(|r| r.grcode == grcode) {
                return Err(ReservingError::selection("grcode", grcode));
            }
            rows.retain(|r| r.grcode == grcode);
        }
        if let Some(grname) = &filter.grname {
            if !rows.iter().any(|r| &r.grname == grname) {
                return Err(ReservingError::selection("grname", grname));
            }
            rows.retain(|r| &r.grname == grname);
        }
        if filter.train_only {
            rows.retain(|r| r.train_ind == 1);
        }

        Ok(rows
            .into_iter()
            .map(|r| LossRecord {
                origin: r.origin,
                dev: r.dev,
                value: match filter.loss_type {
                    LossType::Incurred => r.incrd_loss,
                    LossType::Paid => r.paid_loss,
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACT: &str = "\
loss_key,grcode,grname,origin,dev,incrd_loss,paid_loss,train_ind
comauto,1767,State Farm,1988,1,100,60,1
comauto,1767,State Farm,1988,2,40,30,1
comauto,1767,State Farm,1989,1,110,70,1
comauto,1767,State Farm,1989,2,45,35,0
comauto,337,California Cas,1988,1,10,6,1
ppauto,1767,State Farm,1988,1,500,300,1
";

    fn extract() -> Lrdb {
        Lrdb::from_reader(EXTRACT.as_bytes()).unwrap()
    }

    #[test]
    fn test_default_selection_train_only() {
        let records = extract().select(&LrdbFilter::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], LossRecord::new(1988, 2, 40.0));
    }

    #[test]
    fn test_paid_full_square() {
        let filter = LrdbFilter {
            loss_type: "paid".parse().unwrap(),
            train_only: false,
            ..Default::default()
        };
        let records = extract().select(&filter).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].value, 35.0);
    }

    #[test]
    fn test_invalid_keys_are_named() {
        let lrdb = extract();
        let bad_lob = LrdbFilter {
            lob: Some("wkcomp".to_string()),
            ..Default::default()
        };
        assert_eq!(
            lrdb.select(&bad_lob).unwrap_err().to_string(),
            "`wkcomp` is not a valid lob selection"
        );

        let bad_grcode = LrdbFilter {
            grcode: Some(42),
            ..Default::default()
        };
        assert!(matches!(
            lrdb.select(&bad_grcode),
            Err(ReservingError::InvalidSelection { ref field, .. }) if field == "grcode"
        ));

        let bad_grname = LrdbFilter {
            grname: Some("Nobody Mutual".to_string()),
            ..Default::default()
        };
        assert!(lrdb.select(&bad_grname).is_err());
    }

    #[test]
    fn test_specs_and_groups() {
        let lrdb = extract();
        assert_eq!(lrdb.lobs(), vec!["comauto".to_string(), "ppauto".to_string()]);
        assert_eq!(lrdb.groups().get(&337).map(String::as_str), Some("California Cas"));
        let specs = lrdb.specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].grcode, 337);
    }
}
