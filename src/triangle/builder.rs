//! Assemble tabular or triangle-shaped input into an `IncrTriangle` or `CumTriangle`
//!
//! Input can be typed (long records or a pivoted grid) or any CSV source.
//! The builder performs the shape conversion (tabular or triangle) and the
//! format conversion (incremental or cumulative) before handing the data to
//! the triangle constructors.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use csv::{Reader, StringRecord};
use log::debug;
use serde::{Deserialize, Serialize};

use super::base::{LossRecord, Triangle};
use super::cumulative::CumTriangle;
use super::grid::Grid;
use super::incremental::IncrTriangle;
use crate::error::{ReservingError, ReservingResult};

/// Representation of the triangle to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriangleKind {
    Incremental,
    Cumulative,
}

/// Whether the input values are incremental or cumulative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    Incr,
    Cum,
}

/// Whether the input is long (origin, dev, value) rows or a pivoted triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataShape {
    Tabular,
    Triangle,
}

impl FromStr for TriangleKind {
    type Err = ReservingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incr" | "incremental" => Ok(TriangleKind::Incremental),
            "cum" | "cumulative" => Ok(TriangleKind::Cumulative),
            _ => Err(ReservingError::selection("triangle type", s)),
        }
    }
}

impl FromStr for DataFormat {
    type Err = ReservingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incr" | "incremental" => Ok(DataFormat::Incr),
            "cum" | "cumulative" => Ok(DataFormat::Cum),
            _ => Err(ReservingError::selection("data format", s)),
        }
    }
}

impl FromStr for DataShape {
    type Err = ReservingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tabular" => Ok(DataShape::Tabular),
            "triangle" => Ok(DataShape::Triangle),
            _ => Err(ReservingError::selection("data shape", s)),
        }
    }
}

/// Typed input for `totri`
#[derive(Debug, Clone, Copy)]
pub enum TriData<'a> {
    Tabular(&'a [LossRecord]),
    Triangle(&'a Grid<Option<f64>>),
}

/// Either triangle representation, as produced by the builder
#[derive(Debug, Clone, PartialEq)]
pub enum AnyTriangle {
    Incremental(IncrTriangle),
    Cumulative(CumTriangle),
}

impl AnyTriangle {
    pub fn kind(&self) -> TriangleKind {
        match self {
            AnyTriangle::Incremental(_) => TriangleKind::Incremental,
            AnyTriangle::Cumulative(_) => TriangleKind::Cumulative,
        }
    }

    pub fn triangle(&self) -> &Triangle {
        match self {
            AnyTriangle::Incremental(tri) => tri.triangle(),
            AnyTriangle::Cumulative(tri) => tri.triangle(),
        }
    }

    pub fn into_cum(self) -> CumTriangle {
        match self {
            AnyTriangle::Incremental(tri) => tri.to_cum(),
            AnyTriangle::Cumulative(tri) => tri,
        }
    }

    pub fn into_incr(self) -> IncrTriangle {
        match self {
            AnyTriangle::Incremental(tri) => tri,
            AnyTriangle::Cumulative(tri) => tri.to_incr(),
        }
    }
}

/// Builder settings: output kind, input format/shape and input column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleBuilder {
    pub kind: TriangleKind,
    pub data_format: DataFormat,
    pub data_shape: DataShape,
    pub origin: String,
    pub dev: String,
    pub value: String,
}

impl Default for TriangleBuilder {
    fn default() -> Self {
        Self {
            kind: TriangleKind::Cumulative,
            data_format: DataFormat::Incr,
            data_shape: DataShape::Tabular,
            origin: "origin".to_string(),
            dev: "dev".to_string(),
            value: "value".to_string(),
        }
    }
}

impl TriangleBuilder {
    pub fn new(kind: TriangleKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    pub fn data_shape(mut self, data_shape: DataShape) -> Self {
        self.data_shape = data_shape;
        self
    }

    /// Override the origin, development and value column names used for CSV input
    pub fn columns(mut self, origin: &str, dev: &str, value: &str) -> Self {
        self.origin = origin.to_string();
        self.dev = dev.to_string();
        self.value = value.to_string();
        self
    }

    /// Build from typed input
    pub fn build(&self, data: TriData<'_>) -> ReservingResult<AnyTriangle> {
        let tri = match data {
            TriData::Tabular(records) => Triangle::from_records(&aggregate(records))?,
            TriData::Triangle(grid) => Triangle::from_grid(grid.clone())?,
        };
        debug!(
            "built {:?} input of shape {:?} as {:?}",
            self.data_format,
            tri.shape(),
            self.kind
        );
        Ok(self.convert(tri))
    }

    /// Build from a CSV source laid out per `data_shape`
    pub fn read_csv<R: Read>(&self, reader: R) -> ReservingResult<AnyTriangle> {
        let mut csv_reader = Reader::from_reader(reader);
        match self.data_shape {
            DataShape::Tabular => {
                let records = self.read_tabular(&mut csv_reader)?;
                self.build(TriData::Tabular(&records))
            }
            DataShape::Triangle => {
                let grid = read_triangle(&mut csv_reader)?;
                self.build(TriData::Triangle(&grid))
            }
        }
    }

    /// Build from a CSV file
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> ReservingResult<AnyTriangle> {
        self.read_csv(File::open(path)?)
    }

    fn convert(&self, tri: Triangle) -> AnyTriangle {
        match (self.data_format, self.kind) {
            (DataFormat::Incr, TriangleKind::Incremental) => {
                AnyTriangle::Incremental(IncrTriangle::from_triangle(tri))
            }
            (DataFormat::Incr, TriangleKind::Cumulative) => {
                AnyTriangle::Cumulative(IncrTriangle::from_triangle(tri).to_cum())
            }
            (DataFormat::Cum, TriangleKind::Incremental) => {
                AnyTriangle::Incremental(CumTriangle::from_triangle(tri).to_incr())
            }
            (DataFormat::Cum, TriangleKind::Cumulative) => {
                AnyTriangle::Cumulative(CumTriangle::from_triangle(tri))
            }
        }
    }

    fn read_tabular<R: Read>(&self, reader: &mut Reader<R>) -> ReservingResult<Vec<LossRecord>> {
        let headers = reader.headers()?.clone();
        let origin_idx = column_index(&headers, &self.origin)?;
        let dev_idx = column_index(&headers, &self.dev)?;
        let value_idx = column_index(&headers, &self.value)?;

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            let value = row.get(value_idx).unwrap_or("").trim();
            if is_missing(value) {
                continue;
            }
            records.push(LossRecord {
                origin: parse_label(&self.origin, row.get(origin_idx).unwrap_or(""))?,
                dev: parse_label(&self.dev, row.get(dev_idx).unwrap_or(""))?,
                value: parse_value(&self.value, value)?,
            });
        }
        Ok(records)
    }
}

/// Assemble `data` into the requested triangle kind
pub fn totri(
    data: TriData<'_>,
    kind: TriangleKind,
    data_format: DataFormat,
) -> ReservingResult<AnyTriangle> {
    TriangleBuilder::new(kind).data_format(data_format).build(data)
}

/// Sum duplicate (origin, dev) pairs
fn aggregate(records: &[LossRecord]) -> Vec<LossRecord> {
    let mut totals: BTreeMap<(i32, i32), f64> = BTreeMap::new();
    for r in records {
        *totals.entry((r.origin, r.dev)).or_insert(0.0) += r.value;
    }
    totals
        .into_iter()
        .map(|((origin, dev), value)| LossRecord { origin, dev, value })
        .collect()
}

/// Triangle-shaped CSV: first column holds origins, remaining headers are dev periods
fn read_triangle<R: Read>(reader: &mut Reader<R>) -> ReservingResult<Grid<Option<f64>>> {
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ReservingError::shape(
            "triangle input needs an origin column and at least one development column",
        ));
    }
    let origin_name = headers.get(0).unwrap_or("origin").to_string();
    let devp = headers
        .iter()
        .skip(1)
        .map(|h| parse_label("dev", h))
        .collect::<ReservingResult<Vec<i32>>>()?;

    let mut rows: Vec<(i32, Vec<Option<f64>>)> = Vec::new();
    for result in reader.records() {
        let row = result?;
        let origin = parse_label(&origin_name, row.get(0).unwrap_or(""))?;
        let cells = (1..=devp.len())
            .map(|j| {
                let raw = row.get(j).unwrap_or("").trim();
                if is_missing(raw) {
                    Ok(None)
                } else {
                    parse_value(&headers[j], raw).map(Some)
                }
            })
            .collect::<ReservingResult<Vec<_>>>()?;
        rows.push((origin, cells));
    }

    // Headers and rows may arrive in any order; the grid wants ascending labels.
    rows.sort_by_key(|(origin, _)| *origin);
    let mut order: Vec<usize> = (0..devp.len()).collect();
    order.sort_by_key(|&j| devp[j]);
    let sorted_devp = order.iter().map(|&j| devp[j]).collect();
    let (origins, cells): (Vec<i32>, Vec<Vec<Option<f64>>>) = rows
        .into_iter()
        .map(|(origin, cells)| (origin, order.iter().map(|&j| cells[j]).collect()))
        .unzip();

    Grid::new(origins, sorted_devp, cells)
}

fn column_index(headers: &StringRecord, name: &str) -> ReservingResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ReservingError::MissingColumn {
            column: name.to_string(),
        })
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("na")
}

/// Period labels are integers; "1981.0" style values are accepted
fn parse_label(column: &str, raw: &str) -> ReservingResult<i32> {
    let raw = raw.trim();
    let parse_err = || ReservingError::Parse {
        column: column.to_string(),
        value: raw.to_string(),
    };
    if let Ok(label) = raw.parse::<i32>() {
        return Ok(label);
    }
    let float: f64 = raw.parse().map_err(|_| parse_err())?;
    if float.fract() == 0.0 && float.abs() <= i32::MAX as f64 {
        Ok(float as i32)
    } else {
        Err(parse_err())
    }
}

fn parse_value(column: &str, raw: &str) -> ReservingResult<f64> {
    raw.trim().parse().map_err(|_| ReservingError::Parse {
        column: column.to_string(),
        value: raw.to_string(),
    })
}

impl fmt::Display for TriangleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriangleKind::Incremental => write!(f, "incremental"),
            TriangleKind::Cumulative => write!(f, "cumulative"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets;

    const SMALL_TABULAR: &str = "origin,dev,value\n2001,1,100\n2001,2,50\n2002,1,120\n";

    #[test]
    fn test_incr_tabular_to_cum() {
        let tri = totri(
            TriData::Tabular(&datasets::raa()),
            TriangleKind::Cumulative,
            DataFormat::Incr,
        )
        .unwrap();
        assert_eq!(tri.kind(), TriangleKind::Cumulative);
        assert_eq!(tri.triangle().value(1981, 10), Some(18834.0));
    }

    #[test]
    fn test_duplicates_are_aggregated() {
        let records = vec![
            LossRecord::new(2001, 1, 60.0),
            LossRecord::new(2001, 1, 40.0),
            LossRecord::new(2002, 1, 10.0),
        ];
        let tri = totri(TriData::Tabular(&records), TriangleKind::Incremental, DataFormat::Incr)
            .unwrap();
        assert_eq!(tri.triangle().value(2001, 1), Some(100.0));
    }

    #[test]
    fn test_reader_with_renamed_columns() {
        let data = "ay,devp,loss_amt\n2001,1,100\n2001,2,50\n2002,1,120\n";
        let renamed = TriangleBuilder::new(TriangleKind::Cumulative)
            .columns("ay", "devp", "loss_amt")
            .read_csv(data.as_bytes())
            .unwrap();
        let default = TriangleBuilder::new(TriangleKind::Cumulative)
            .read_csv(SMALL_TABULAR.as_bytes())
            .unwrap();
        assert_eq!(renamed, default);
        assert_eq!(default.triangle().value(2001, 2), Some(150.0));
    }

    #[test]
    fn test_missing_column_reported() {
        let err = TriangleBuilder::new(TriangleKind::Incremental)
            .columns("ay", "dev", "value")
            .read_csv(SMALL_TABULAR.as_bytes())
            .unwrap_err();
        assert!(matches!(err, ReservingError::MissingColumn { ref column } if column == "ay"));
    }

    #[test]
    fn test_triangle_shaped_reader() {
        let data = "origin,2,1\n2002,,120\n2001,150,100\n";
        let tri = TriangleBuilder::new(TriangleKind::Cumulative)
            .data_format(DataFormat::Cum)
            .data_shape(DataShape::Triangle)
            .read_csv(data.as_bytes())
            .unwrap();
        assert_eq!(tri.triangle().origins(), &[2001, 2002]);
        assert_eq!(tri.triangle().devp(), &[1, 2]);
        assert_eq!(tri.triangle().value(2001, 2), Some(150.0));
        assert_eq!(tri.triangle().value(2002, 2), None);
    }

    #[test]
    fn test_unparseable_value() {
        let data = "origin,dev,value\n2001,1,abc\n";
        let err = TriangleBuilder::default().read_csv(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ReservingError::Parse { .. }));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("incremental".parse::<TriangleKind>().unwrap(), TriangleKind::Incremental);
        assert_eq!("CUM".parse::<DataFormat>().unwrap(), DataFormat::Cum);
        assert!("square".parse::<DataShape>().is_err());
    }
}
