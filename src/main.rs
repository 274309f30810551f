//! trikit CLI
//!
//! Build a cumulative triangle from a CSV file or a bundled dataset and
//! print its Mack chain ladder summary.

use anyhow::{Context, Result};
use clap::Parser;

use trikit::chainladder::{Alpha, MackChainLadder, MackConfig, MackSummary};
use trikit::datasets;
use trikit::triangle::{TriData, TriangleBuilder, TriangleKind};

/// Mack chain ladder reserve summary
#[derive(Parser, Debug)]
#[command(name = "trikit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV file with loss data
    #[arg(short, long, conflicts_with = "dataset")]
    file: Option<String>,

    /// Bundled sample dataset
    #[arg(short, long, default_value = "raa")]
    dataset: String,

    /// Whether input values are incremental or cumulative (incr | cum); needs --file
    #[arg(long, default_value = "incr", requires = "file")]
    format: String,

    /// Input layout (tabular | triangle); needs --file
    #[arg(long, default_value = "tabular", requires = "file")]
    shape: String,

    /// Origin column name for tabular input
    #[arg(long, default_value = "origin", requires = "file")]
    origin: String,

    /// Development column name for tabular input
    #[arg(long, default_value = "dev", requires = "file")]
    dev: String,

    /// Value column name for tabular input
    #[arg(long, default_value = "value", requires = "file")]
    value: String,

    /// LDF weighting exponent (0, 1 or 2)
    #[arg(long, default_value_t = 1)]
    alpha: u8,

    /// Tail factor beyond the last development period
    #[arg(long, default_value_t = 1.0)]
    tail: f64,

    /// Standard normal quantile for confidence bounds
    #[arg(long, default_value_t = 1.96)]
    z: f64,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let builder = TriangleBuilder::new(TriangleKind::Cumulative)
        .data_format(cli.format.parse()?)
        .data_shape(cli.shape.parse()?)
        .columns(&cli.origin, &cli.dev, &cli.value);

    let tri = match &cli.file {
        Some(path) => builder
            .read_path(path)
            .with_context(|| format!("Failed to build triangle from {path}"))?,
        None => {
            let records = datasets::load(&cli.dataset)?;
            TriangleBuilder::new(TriangleKind::Cumulative).build(TriData::Tabular(&records))?
        }
    }
    .into_cum();

    let config = MackConfig {
        alpha: Alpha::try_from(cli.alpha)?,
        tail: cli.tail,
        z: cli.z,
    };
    let mack = MackChainLadder::new(&tri, config).context("Mack estimation failed")?;
    let summary = mack.summary()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("LDFs: {}", format_factors(mack.ldfs()));
        println!("Tail: {:.4}", mack.tail());
        println!();
        print_summary(&summary, cli.z);
    }

    Ok(())
}

fn format_factors(factors: &[f64]) -> String {
    factors
        .iter()
        .map(|f| format!("{f:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_summary(summary: &MackSummary, z: f64) {
    println!(
        "{:>6} {:>4} {:>12} {:>8} {:>12} {:>12} {:>10} {:>7} {:>12} {:>12}",
        "Origin", "Mat", "Latest", "CLDF", "Ultimate", "Reserve", "RMSEP", "CV", "LN Lower", "LN Upper"
    );
    println!("{}", "-".repeat(106));

    for row in summary.rows.iter().chain(std::iter::once(&summary.total)) {
        let origin = row
            .base
            .origin
            .map_or_else(|| "Total".to_string(), |o| o.to_string());
        let maturity = row.base.maturity.map_or_else(String::new, |m| m.to_string());
        let cldf = row.base.cldf.map_or_else(String::new, |c| format!("{c:.4}"));
        let cv = row.cv.map_or_else(String::new, |c| format!("{c:.3}"));
        println!(
            "{:>6} {:>4} {:>12.0} {:>8} {:>12.0} {:>12.0} {:>10.0} {:>7} {:>12.0} {:>12.0}",
            origin,
            maturity,
            row.base.latest,
            cldf,
            row.base.ultimate,
            row.base.reserve,
            row.rmsep,
            cv,
            row.lnorm_lb,
            row.lnorm_ub,
        );
    }

    println!();
    println!("Total RMSEP (with covariance): {:.0}", summary.total_rmsep);
    println!("Bounds use z = {z}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_flags_need_a_file() {
        assert!(Cli::try_parse_from(["trikit", "--dataset", "raa", "--format", "cum"]).is_err());
        assert!(Cli::try_parse_from(["trikit", "--origin", "ay"]).is_err());
        let cli = Cli::try_parse_from(["trikit", "--file", "losses.csv", "--shape", "triangle"]).unwrap();
        assert_eq!(cli.shape, "triangle");
    }

    #[test]
    fn test_dataset_defaults_parse() {
        let cli = Cli::try_parse_from(["trikit"]).unwrap();
        assert_eq!(cli.dataset, "raa");
        assert!(cli.file.is_none());
    }
}
