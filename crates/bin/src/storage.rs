//! Database location and CSV import.

use crate::error::CliError;
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tessera_data::{
    BenchmarkWeight, FactorValue, IndustryRecord, MarketBar, RiskExposure, SqliteEngine,
    UniverseMember,
};
use tracing::info;

/// Dataset a CSV file is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Dataset {
    /// `trade_date,code,is_open,chg_pct`
    Market,
    /// `trade_date,code,factor,value`
    Factors,
    /// `trade_date,code,industry_code,industry`
    Industry,
    /// `trade_date,benchmark,code,weight`
    Benchmark,
    /// `trade_date,code,risk_model,factor,value`
    Risk,
    /// `trade_date,universe,code`
    Universe,
}

/// `<cache dir>/tessera/tessera.db`
pub(crate) fn default_db_path() -> Result<PathBuf, CliError> {
    let cache_dir = dirs::cache_dir().ok_or(CliError::NoCacheDir)?;
    Ok(cache_dir.join("tessera").join("tessera.db"))
}

fn resolve(db: Option<PathBuf>) -> Result<PathBuf, CliError> {
    db.map_or_else(default_db_path, Ok)
}

/// Open an existing database for reading.
pub(crate) fn open_existing(db: Option<PathBuf>) -> Result<(SqliteEngine, PathBuf), CliError> {
    let path = resolve(db)?;
    if !path.exists() {
        return Err(CliError::DatabaseNotFound(path));
    }
    Ok((SqliteEngine::new(&path)?, path))
}

/// Open a database for writing, creating it and its directory if needed.
pub(crate) fn open_or_create(db: Option<PathBuf>) -> Result<(SqliteEngine, PathBuf), CliError> {
    let path = resolve(db)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok((SqliteEngine::new(&path)?, path))
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CliError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(records)
}

fn load<T, F>(path: &Path, put: F) -> Result<usize, CliError>
where
    T: DeserializeOwned,
    F: FnOnce(&[T]) -> tessera_data::Result<()>,
{
    let records: Vec<T> = read_records(path)?;
    put(&records)?;
    Ok(records.len())
}

/// Load a CSV file into `dataset`, returning the number of rows written.
pub(crate) fn import(engine: &SqliteEngine, dataset: Dataset, path: &Path) -> Result<usize, CliError> {
    let rows = match dataset {
        Dataset::Market => load::<MarketBar, _>(path, |r| engine.put_market(r))?,
        Dataset::Factors => load::<FactorValue, _>(path, |r| engine.put_factor_values(r))?,
        Dataset::Industry => load::<IndustryRecord, _>(path, |r| engine.put_industries(r))?,
        Dataset::Benchmark => load::<BenchmarkWeight, _>(path, |r| engine.put_benchmark_weights(r))?,
        Dataset::Risk => load::<RiskExposure, _>(path, |r| engine.put_risk_exposures(r))?,
        Dataset::Universe => load::<UniverseMember, _>(path, |r| engine.put_universe_members(r))?,
    };
    info!("Imported {rows} {dataset:?} rows from {}", path.display());
    Ok(rows)
}
