//! SQLite-backed panel store.
//!
//! Datasets are stored in long format where the column set is open ended
//! (factor values, risk exposures) and pivoted to wide frames on read. Reads
//! load the relevant date range and hand the frames to an
//! [`InMemoryEngine`], so both engines share one set of panel semantics.

use super::{DataEngine, InMemoryEngine};
use crate::error::{DataError, Result};
use crate::frame::{
    CHG_PCT, CODE, INDUSTRY, INDUSTRY_CODE, IS_OPEN, TRADE_DATE, WEIGHT, date_series, parse_date,
};
use crate::risk_model::RiskModel;
use crate::transformer::Transformer;
use crate::universe::Universe;
use chrono::NaiveDate;
use polars::prelude::*;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Daily market record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Instrument code
    pub code: String,
    /// Whether the instrument traded on this date
    pub is_open: bool,
    /// Daily return as a fraction
    pub chg_pct: Option<f64>,
}

/// One raw factor observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorValue {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Instrument code
    pub code: String,
    /// Factor name
    pub factor: String,
    /// Factor value
    pub value: Option<f64>,
}

/// Industry classification of an instrument on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryRecord {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Instrument code
    pub code: String,
    /// Numeric industry code
    pub industry_code: i64,
    /// Industry name
    pub industry: String,
}

/// Benchmark constituent weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkWeight {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Benchmark identifier
    pub benchmark: i64,
    /// Instrument code
    pub code: String,
    /// Weight in the benchmark
    pub weight: f64,
}

/// One risk-factor exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskExposure {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Instrument code
    pub code: String,
    /// Risk model
    pub risk_model: RiskModel,
    /// Risk factor name
    pub factor: String,
    /// Exposure value
    pub value: Option<f64>,
}

/// Universe membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseMember {
    /// Trading date
    pub trade_date: NaiveDate,
    /// Universe name
    pub universe: String,
    /// Instrument code
    pub code: String,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStats {
    /// Rows in `market`
    pub market_rows: usize,
    /// Rows in `factor_values`
    pub factor_values: usize,
    /// Rows in `industry`
    pub industry_rows: usize,
    /// Rows in `benchmark_weights`
    pub benchmark_weights: usize,
    /// Rows in `risk_exposures`
    pub risk_exposures: usize,
    /// Rows in `universe_members`
    pub universe_members: usize,
}

/// SQLite [`DataEngine`].
#[derive(Debug)]
pub struct SqliteEngine {
    conn: Connection,
}

type LongRow = (String, String, String, Option<f64>);

impl SqliteEngine {
    /// Open (or create) a database file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let engine = Self { conn };
        engine.initialize_schema()?;
        Ok(engine)
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let engine = Self { conn };
        engine.initialize_schema()?;
        Ok(engine)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS market (
                trade_date TEXT NOT NULL,
                code TEXT NOT NULL,
                is_open INTEGER NOT NULL,
                chg_pct REAL,
                PRIMARY KEY (trade_date, code)
            );
            CREATE TABLE IF NOT EXISTS factor_values (
                trade_date TEXT NOT NULL,
                code TEXT NOT NULL,
                factor TEXT NOT NULL,
                value REAL,
                PRIMARY KEY (trade_date, code, factor)
            );
            CREATE INDEX IF NOT EXISTS idx_factor_values_factor ON factor_values(factor, trade_date);
            CREATE TABLE IF NOT EXISTS industry (
                trade_date TEXT NOT NULL,
                code TEXT NOT NULL,
                industry_code INTEGER NOT NULL,
                industry TEXT NOT NULL,
                PRIMARY KEY (trade_date, code)
            );
            CREATE TABLE IF NOT EXISTS benchmark_weights (
                trade_date TEXT NOT NULL,
                benchmark INTEGER NOT NULL,
                code TEXT NOT NULL,
                weight REAL NOT NULL,
                PRIMARY KEY (trade_date, benchmark, code)
            );
            CREATE TABLE IF NOT EXISTS risk_exposures (
                trade_date TEXT NOT NULL,
                code TEXT NOT NULL,
                risk_model TEXT NOT NULL,
                factor TEXT NOT NULL,
                value REAL,
                PRIMARY KEY (trade_date, code, risk_model, factor)
            );
            CREATE INDEX IF NOT EXISTS idx_risk_model ON risk_exposures(risk_model, trade_date);
            CREATE TABLE IF NOT EXISTS universe_members (
                trade_date TEXT NOT NULL,
                universe TEXT NOT NULL,
                code TEXT NOT NULL,
                PRIMARY KEY (trade_date, universe, code)
            );",
        )?;
        Ok(())
    }

    /// Store daily market records.
    pub fn put_market(&self, bars: &[MarketBar]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO market (trade_date, code, is_open, chg_pct)
                 VALUES (?1, ?2, ?3, ?4)",
                params![bar.trade_date.to_string(), bar.code, bar.is_open, bar.chg_pct],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Store raw factor values.
    pub fn put_factor_values(&self, values: &[FactorValue]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for v in values {
            tx.execute(
                "INSERT OR REPLACE INTO factor_values (trade_date, code, factor, value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![v.trade_date.to_string(), v.code, v.factor, v.value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Store industry classifications.
    pub fn put_industries(&self, records: &[IndustryRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for r in records {
            tx.execute(
                "INSERT OR REPLACE INTO industry (trade_date, code, industry_code, industry)
                 VALUES (?1, ?2, ?3, ?4)",
                params![r.trade_date.to_string(), r.code, r.industry_code, r.industry],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Store benchmark weights.
    pub fn put_benchmark_weights(&self, weights: &[BenchmarkWeight]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for w in weights {
            tx.execute(
                "INSERT OR REPLACE INTO benchmark_weights (trade_date, benchmark, code, weight)
                 VALUES (?1, ?2, ?3, ?4)",
                params![w.trade_date.to_string(), w.benchmark, w.code, w.weight],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Store risk exposures.
    pub fn put_risk_exposures(&self, exposures: &[RiskExposure]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for e in exposures {
            tx.execute(
                "INSERT OR REPLACE INTO risk_exposures (trade_date, code, risk_model, factor, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    e.trade_date.to_string(),
                    e.code,
                    e.risk_model.as_str(),
                    e.factor,
                    e.value
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Store universe membership.
    pub fn put_universe_members(&self, members: &[UniverseMember]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for m in members {
            tx.execute(
                "INSERT OR REPLACE INTO universe_members (trade_date, universe, code)
                 VALUES (?1, ?2, ?3)",
                params![m.trade_date.to_string(), m.universe, m.code],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Row counts per table.
    pub fn stats(&self) -> Result<SqliteStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(SqliteStats {
            market_rows: count("market")?,
            factor_values: count("factor_values")?,
            industry_rows: count("industry")?,
            benchmark_weights: count("benchmark_weights")?,
            risk_exposures: count("risk_exposures")?,
            universe_members: count("universe_members")?,
        })
    }

    /// Market rows with `from <= trade_date <= to` (either bound optional).
    fn load_market(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_date, code, is_open, chg_pct FROM market
             WHERE (?1 IS NULL OR trade_date >= ?1) AND (?2 IS NULL OR trade_date <= ?2)
             ORDER BY trade_date, code",
        )?;
        let rows = stmt.query_map(
            params![from.map(|d| d.to_string()), to.map(|d| d.to_string())],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            },
        )?;

        let mut dates = Vec::new();
        let mut codes = Vec::new();
        let mut is_open = Vec::new();
        let mut changes = Vec::new();
        for row in rows {
            let (date, code, open, chg) = row?;
            dates.push(parse_date(&date)?);
            codes.push(code);
            is_open.push(open);
            changes.push(chg);
        }
        debug!("Loaded {} market rows", dates.len());

        Ok(DataFrame::new(vec![
            date_series(TRADE_DATE, &dates).into(),
            Column::new(CODE.into(), codes),
            Column::new(IS_OPEN.into(), is_open),
            Column::new(CHG_PCT.into(), changes),
        ])?)
    }

    fn load_factor_values(&self, names: &[String], to: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_date, code, factor, value FROM factor_values
             WHERE factor = ?1 AND trade_date <= ?2",
        )?;

        let mut rows: Vec<LongRow> = Vec::new();
        for name in names {
            let mapped = stmt.query_map(params![name, to.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            for row in mapped {
                rows.push(row?);
            }
        }
        pivot_long(rows, names)
    }

    fn load_industries(&self, from: NaiveDate, to: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_date, code, industry_code, industry FROM industry
             WHERE trade_date >= ?1 AND trade_date <= ?2",
        )?;
        let rows = stmt.query_map(params![from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut dates = Vec::new();
        let mut codes = Vec::new();
        let mut industry_codes = Vec::new();
        let mut industries = Vec::new();
        for row in rows {
            let (date, code, industry_code, industry) = row?;
            dates.push(parse_date(&date)?);
            codes.push(code);
            industry_codes.push(industry_code);
            industries.push(industry);
        }

        Ok(DataFrame::new(vec![
            date_series(TRADE_DATE, &dates).into(),
            Column::new(CODE.into(), codes),
            Column::new(INDUSTRY_CODE.into(), industry_codes),
            Column::new(INDUSTRY.into(), industries),
        ])?)
    }

    fn load_benchmark(&self, benchmark: i64, from: NaiveDate, to: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_date, code, weight FROM benchmark_weights
             WHERE benchmark = ?1 AND trade_date >= ?2 AND trade_date <= ?3",
        )?;
        let rows = stmt.query_map(params![benchmark, from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut dates = Vec::new();
        let mut codes = Vec::new();
        let mut weights = Vec::new();
        for row in rows {
            let (date, code, weight) = row?;
            dates.push(parse_date(&date)?);
            codes.push(code);
            weights.push(weight);
        }

        Ok(DataFrame::new(vec![
            date_series(TRADE_DATE, &dates).into(),
            Column::new(CODE.into(), codes),
            Column::new(WEIGHT.into(), weights),
        ])?)
    }

    /// Risk factor names stored for a model, in lexicographic order.
    pub fn risk_factor_names(&self, risk_model: RiskModel) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT factor FROM risk_exposures WHERE risk_model = ?1 ORDER BY factor",
        )?;
        let names = stmt
            .query_map(params![risk_model.as_str()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn load_risk(&self, risk_model: RiskModel, from: NaiveDate, to: NaiveDate) -> Result<DataFrame> {
        let names = self.risk_factor_names(risk_model)?;
        if names.is_empty() {
            return Err(DataError::MissingData {
                dataset: format!("risk model {risk_model}"),
                reason: "no exposures stored".to_string(),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT trade_date, code, factor, value FROM risk_exposures
             WHERE risk_model = ?1 AND trade_date >= ?2 AND trade_date <= ?3",
        )?;
        let rows = stmt
            .query_map(
                params![risk_model.as_str(), from.to_string(), to.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?
            .collect::<std::result::Result<Vec<LongRow>, _>>()?;
        pivot_long(rows, &names)
    }

    fn load_members(&self, universe: &Universe, from: NaiveDate, to: NaiveDate) -> Result<Option<DataFrame>> {
        if universe.codes().is_some() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT trade_date, code FROM universe_members
             WHERE universe = ?1 AND trade_date >= ?2 AND trade_date <= ?3",
        )?;
        let rows = stmt.query_map(params![universe.name(), from.to_string(), to.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut dates = Vec::new();
        let mut codes = Vec::new();
        for row in rows {
            let (date, code) = row?;
            dates.push(parse_date(&date)?);
            codes.push(code);
        }
        if dates.is_empty() {
            return Err(DataError::UnknownUniverse(universe.name().to_string()));
        }

        Ok(Some(DataFrame::new(vec![
            date_series(TRADE_DATE, &dates).into(),
            Column::new(CODE.into(), codes),
        ])?))
    }

    fn with_members(
        &self,
        engine: InMemoryEngine,
        universe: &Universe,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<InMemoryEngine> {
        match self.load_members(universe, from, to)? {
            Some(members) => engine.with_universe(universe.name(), members),
            None => Ok(engine),
        }
    }
}

/// Inclusive date span of a request.
fn span(dates: &[NaiveDate]) -> Result<(NaiveDate, NaiveDate)> {
    match (dates.iter().min(), dates.iter().max()) {
        (Some(min), Some(max)) => Ok((*min, *max)),
        _ => Err(DataError::MissingData {
            dataset: "request".to_string(),
            reason: "no dates requested".to_string(),
        }),
    }
}

/// Pivot `(trade_date, code, name, value)` rows into one column per name.
fn pivot_long(rows: Vec<LongRow>, names: &[String]) -> Result<DataFrame> {
    let position: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut table: BTreeMap<(NaiveDate, String), Vec<Option<f64>>> = BTreeMap::new();
    for (date, code, name, value) in rows {
        let Some(&idx) = position.get(name.as_str()) else {
            continue;
        };
        let key = (parse_date(&date)?, code);
        table.entry(key).or_insert_with(|| vec![None; names.len()])[idx] = value;
    }

    let mut dates = Vec::with_capacity(table.len());
    let mut codes = Vec::with_capacity(table.len());
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(table.len()); names.len()];
    for ((date, code), row) in table {
        dates.push(date);
        codes.push(code);
        for (column, value) in values.iter_mut().zip(row) {
            column.push(value);
        }
    }

    let mut columns: Vec<Column> = vec![
        date_series(TRADE_DATE, &dates).into(),
        Column::new(CODE.into(), codes),
    ];
    for (name, column) in names.iter().zip(values) {
        columns.push(Column::new(name.as_str().into(), column));
    }
    Ok(DataFrame::new(columns)?)
}

impl DataEngine for SqliteEngine {
    fn fetch_factor_panel(
        &self,
        universe: &Universe,
        transformer: &Transformer,
        dates: &[NaiveDate],
    ) -> Result<DataFrame> {
        let (from, to) = span(dates)?;
        let engine = InMemoryEngine::new()
            .with_market(self.load_market(None, Some(to))?)?
            .with_factors(self.load_factor_values(&transformer.dependencies(), to)?)?;
        self.with_members(engine, universe, from, to)?
            .fetch_factor_panel(universe, transformer, dates)
    }

    fn fetch_forward_return_panel(
        &self,
        universe: &Universe,
        dates: &[NaiveDate],
        horizon: usize,
    ) -> Result<DataFrame> {
        let (from, to) = span(dates)?;
        let engine = InMemoryEngine::new().with_market(self.load_market(Some(from), None)?)?;
        self.with_members(engine, universe, from, to)?
            .fetch_forward_return_panel(universe, dates, horizon)
    }

    fn fetch_industry_panel(&self, universe: &Universe, dates: &[NaiveDate]) -> Result<DataFrame> {
        let (from, to) = span(dates)?;
        let engine = InMemoryEngine::new().with_industries(self.load_industries(from, to)?)?;
        self.with_members(engine, universe, from, to)?
            .fetch_industry_panel(universe, dates)
    }

    fn fetch_benchmark_panel(&self, benchmark: i64, dates: &[NaiveDate]) -> Result<DataFrame> {
        let (from, to) = span(dates)?;
        InMemoryEngine::new()
            .with_benchmark(benchmark, self.load_benchmark(benchmark, from, to)?)?
            .fetch_benchmark_panel(benchmark, dates)
    }

    fn fetch_risk_panel(
        &self,
        universe: &Universe,
        dates: &[NaiveDate],
        risk_model: RiskModel,
    ) -> Result<DataFrame> {
        let (from, to) = span(dates)?;
        let engine = InMemoryEngine::new()
            .with_risk_exposures(risk_model, self.load_risk(risk_model, from, to)?)?;
        self.with_members(engine, universe, from, to)?
            .fetch_risk_panel(universe, dates, risk_model)
    }
}
