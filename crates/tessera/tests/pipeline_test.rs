//! End-to-end data package tests on an in-memory engine.

use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::Axis;
use polars::prelude::*;
use std::cell::RefCell;
use tessera::data::frame::{CHG_PCT, CODE, DX, INDUSTRY, INDUSTRY_CODE, IS_OPEN, TRADE_DATE, WEIGHT, date_series};
use tessera::data::{FactorDefinition, FactorSpec, InMemoryEngine, RiskModel, Transformer, Universe};
use tessera::processing::{ProcessingPipeline, ProcessingStep};
use tessera::{
    Calendar, DataPackage, Error, PipelineConfig, PipelineObserver, SilentObserver, fetch_data_package,
    fetch_data_package_with, prepare_data,
};

const CODES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

fn ymd(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn trading_days() -> Vec<NaiveDate> {
    Calendar::weekends_only().business_days_between(ymd(1, 2), ymd(2, 29))
}

/// Six instruments over January and February 2024. `E` has a NaN `EPS` on
/// 2024-01-15; `A` and `B` are the benchmark constituents.
fn engine() -> InMemoryEngine {
    let days = trading_days();
    let mut dates = Vec::new();
    let mut codes = Vec::new();
    let mut chg = Vec::new();
    let mut eps = Vec::new();
    let mut bp = Vec::new();
    let mut industry_codes = Vec::new();
    let mut industries = Vec::new();
    let mut size = Vec::new();
    let mut beta = Vec::new();
    let mut bench_dates = Vec::new();
    let mut bench_codes = Vec::new();

    for (i, day) in days.iter().enumerate() {
        for (j, code) in CODES.iter().enumerate() {
            dates.push(*day);
            codes.push(*code);
            chg.push(((i * 7 + j * 3) % 11) as f64 * 0.002 - 0.01);
            eps.push(if *code == "E" && *day == ymd(1, 15) {
                f64::NAN
            } else {
                ((i * 13 + j * 7) % 17) as f64 / 10.0
            });
            bp.push(((i * 5 + j * 11) % 13) as f64 / 5.0 + 0.1);
            industry_codes.push(if j % 2 == 0 { 10_i64 } else { 20 });
            industries.push(if j % 2 == 0 { "Banks" } else { "Media" });
            size.push(j as f64 + (i % 3) as f64 * 0.1);
            beta.push(1.0);
            if j < 2 {
                bench_dates.push(*day);
                bench_codes.push(*code);
            }
        }
    }

    let keys = |dates: &[NaiveDate], codes: &[&str]| -> Vec<Column> {
        vec![
            date_series(TRADE_DATE, dates).into(),
            Column::new(CODE.into(), codes.to_vec()),
        ]
    };
    let with = |mut columns: Vec<Column>, extra: Vec<Column>| {
        columns.extend(extra);
        DataFrame::new(columns).unwrap()
    };

    let n = dates.len();
    let market = with(
        keys(&dates, &codes),
        vec![
            Column::new(IS_OPEN.into(), vec![true; n]),
            Column::new(CHG_PCT.into(), chg),
        ],
    );
    let factors = with(
        keys(&dates, &codes),
        vec![Column::new("EPS".into(), eps), Column::new("BP".into(), bp)],
    );
    let industry = with(
        keys(&dates, &codes),
        vec![
            Column::new(INDUSTRY_CODE.into(), industry_codes),
            Column::new(INDUSTRY.into(), industries),
        ],
    );
    let risk = with(
        keys(&dates, &codes),
        vec![Column::new("SIZE".into(), size), Column::new("BETA".into(), beta)],
    );
    let bench_n = bench_dates.len();
    let benchmark = with(
        keys(&bench_dates, &bench_codes),
        vec![Column::new(WEIGHT.into(), vec![0.5; bench_n])],
    );

    InMemoryEngine::new()
        .with_market(market)
        .unwrap()
        .with_factors(factors)
        .unwrap()
        .with_industries(industry)
        .unwrap()
        .with_benchmark(905, benchmark)
        .unwrap()
        .with_risk_exposures(RiskModel::Short, risk)
        .unwrap()
}

/// Weekly schedule 2024-01-08 .. 2024-02-26 (8 Mondays). The last Monday has
/// no complete forward window, so the panel spans 7 dates.
fn config() -> PipelineConfig {
    PipelineConfig {
        factors: vec!["EPS".to_string(), "BP".to_string()],
        start_date: ymd(1, 8),
        end_date: ymd(2, 26),
        frequency: "1w".to_string(),
        universe: Universe::from_codes("all", CODES),
        benchmark: 905,
        batch_size: 2,
        pre_process: Vec::new(),
        post_process: Vec::new(),
        ..Default::default()
    }
}

fn run(config: &PipelineConfig) -> DataPackage {
    fetch_data_package(&engine(), config.factor_spec(), config, SilentObserver).unwrap()
}

#[derive(Default)]
struct RecordingObserver {
    infos: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
}

impl PipelineObserver for RecordingObserver {
    fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

#[test]
fn test_bucket_keys_and_shapes() {
    let package = run(&config());

    assert_eq!(package.x_names, vec!["EPS", "BP"]);
    let keys: Vec<NaiveDate> = package.train.x.keys().copied().collect();
    assert_eq!(keys, vec![ymd(1, 22), ymd(1, 29), ymd(2, 5), ymd(2, 12), ymd(2, 19)]);
    assert_eq!(package.predict.x.keys().copied().collect::<Vec<_>>(), keys);
    assert_eq!(package.predict.y.len(), 5);

    // E's NaN on 01-15 drops one row from the windows covering that date
    assert_eq!(package.train.x[&ymd(1, 22)].dim(), (11, 2));
    assert_eq!(package.train.x[&ymd(1, 29)].dim(), (11, 2));
    assert_eq!(package.train.x[&ymd(2, 5)].dim(), (12, 2));
    assert_eq!(package.train.y[&ymd(2, 5)].dim(), (12, 1));
    for (date, x) in &package.predict.x {
        assert_eq!(x.dim(), (6, 2), "{date}");
        assert_eq!(package.predict.y[date].dim(), (6, 1), "{date}");
    }
}

#[test]
fn test_settlement_frame() {
    let package = run(&config());
    let settlement = &package.settlement;

    assert_eq!(
        settlement.get_column_names_str(),
        vec![TRADE_DATE, CODE, DX, WEIGHT, INDUSTRY, INDUSTRY_CODE, IS_OPEN]
    );
    assert_eq!(settlement.height(), 7 * 6 - 1);

    // only A and B are in the benchmark; the rest default to 0
    let codes = settlement.column(CODE).unwrap().str().unwrap();
    let weights = settlement.column(WEIGHT).unwrap().f64().unwrap();
    for (code, weight) in codes.into_iter().zip(weights) {
        let expected = if matches!(code, Some("A" | "B")) { 0.5 } else { 0.0 };
        assert_eq!(weight, Some(expected));
    }
}

#[test]
fn test_train_window_has_no_leakage() {
    let config = config();
    let package = run(&config);
    let transformer = Transformer::from_names(config.factors.clone()).unwrap();
    let prepared = prepare_data(&engine(), &transformer, &config).unwrap();
    let labels = prepared.panel.date_labels().unwrap();
    let features = prepared.panel.feature_array().unwrap();

    // identity processing: the bucket is exactly the rows in [01-15, 01-29)
    let rows: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, d)| **d >= ymd(1, 15) && **d < ymd(1, 29))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(package.train.x[&ymd(1, 29)], features.select(Axis(0), &rows));

    // predict rows are all labelled with the key
    let at_key: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == ymd(1, 29))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(package.predict.x[&ymd(1, 29)], features.select(Axis(0), &at_key));
}

#[test]
fn test_neutralized_windows_are_orthogonal_to_risk() {
    let config = PipelineConfig {
        neutralized_risk: vec!["SIZE".to_string()],
        pre_process: vec![ProcessingStep::winsorize()],
        ..config()
    };
    let package = run(&config);

    assert_eq!(package.settlement.get_column_names_str().last(), Some(&"SIZE"));
    let size: Vec<f64> = package
        .settlement
        .column("SIZE")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();

    // settlement rows are sorted by date, so the 01-22 train window is the
    // first 11 rows (01-08 and 01-15)
    let x = &package.train.x[&ymd(1, 22)];
    for factor in x.axis_iter(Axis(1)) {
        let dot: f64 = factor.iter().zip(&size[..11]).map(|(v, s)| v * s).sum();
        assert_abs_diff_eq!(dot, 0.0, epsilon = 1e-8);
    }
}

#[test]
fn test_risk_name_equal_to_factor_name() {
    let config = PipelineConfig {
        neutralized_risk: vec!["EPS".to_string()],
        ..config()
    };
    let package = run(&config);

    // EPS neutralized against itself leaves nothing
    let x = &package.train.x[&ymd(2, 5)];
    for v in x.column(0) {
        assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-8);
    }
    assert_eq!(package.settlement.get_column_names_str().last(), Some(&"EPS"));
}

#[test]
fn test_idempotent() {
    let config = PipelineConfig {
        pre_process: vec![ProcessingStep::winsorize(), ProcessingStep::Standardize],
        neutralized_risk: vec!["SIZE".to_string()],
        ..config()
    };
    let first = run(&config);
    let second = run(&config);

    assert_eq!(first.train, second.train);
    assert_eq!(first.predict, second.predict);
    assert!(first.settlement.equals(&second.settlement));
}

#[test]
fn test_observer_messages() {
    let observer = RecordingObserver::default();
    let config = config();
    fetch_data_package(&engine(), config.factor_spec(), &config, &observer).unwrap();

    assert_eq!(
        *observer.infos.borrow(),
        vec![
            "Starting data package fetching ...",
            "Loading data is finished",
            "Data processing is finished"
        ]
    );
    // 02-26 has no complete forward window
    assert_eq!(observer.warnings.borrow().len(), 1);
}

#[test]
fn test_derived_factors() {
    let transformer = Transformer::new(vec![
        FactorDefinition::raw("BP"),
        FactorDefinition::derived("EPS_BP", ["EPS", "BP"], col("EPS") * col("BP")),
    ])
    .unwrap();
    let config = config();
    let package = fetch_data_package_with(
        &engine(),
        FactorSpec::from(transformer),
        &config,
        &ProcessingPipeline::identity(),
        SilentObserver,
    )
    .unwrap();

    assert_eq!(package.x_names, vec!["BP", "EPS_BP"]);
    assert_eq!(package.train.x[&ymd(2, 5)].ncols(), 2);
}

#[test]
fn test_warm_start_extends_schedule() {
    let config = PipelineConfig {
        warm_start: 5,
        ..config()
    };
    let transformer = Transformer::from_names(config.factors.clone()).unwrap();
    let prepared = prepare_data(&engine(), &transformer, &config).unwrap();

    assert_eq!(prepared.schedule.first(), Some(&ymd(1, 1)));
    assert_eq!(prepared.horizon, 4);
    // 2024-01-01 has no market data, so the panel still starts on 01-08
    assert_eq!(prepared.panel.date_labels().unwrap().first(), Some(&ymd(1, 8)));
}

#[test]
fn test_missing_risk_model_propagates() {
    let config = PipelineConfig {
        neutralized_risk: vec!["SIZE".to_string()],
        risk_model: RiskModel::Long,
        ..config()
    };
    let err = fetch_data_package(&engine(), config.factor_spec(), &config, SilentObserver).unwrap_err();
    assert!(matches!(err, Error::Data(_)));
}

#[test]
fn test_batch_size_covering_schedule_yields_nothing() {
    let config = PipelineConfig {
        batch_size: 7,
        ..config()
    };
    let package = run(&config);
    assert!(package.train.x.is_empty());
    assert!(package.predict.x.is_empty());
    assert_eq!(package.settlement.height(), 41);
}
