//! Round trip through the SQLite engine on an in-memory database.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use tessera_data::frame::{CODE, DX, INDUSTRY, TRADE_DATE, WEIGHT, date_values};
use tessera_data::{
    BenchmarkWeight, DataEngine, DataError, FactorValue, IndustryRecord, MarketBar, RiskExposure,
    RiskModel, SqliteEngine, Transformer, Universe, UniverseMember,
};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn codes(df: &polars::prelude::DataFrame) -> Vec<String> {
    df.column(CODE)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|c| c.unwrap().to_string())
        .collect()
}

fn seeded() -> SqliteEngine {
    let engine = SqliteEngine::in_memory().unwrap();
    let days = [2, 3, 4, 5];

    let mut bars = Vec::new();
    let mut factors = Vec::new();
    let mut industries = Vec::new();
    let mut exposures = Vec::new();
    let mut members = Vec::new();
    for (i, day) in days.iter().enumerate() {
        for (j, code) in ["A", "B", "C"].iter().enumerate() {
            bars.push(MarketBar {
                trade_date: d(*day),
                code: code.to_string(),
                is_open: true,
                chg_pct: Some(0.01 * (j as f64 + 1.0)),
            });
            factors.push(FactorValue {
                trade_date: d(*day),
                code: code.to_string(),
                factor: "EPS".to_string(),
                value: Some((10 * i + j) as f64),
            });
            factors.push(FactorValue {
                trade_date: d(*day),
                code: code.to_string(),
                factor: "BP".to_string(),
                value: if *code == "C" { None } else { Some(0.5) },
            });
            industries.push(IndustryRecord {
                trade_date: d(*day),
                code: code.to_string(),
                industry_code: 100 + j as i64 % 2,
                industry: if j % 2 == 0 { "Banks" } else { "Media" }.to_string(),
            });
            for factor in ["SIZE", "BETA"] {
                exposures.push(RiskExposure {
                    trade_date: d(*day),
                    code: code.to_string(),
                    risk_model: RiskModel::Short,
                    factor: factor.to_string(),
                    value: Some(j as f64),
                });
            }
            if *code != "C" || *day >= 4 {
                members.push(UniverseMember {
                    trade_date: d(*day),
                    universe: "zz800".to_string(),
                    code: code.to_string(),
                });
            }
        }
    }

    engine.put_market(&bars).unwrap();
    engine.put_factor_values(&factors).unwrap();
    engine.put_industries(&industries).unwrap();
    engine.put_risk_exposures(&exposures).unwrap();
    engine.put_universe_members(&members).unwrap();
    engine
        .put_benchmark_weights(&[BenchmarkWeight {
            trade_date: d(3),
            benchmark: 905,
            code: "A".to_string(),
            weight: 0.6,
        }])
        .unwrap();
    engine
}

#[test]
fn test_stats_after_load() {
    let stats = seeded().stats().unwrap();
    assert_eq!(stats.market_rows, 12);
    assert_eq!(stats.factor_values, 24);
    assert_eq!(stats.industry_rows, 12);
    assert_eq!(stats.benchmark_weights, 1);
    assert_eq!(stats.risk_exposures, 24);
    assert_eq!(stats.universe_members, 10);
}

#[test]
fn test_factor_panel_follows_membership() {
    let engine = seeded();
    let transformer = Transformer::from_names(["EPS", "BP"]).unwrap();
    let panel = engine
        .fetch_factor_panel(&Universe::new("zz800"), &transformer, &[d(3), d(4)])
        .unwrap();

    assert_eq!(
        panel.get_column_names_str(),
        vec![TRADE_DATE, CODE, "isOpen", "EPS", "BP"]
    );
    assert_eq!(date_values(&panel, TRADE_DATE).unwrap(), vec![d(3), d(3), d(4), d(4), d(4)]);
    assert_eq!(codes(&panel), vec!["A", "B", "A", "B", "C"]);

    // C has no BP stored, which surfaces as a null
    let bp = panel.column("BP").unwrap().f64().unwrap();
    assert_eq!(bp.get(4), None);
}

#[test]
fn test_forward_returns_from_market() {
    let engine = seeded();
    let panel = engine
        .fetch_forward_return_panel(&Universe::from_codes("ab", ["A", "B"]), &[d(2), d(4)], 0)
        .unwrap();

    // both dates have a next trading day
    assert_eq!(date_values(&panel, TRADE_DATE).unwrap(), vec![d(2), d(2), d(4), d(4)]);
    let dx = panel.column(DX).unwrap().f64().unwrap();
    assert_relative_eq!(dx.get(0).unwrap(), 0.01, epsilon = 1e-12);
    assert_relative_eq!(dx.get(1).unwrap(), 0.02, epsilon = 1e-12);
}

#[test]
fn test_industry_and_benchmark_panels() {
    let engine = seeded();
    let industries = engine
        .fetch_industry_panel(&Universe::from_codes("all", ["A", "B", "C"]), &[d(2)])
        .unwrap();
    let names: Vec<Option<&str>> = industries.column(INDUSTRY).unwrap().str().unwrap().into_iter().collect();
    assert_eq!(names, vec![Some("Banks"), Some("Media"), Some("Banks")]);

    let weights = engine.fetch_benchmark_panel(905, &[d(2), d(3)]).unwrap();
    assert_eq!(weights.height(), 1);
    assert_relative_eq!(weights.column(WEIGHT).unwrap().f64().unwrap().get(0).unwrap(), 0.6);
}

#[test]
fn test_risk_panel_columns_are_sorted_names() {
    let engine = seeded();
    let panel = engine
        .fetch_risk_panel(&Universe::new("zz800"), &[d(5)], RiskModel::Short)
        .unwrap();
    assert_eq!(panel.get_column_names_str(), vec![TRADE_DATE, CODE, "BETA", "SIZE"]);
    assert_eq!(panel.height(), 3);

    let err = engine
        .fetch_risk_panel(&Universe::new("zz800"), &[d(5)], RiskModel::Day)
        .unwrap_err();
    assert!(matches!(err, DataError::MissingData { .. }));
}

#[test]
fn test_unknown_universe() {
    let engine = seeded();
    let transformer = Transformer::from_names(["EPS"]).unwrap();
    let err = engine
        .fetch_factor_panel(&Universe::new("hs300"), &transformer, &[d(2)])
        .unwrap_err();
    assert!(matches!(err, DataError::UnknownUniverse(name) if name == "hs300"));
}

#[test]
fn test_file_backed_database() {
    let dir = std::env::temp_dir().join(format!("tessera-sqlite-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("panels.db");

    {
        let engine = SqliteEngine::new(&path).unwrap();
        engine
            .put_market(&[MarketBar {
                trade_date: d(2),
                code: "A".to_string(),
                is_open: false,
                chg_pct: None,
            }])
            .unwrap();
    }

    let reopened = SqliteEngine::new(&path).unwrap();
    assert_eq!(reopened.stats().unwrap().market_rows, 1);
    std::fs::remove_dir_all(&dir).unwrap();
}
