//! Factor resolution.
//!
//! Callers hand the pipeline either plain factor names or a [`Transformer`]
//! of derived factor definitions. Both are resolved once into a
//! [`Transformer`]: an ordered list of output names, the raw columns they
//! depend on, and the polars expressions that compute them.

use crate::error::{DataError, Result};
use crate::frame::{CODE, IS_OPEN, TRADE_DATE};
use polars::prelude::*;
use std::collections::HashSet;

/// One output factor: its name, the raw columns it reads, and the expression
/// computing it.
#[derive(Debug, Clone)]
pub struct FactorDefinition {
    name: String,
    dependencies: Vec<String>,
    expression: Expr,
}

impl FactorDefinition {
    /// A factor read directly from the raw column of the same name.
    pub fn raw(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            expression: col(name.as_str()),
            dependencies: vec![name.clone()],
            name,
        }
    }

    /// A factor computed from `dependencies` by `expression`.
    ///
    /// The expression is evaluated on raw data sorted by `(code, trade_date)`,
    /// so time-series expressions should be windowed with
    /// `.over([col("code")])`.
    pub fn derived<I, S>(name: impl Into<String>, dependencies: I, expression: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            expression,
        }
    }

    /// Output name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw columns read by the expression.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Ordered set of factor definitions.
#[derive(Debug, Clone)]
pub struct Transformer {
    factors: Vec<FactorDefinition>,
}

impl Transformer {
    /// Build a transformer, rejecting empty lists and duplicate names.
    pub fn new(factors: Vec<FactorDefinition>) -> Result<Self> {
        if factors.is_empty() {
            return Err(DataError::NoFactors);
        }
        let mut seen = HashSet::new();
        for factor in &factors {
            if !seen.insert(factor.name()) {
                return Err(DataError::DuplicateFactor(factor.name().to_string()));
            }
        }
        Ok(Self { factors })
    }

    /// Transformer reading each name directly from raw data.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(FactorDefinition::raw).collect())
    }

    /// Output factor names, in definition order.
    pub fn names(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.name.clone()).collect()
    }

    /// Distinct raw columns needed, in first-use order.
    pub fn dependencies(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.factors
            .iter()
            .flat_map(|f| f.dependencies.iter())
            .filter(|dep| seen.insert(dep.as_str()))
            .cloned()
            .collect()
    }

    /// Evaluate every definition over `raw`.
    ///
    /// `raw` must carry `trade_date`, `code`, `isOpen` and every dependency.
    /// The result has those three key columns followed by one column per
    /// factor, sorted by `(trade_date, code)`.
    pub fn apply(&self, raw: LazyFrame) -> LazyFrame {
        let mut exprs = vec![col(TRADE_DATE), col(CODE), col(IS_OPEN)];
        exprs.extend(
            self.factors
                .iter()
                .map(|f| f.expression.clone().cast(DataType::Float64).alias(f.name.as_str())),
        );

        raw.sort([CODE, TRADE_DATE], SortMultipleOptions::default())
            .select(exprs)
            .sort([TRADE_DATE, CODE], SortMultipleOptions::default())
    }
}

/// Factor input accepted by the pipeline.
#[derive(Debug, Clone)]
pub enum FactorSpec {
    /// Plain factor names read from raw data.
    Names(Vec<String>),
    /// Already-resolved definitions.
    Transformer(Transformer),
}

impl FactorSpec {
    /// Resolve into a [`Transformer`].
    pub fn resolve(self) -> Result<Transformer> {
        match self {
            Self::Names(names) => Transformer::from_names(names),
            Self::Transformer(transformer) => Ok(transformer),
        }
    }
}

impl From<Transformer> for FactorSpec {
    fn from(transformer: Transformer) -> Self {
        Self::Transformer(transformer)
    }
}

impl From<Vec<String>> for FactorSpec {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}
