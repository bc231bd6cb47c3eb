//! Risk model identifiers.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Horizon variant of the risk model whose exposures are used for
/// neutralization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskModel {
    /// Short-horizon model
    #[default]
    Short,
    /// Long-horizon model
    Long,
    /// Daily model
    Day,
}

impl RiskModel {
    /// Storage name of the model.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
            Self::Day => "day",
        }
    }

    /// All known models.
    pub const fn all() -> [Self; 3] {
        [Self::Short, Self::Long, Self::Day]
    }
}

impl FromStr for RiskModel {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            "day" => Ok(Self::Day),
            _ => Err(DataError::UnknownRiskModel(s.to_string())),
        }
    }
}

impl fmt::Display for RiskModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("short", RiskModel::Short)]
    #[case("LONG", RiskModel::Long)]
    #[case("day", RiskModel::Day)]
    fn test_parse(#[case] input: &str, #[case] expected: RiskModel) {
        assert_eq!(input.parse::<RiskModel>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_model() {
        let err = "medium".parse::<RiskModel>().unwrap_err();
        assert!(matches!(err, DataError::UnknownRiskModel(name) if name == "medium"));
    }

    #[test]
    fn test_round_trip_names() {
        for model in RiskModel::all() {
            assert_eq!(model.to_string().parse::<RiskModel>().unwrap(), model);
        }
    }
}
