use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::detect::IssueKind;
use crate::error::SurgeonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    FillMean,
    FillMedian,
    FillMode,
    FillZero,
    FillValue,
    DropNullRows,
    CapOutliers,
    RemoveOutlierRows,
    ReplaceOutliersMedian,
    DropDuplicates,
    ClampToRange,
    MakeAbsolute,
    ReplaceWithMode,
    ReplaceWithValue,
    RemoveViolatingRows,
    DropExtraColumns,
    AutoPilot,
}

/// What a strategy needs in its params to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Column,
    OptionalColumn,
    Rule,
    Dataset,
}

impl StrategyId {
    pub const ALL: [StrategyId; 17] = [
        StrategyId::FillMean,
        StrategyId::FillMedian,
        StrategyId::FillMode,
        StrategyId::FillZero,
        StrategyId::FillValue,
        StrategyId::DropNullRows,
        StrategyId::CapOutliers,
        StrategyId::RemoveOutlierRows,
        StrategyId::ReplaceOutliersMedian,
        StrategyId::DropDuplicates,
        StrategyId::ClampToRange,
        StrategyId::MakeAbsolute,
        StrategyId::ReplaceWithMode,
        StrategyId::ReplaceWithValue,
        StrategyId::RemoveViolatingRows,
        StrategyId::DropExtraColumns,
        StrategyId::AutoPilot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::FillMean => "fill-mean",
            StrategyId::FillMedian => "fill-median",
            StrategyId::FillMode => "fill-mode",
            StrategyId::FillZero => "fill-zero",
            StrategyId::FillValue => "fill-value",
            StrategyId::DropNullRows => "drop-null-rows",
            StrategyId::CapOutliers => "cap-outliers",
            StrategyId::RemoveOutlierRows => "remove-outlier-rows",
            StrategyId::ReplaceOutliersMedian => "replace-outliers-median",
            StrategyId::DropDuplicates => "drop-duplicates",
            StrategyId::ClampToRange => "clamp-to-range",
            StrategyId::MakeAbsolute => "make-absolute",
            StrategyId::ReplaceWithMode => "replace-with-mode",
            StrategyId::ReplaceWithValue => "replace-with-value",
            StrategyId::RemoveViolatingRows => "remove-violating-rows",
            StrategyId::DropExtraColumns => "drop-extra-columns",
            StrategyId::AutoPilot => "auto-pilot",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyId::FillMean => "Replace nulls with the column mean",
            StrategyId::FillMedian => "Replace nulls with the column median",
            StrategyId::FillMode => "Replace nulls with the most frequent value",
            StrategyId::FillZero => "Replace nulls with 0",
            StrategyId::FillValue => "Replace nulls with a given value",
            StrategyId::DropNullRows => "Remove rows containing nulls",
            StrategyId::CapOutliers => "Clamp outliers to the nearest bound",
            StrategyId::RemoveOutlierRows => "Remove rows holding outliers",
            StrategyId::ReplaceOutliersMedian => "Replace outliers with the column median",
            StrategyId::DropDuplicates => "Keep only the first of each duplicate group",
            StrategyId::ClampToRange => "Clamp rule violations into the allowed range",
            StrategyId::MakeAbsolute => "Make negative values positive",
            StrategyId::ReplaceWithMode => "Replace rule violations with the most frequent valid value",
            StrategyId::ReplaceWithValue => "Replace rule violations with a given value",
            StrategyId::RemoveViolatingRows => "Remove rows that break the rule",
            StrategyId::DropExtraColumns => "Drop columns absent from the schema baseline",
            StrategyId::AutoPilot => "Apply the default fix for every open issue",
        }
    }

    pub fn target(&self) -> Target {
        match self {
            StrategyId::FillMean
            | StrategyId::FillMedian
            | StrategyId::FillMode
            | StrategyId::FillZero
            | StrategyId::FillValue
            | StrategyId::CapOutliers
            | StrategyId::RemoveOutlierRows
            | StrategyId::ReplaceOutliersMedian => Target::Column,
            StrategyId::DropNullRows | StrategyId::MakeAbsolute => Target::OptionalColumn,
            StrategyId::ClampToRange
            | StrategyId::ReplaceWithMode
            | StrategyId::ReplaceWithValue
            | StrategyId::RemoveViolatingRows => Target::Rule,
            StrategyId::DropDuplicates | StrategyId::DropExtraColumns | StrategyId::AutoPilot => {
                Target::Dataset
            }
        }
    }

    pub fn needs_value(&self) -> bool {
        matches!(self, StrategyId::FillValue | StrategyId::ReplaceWithValue)
    }

    /// Issue kinds this strategy resolves. Auto-pilot resolves all of them.
    pub fn resolves(&self) -> &'static [IssueKind] {
        match self {
            StrategyId::FillMean
            | StrategyId::FillMedian
            | StrategyId::FillMode
            | StrategyId::FillZero
            | StrategyId::FillValue
            | StrategyId::DropNullRows => &[IssueKind::NullExplosion],
            StrategyId::CapOutliers
            | StrategyId::RemoveOutlierRows
            | StrategyId::ReplaceOutliersMedian => &[IssueKind::Outlier],
            StrategyId::DropDuplicates => &[IssueKind::DuplicateRows],
            StrategyId::ClampToRange
            | StrategyId::ReplaceWithMode
            | StrategyId::ReplaceWithValue
            | StrategyId::RemoveViolatingRows => &[IssueKind::BusinessRule],
            StrategyId::MakeAbsolute => &[IssueKind::BusinessRule, IssueKind::Outlier],
            StrategyId::DropExtraColumns => &[IssueKind::SchemaDrift],
            StrategyId::AutoPilot => &IssueKind::ALL,
        }
    }

    pub fn removes_rows(&self) -> bool {
        matches!(
            self,
            StrategyId::DropNullRows
                | StrategyId::RemoveOutlierRows
                | StrategyId::DropDuplicates
                | StrategyId::RemoveViolatingRows
        )
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = SurgeonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        if let Some(id) = StrategyId::ALL.iter().find(|id| id.as_str() == normalized) {
            return Ok(*id);
        }
        match normalized.as_str() {
            "mean" => Ok(StrategyId::FillMean),
            "median" => Ok(StrategyId::FillMedian),
            "mode" => Ok(StrategyId::FillMode),
            "zero" | "0" => Ok(StrategyId::FillZero),
            "remove" | "drop" => Ok(StrategyId::DropNullRows),
            "cap" | "clip" => Ok(StrategyId::CapOutliers),
            "dedupe" | "dedup" => Ok(StrategyId::DropDuplicates),
            "clamp" => Ok(StrategyId::ClampToRange),
            "abs" | "absolute" => Ok(StrategyId::MakeAbsolute),
            "auto" | "autopilot" => Ok(StrategyId::AutoPilot),
            _ => Err(SurgeonError::UnknownStrategy(s.to_string())),
        }
    }
}

impl Serialize for StrategyId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StrategyId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for id in StrategyId::ALL {
            assert_eq!(id.as_str().parse::<StrategyId>().unwrap(), id);
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("mean".parse::<StrategyId>().unwrap(), StrategyId::FillMean);
        assert_eq!("0".parse::<StrategyId>().unwrap(), StrategyId::FillZero);
        assert_eq!("AUTO".parse::<StrategyId>().unwrap(), StrategyId::AutoPilot);
        assert_eq!("fill_median".parse::<StrategyId>().unwrap(), StrategyId::FillMedian);
    }

    #[test]
    fn test_unknown_strategy() {
        let err = "teleport".parse::<StrategyId>().unwrap_err();
        assert!(matches!(err, SurgeonError::UnknownStrategy(ref s) if s == "teleport"));
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&StrategyId::CapOutliers).unwrap();
        assert_eq!(json, "\"cap-outliers\"");
        let back: StrategyId = serde_json::from_str("\"drop-duplicates\"").unwrap();
        assert_eq!(back, StrategyId::DropDuplicates);
    }
}
