/*!
 * Proficiency levels and the score-to-level threshold table.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigurationError;

/// CEFR-style proficiency level, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    #[serde(rename = "C2+", alias = "C2", alias = "C2_PLUS")]
    C2Plus,
}

impl ProficiencyLevel {
    /// Every level in ascending order.
    pub const ALL: [ProficiencyLevel; 6] = [
        Self::A1,
        Self::A2,
        Self::B1,
        Self::B2,
        Self::C1,
        Self::C2Plus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2Plus => "C2+",
        }
    }

    /// Short learner-facing description
    pub fn description(&self) -> &'static str {
        match self {
            Self::A1 => "Beginner",
            Self::A2 => "Elementary",
            Self::B1 => "Intermediate",
            Self::B2 => "Upper intermediate",
            Self::C1 => "Advanced",
            Self::C2Plus => "Proficient",
        }
    }

    fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(Self::A1),
            "A2" => Ok(Self::A2),
            "B1" => Ok(Self::B1),
            "B2" => Ok(Self::B2),
            "C1" => Ok(Self::C1),
            "C2" | "C2+" | "C2_PLUS" => Ok(Self::C2Plus),
            _ => Err(ConfigurationError::invalid_value(
                "user_level",
                format!("'{}' is not one of A1, A2, B1, B2, C1, C2+", s),
            )),
        }
    }
}

/// Minimum mean commonness score required for each level.
///
/// Walked from A1 to C2+; the first level whose threshold the mean meets
/// wins, and C2+ catches everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<ProficiencyLevel, f64>", into = "BTreeMap<ProficiencyLevel, f64>")]
pub struct ThresholdTable {
    thresholds: [f64; 6],
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            thresholds: [6.0, 5.5, 5.0, 4.5, 4.0, 0.0],
        }
    }
}

impl ThresholdTable {
    /// Build a table from explicit values, ordered A1..C2+.
    pub fn new(thresholds: [f64; 6]) -> Result<Self, ConfigurationError> {
        let table = Self { thresholds };
        table.validate()?;
        Ok(table)
    }

    pub fn threshold(&self, level: ProficiencyLevel) -> f64 {
        self.thresholds[level.position()]
    }

    /// Map a mean score to a level.
    pub fn classify(&self, mean_score: f64) -> ProficiencyLevel {
        ProficiencyLevel::ALL
            .into_iter()
            .find(|level| mean_score >= self.threshold(*level))
            .unwrap_or(ProficiencyLevel::C2Plus)
    }

    /// Thresholds must be finite and strictly descending from A1 to C2+.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (level, value) in ProficiencyLevel::ALL.iter().zip(self.thresholds.iter()) {
            if !value.is_finite() {
                return Err(ConfigurationError::InvalidThresholds(format!(
                    "threshold for {} is not a finite number",
                    level
                )));
            }
        }
        for pair in ProficiencyLevel::ALL.windows(2) {
            let (easier, harder) = (pair[0], pair[1]);
            if self.threshold(easier) <= self.threshold(harder) {
                return Err(ConfigurationError::InvalidThresholds(format!(
                    "{} ({}) must be above {} ({})",
                    easier,
                    self.threshold(easier),
                    harder,
                    self.threshold(harder)
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<ProficiencyLevel, f64>> for ThresholdTable {
    type Error = ConfigurationError;

    fn try_from(map: BTreeMap<ProficiencyLevel, f64>) -> Result<Self, Self::Error> {
        let mut thresholds = [0.0; 6];
        for level in ProficiencyLevel::ALL {
            thresholds[level.position()] = *map.get(&level).ok_or_else(|| {
                ConfigurationError::InvalidThresholds(format!("missing threshold for {}", level))
            })?;
        }
        // Ordering is checked by `validate`, so a bad table still reports a
        // configuration error rather than a parse error.
        Ok(Self { thresholds })
    }
}

impl From<ThresholdTable> for BTreeMap<ProficiencyLevel, f64> {
    fn from(table: ThresholdTable) -> Self {
        ProficiencyLevel::ALL
            .into_iter()
            .map(|level| (level, table.threshold(level)))
            .collect()
    }
}
