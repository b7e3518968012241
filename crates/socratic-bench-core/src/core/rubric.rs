// crates/socratic-bench-core/src/core/rubric.rs
// ============================================================================
// Module: Socratic Bench Rubric Model
// Description: Versioned scoring rubric descriptors and score domains.
// Purpose: Let the judge dispatch scorers on rubric version without hard-coding.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A rubric is a versioned descriptor enumerating scoring dimensions with
//! their score types, native ranges, compliance thresholds, and optional
//! composite weights. Two rubric generations ship built in: the
//! multi-dimension continuous `socratic-v1` and the three-metric
//! `socratic-v2`. Versions with the `-llm` suffix select LLM-assisted
//! scoring over the same dimension set. Scores are stored once in their
//! native range; any surface rescaling is a read-path concern.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::DimensionName;
use crate::core::identifiers::RubricVersion;

// ============================================================================
// SECTION: Score Types
// ============================================================================

/// Score domain for one rubric dimension.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Range bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreType {
    /// Continuous value within an inclusive range.
    Continuous {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Integer value within an inclusive range.
    Integer {
        /// Inclusive lower bound.
        low: i64,
        /// Inclusive upper bound.
        high: i64,
    },
    /// Boolean flag dimension.
    Boolean,
    /// Non-negative raw count dimension.
    Count,
}

impl ScoreType {
    /// Returns true when a numeric score lies within the declared domain.
    #[must_use]
    pub fn contains(&self, score: f64) -> bool {
        match self {
            Self::Continuous {
                min,
                max,
            } => score.is_finite() && score >= *min && score <= *max,
            Self::Integer {
                low,
                high,
            } => {
                score.is_finite()
                    && score.fract() == 0.0
                    && score >= to_f64(*low)
                    && score <= to_f64(*high)
            }
            Self::Boolean => false,
            Self::Count => score.is_finite() && score >= 0.0 && score.fract() == 0.0,
        }
    }

    /// Returns the neutral score persisted for failed judgments.
    #[must_use]
    pub const fn neutral(&self) -> f64 {
        match self {
            Self::Continuous {
                min, ..
            } => *min,
            Self::Integer {
                low, ..
            } => to_f64(*low),
            Self::Boolean | Self::Count => 0.0,
        }
    }
}

/// Converts an integer bound to `f64` for domain checks.
#[allow(
    clippy::cast_precision_loss,
    reason = "Rubric bounds are small human-authored integers."
)]
const fn to_f64(value: i64) -> f64 {
    value as f64
}

// ============================================================================
// SECTION: Rubric Descriptor
// ============================================================================

/// One scoring dimension of a rubric.
///
/// # Invariants
/// - `threshold`, when set on a numeric dimension, lies within the score domain.
/// - Boolean dimensions score through the boolean score map, not the numeric map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricDimension {
    /// Dimension name.
    pub name: DimensionName,
    /// Score domain.
    pub score_type: ScoreType,
    /// Compliance threshold (numeric dimensions: minimum passing score;
    /// boolean dimensions: any value requires `true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Optional weight for composite scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Versioned rubric descriptor.
///
/// # Invariants
/// - Dimension names are unique.
/// - The dimension list order is stable for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    /// Rubric version identifier.
    pub version: RubricVersion,
    /// Ordered scoring dimensions.
    pub dimensions: Vec<RubricDimension>,
}

/// Scoring mode selected by a rubric version.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Deterministic scoring from text heuristics only.
    Heuristic,
    /// LLM-assisted scoring with heuristic features persisted alongside.
    LlmAssisted,
}

/// Rubric model errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RubricError {
    /// Rubric version has no registered descriptor.
    #[error("unknown rubric version: {0}")]
    UnknownVersion(String),
    /// Score set does not match the declared dimensions.
    #[error("score set mismatch: {0}")]
    DimensionMismatch(String),
    /// Score value lies outside its declared domain.
    #[error("score out of domain for dimension {dimension}: {score}")]
    OutOfDomain {
        /// Dimension name.
        dimension: String,
        /// Offending score value.
        score: f64,
    },
}

impl Rubric {
    /// Looks up a dimension by name.
    #[must_use]
    pub fn dimension(&self, name: &DimensionName) -> Option<&RubricDimension> {
        self.dimensions.iter().find(|dimension| dimension.name == *name)
    }

    /// Returns the scoring mode selected by this rubric's version.
    #[must_use]
    pub fn scoring_mode(&self) -> ScoringMode {
        if self.version.as_str().ends_with("-llm") {
            ScoringMode::LlmAssisted
        } else {
            ScoringMode::Heuristic
        }
    }

    /// Validates a score set against the declared dimensions and domains.
    ///
    /// # Errors
    ///
    /// Returns [`RubricError::DimensionMismatch`] when the score maps do not
    /// cover exactly the declared dimensions and [`RubricError::OutOfDomain`]
    /// when any numeric score lies outside its declared range.
    pub fn validate_scores(
        &self,
        rubric_scores: &BTreeMap<DimensionName, f64>,
        boolean_scores: &BTreeMap<DimensionName, bool>,
    ) -> Result<(), RubricError> {
        let mut numeric_expected = 0usize;
        let mut boolean_expected = 0usize;
        for dimension in &self.dimensions {
            match dimension.score_type {
                ScoreType::Boolean => {
                    boolean_expected += 1;
                    if !boolean_scores.contains_key(&dimension.name) {
                        return Err(RubricError::DimensionMismatch(format!(
                            "missing boolean dimension {}",
                            dimension.name
                        )));
                    }
                }
                ScoreType::Continuous { .. } | ScoreType::Integer { .. } | ScoreType::Count => {
                    numeric_expected += 1;
                    let Some(score) = rubric_scores.get(&dimension.name) else {
                        return Err(RubricError::DimensionMismatch(format!(
                            "missing numeric dimension {}",
                            dimension.name
                        )));
                    };
                    if !dimension.score_type.contains(*score) {
                        return Err(RubricError::OutOfDomain {
                            dimension: dimension.name.as_str().to_string(),
                            score: *score,
                        });
                    }
                }
            }
        }
        if rubric_scores.len() != numeric_expected {
            return Err(RubricError::DimensionMismatch(format!(
                "expected {numeric_expected} numeric dimensions, found {}",
                rubric_scores.len()
            )));
        }
        if boolean_scores.len() != boolean_expected {
            return Err(RubricError::DimensionMismatch(format!(
                "expected {boolean_expected} boolean dimensions, found {}",
                boolean_scores.len()
            )));
        }
        Ok(())
    }

    /// Resolves a built-in rubric descriptor for a version.
    ///
    /// # Errors
    ///
    /// Returns [`RubricError::UnknownVersion`] when the version has no
    /// registered descriptor.
    pub fn for_version(version: &RubricVersion) -> Result<Self, RubricError> {
        let base = version.as_str().strip_suffix("-llm").unwrap_or(version.as_str());
        let dimensions = match base {
            "socratic-v1" => socratic_v1_dimensions(),
            "socratic-v2" => socratic_v2_dimensions(),
            _ => return Err(RubricError::UnknownVersion(version.as_str().to_string())),
        };
        Ok(Self {
            version: version.clone(),
            dimensions,
        })
    }

    /// Returns the first-generation multi-dimension rubric.
    #[must_use]
    pub fn socratic_v1() -> Self {
        Self {
            version: RubricVersion::new("socratic-v1"),
            dimensions: socratic_v1_dimensions(),
        }
    }

    /// Returns the second-generation three-metric rubric.
    #[must_use]
    pub fn socratic_v2() -> Self {
        Self {
            version: RubricVersion::new("socratic-v2"),
            dimensions: socratic_v2_dimensions(),
        }
    }
}

// ============================================================================
// SECTION: Built-in Generations
// ============================================================================

/// Dimensions for the first rubric generation (all continuous `[0, 1]`).
fn socratic_v1_dimensions() -> Vec<RubricDimension> {
    vec![
        RubricDimension {
            name: DimensionName::new("questioning"),
            score_type: ScoreType::Continuous {
                min: 0.0,
                max: 1.0,
            },
            threshold: Some(0.5),
            weight: Some(0.4),
        },
        RubricDimension {
            name: DimensionName::new("openness"),
            score_type: ScoreType::Continuous {
                min: 0.0,
                max: 1.0,
            },
            threshold: None,
            weight: Some(0.3),
        },
        RubricDimension {
            name: DimensionName::new("non_directiveness"),
            score_type: ScoreType::Continuous {
                min: 0.0,
                max: 1.0,
            },
            threshold: None,
            weight: Some(0.2),
        },
        RubricDimension {
            name: DimensionName::new("brevity"),
            score_type: ScoreType::Continuous {
                min: 0.0,
                max: 1.0,
            },
            threshold: None,
            weight: Some(0.1),
        },
    ]
}

/// Dimensions for the second rubric generation (boolean, continuous, count).
fn socratic_v2_dimensions() -> Vec<RubricDimension> {
    vec![
        RubricDimension {
            name: DimensionName::new("ends_with_question"),
            score_type: ScoreType::Boolean,
            threshold: Some(1.0),
            weight: None,
        },
        RubricDimension {
            name: DimensionName::new("questioning"),
            score_type: ScoreType::Continuous {
                min: 0.0,
                max: 1.0,
            },
            threshold: Some(0.5),
            weight: None,
        },
        RubricDimension {
            name: DimensionName::new("question_count"),
            score_type: ScoreType::Count,
            threshold: None,
            weight: None,
        },
    ]
}
