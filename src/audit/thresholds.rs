//! Per-kind quality gate thresholds

use super::models::{AuditResult, ContentKind};
use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};

/// Slack for f32 rounding when comparing against a bound
const SCORE_EPSILON: f32 = 1e-6;

/// Minimum scores a candidate must reach. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub min_average_score: f32,
    pub min_relevance: f32,
}

impl ThresholdProfile {
    pub fn new(min_average_score: f32, min_relevance: f32) -> Self {
        Self {
            min_average_score,
            min_relevance,
        }
    }

    /// Check that both bounds are finite and on the [0, 1] scale
    pub fn validate(&self, kind: ContentKind) -> Result<()> {
        for (name, value) in [
            ("min_average_score", self.min_average_score),
            ("min_relevance", self.min_relevance),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AuditError::Configuration(format!(
                    "thresholds.{}.{} must be within [0, 1], got {}",
                    kind, name, value
                )));
            }
        }
        Ok(())
    }

    /// Whether the result clears both bounds
    pub fn passes(&self, result: &AuditResult) -> bool {
        result.average_score + SCORE_EPSILON >= self.min_average_score
            && result.relevance() + SCORE_EPSILON >= self.min_relevance
    }
}

/// Threshold profile for every content kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfiles {
    #[serde(default = "default_mission")]
    pub mission: ThresholdProfile,
    #[serde(default = "default_insight")]
    pub insight: ThresholdProfile,
}

fn default_mission() -> ThresholdProfile {
    ThresholdProfile::new(0.6, 0.5)
}

fn default_insight() -> ThresholdProfile {
    ThresholdProfile::new(0.55, 0.5)
}

impl Default for ThresholdProfiles {
    fn default() -> Self {
        Self {
            mission: default_mission(),
            insight: default_insight(),
        }
    }
}

impl ThresholdProfiles {
    pub fn profile(&self, kind: ContentKind) -> &ThresholdProfile {
        match kind {
            ContentKind::Mission => &self.mission,
            ContentKind::Insight => &self.insight,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.mission.validate(ContentKind::Mission)?;
        self.insight.validate(ContentKind::Insight)
    }

    /// Same profile for every kind
    pub fn uniform(profile: ThresholdProfile) -> Self {
        Self {
            mission: profile,
            insight: profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::RELEVANCE;
    use std::collections::BTreeMap;

    fn result(relevance: f32, other: f32) -> AuditResult {
        let mut scores = BTreeMap::new();
        scores.insert(RELEVANCE.to_string(), relevance);
        scores.insert("other".to_string(), other);
        AuditResult::from_scores(scores)
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let profile = ThresholdProfile::new(0.5, 0.5);
        assert!(profile.passes(&result(0.5, 0.5)));
        assert!(!profile.passes(&result(0.4, 0.6)));
    }

    fn scored(values: &[(&str, f32)]) -> AuditResult {
        AuditResult::from_scores(
            values
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        )
    }

    #[test]
    fn test_three_dimension_mean_at_bound_passes() {
        let profile = ThresholdProfile::new(0.6, 0.5);
        assert!(profile.passes(&scored(&[
            (RELEVANCE, 0.7),
            ("specificity", 0.5),
            ("novelty", 0.6),
        ])));
        assert!(profile.passes(&scored(&[
            (RELEVANCE, 0.9),
            ("specificity", 0.8),
            ("novelty", 0.1),
        ])));
        assert!(!profile.passes(&scored(&[
            (RELEVANCE, 0.69),
            ("specificity", 0.5),
            ("novelty", 0.58),
        ])));
    }

    #[test]
    fn test_both_bounds_must_hold() {
        let profile = ThresholdProfile::new(0.5, 0.7);
        // Average 0.65 passes, relevance 0.6 does not
        assert!(!profile.passes(&result(0.6, 0.7)));
        // Relevance passes, average 0.4 does not
        assert!(!profile.passes(&result(0.8, 0.0)));
    }

    #[test]
    fn test_profile_lookup_per_kind() {
        let profiles = ThresholdProfiles::default();
        assert_eq!(profiles.profile(ContentKind::Mission).min_average_score, 0.6);
        assert_eq!(profiles.profile(ContentKind::Insight).min_average_score, 0.55);
    }

    #[test]
    fn test_validation_rejects_out_of_scale() {
        let mut profiles = ThresholdProfiles::default();
        assert!(profiles.validate().is_ok());

        profiles.insight.min_relevance = 7.0;
        let err = profiles.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds.insight.min_relevance"));

        profiles.insight.min_relevance = f32::NAN;
        assert!(profiles.validate().is_err());
    }
}
