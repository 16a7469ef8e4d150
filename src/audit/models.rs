//! Data models for the audit pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the mandatory relevance dimension
pub const RELEVANCE: &str = "relevance";
/// Name of the specificity dimension
pub const SPECIFICITY: &str = "specificity";
/// Name of the novelty dimension
pub const NOVELTY: &str = "novelty";

/// Kind of AI-generated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Mission,
    Insight,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Mission => "mission",
            ContentKind::Insight => "insight",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An AI-proposed recommendation awaiting audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_tag: String,
    /// Impact/effort scores, steps, etc. Never interpreted by the pipeline.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl CandidateItem {
    /// Create a candidate with no description, source tag or metadata
    pub fn new(id: impl Into<String>, kind: ContentKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: None,
            source_tag: String::new(),
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source_tag(mut self, source_tag: impl Into<String>) -> Self {
        self.source_tag = source_tag.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Description text, with an absent description treated as empty
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Fallback focus topic for businesses without enriched context
pub const DEFAULT_FOCUS_AREA: &str = "growth";

/// Read-only business context used for relevance scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_id: String,
    pub display_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default = "default_focus_area")]
    pub current_focus_area: String,
}

fn default_focus_area() -> String {
    DEFAULT_FOCUS_AREA.to_string()
}

impl BusinessContext {
    /// Degraded context for a business with no enriched brain data
    pub fn fallback(business_id: impl Into<String>, focus_area: impl Into<String>) -> Self {
        let business_id = business_id.into();
        Self {
            display_name: business_id.clone(),
            business_id,
            category: None,
            country: None,
            current_focus_area: focus_area.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_focus_area(mut self, focus_area: impl Into<String>) -> Self {
        self.current_focus_area = focus_area.into();
        self
    }
}

/// A previously seen item used purely for duplicate/novelty comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingItem {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub concept_hash: String,
    pub intent_signature: String,
    pub created_at: DateTime<Utc>,
}

/// Per-candidate scoring output. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    /// Dimension name to score on the [0, 1] scale
    pub scores: BTreeMap<String, f32>,
    pub average_score: f32,
}

impl AuditResult {
    /// Build a result whose average is the arithmetic mean of `scores`.
    /// An empty score map averages to 0.0.
    pub fn from_scores(scores: BTreeMap<String, f32>) -> Self {
        let average_score = if scores.is_empty() {
            0.0
        } else {
            let sum: f64 = scores.values().map(|v| f64::from(*v)).sum();
            (sum / scores.len() as f64) as f32
        };
        Self {
            scores,
            average_score,
        }
    }

    /// Relevance score, 0.0 if the dimension is missing
    pub fn relevance(&self) -> f32 {
        self.score(RELEVANCE).unwrap_or(0.0)
    }

    pub fn score(&self, dimension: &str) -> Option<f32> {
        self.scores.get(dimension).copied()
    }
}

/// A candidate that passed the quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    pub audit_score: f32,
    pub audit_passed: bool,
    pub concept_hash: String,
    pub intent_signature: String,
}

/// Result of one orchestration run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub items: Vec<AuditedItem>,
    pub raw_count: usize,
    pub filtered_count: usize,
    pub blocked_count: usize,
}

impl AuditReport {
    pub fn new(items: Vec<AuditedItem>, raw_count: usize) -> Self {
        let filtered_count = items.len();
        Self {
            items,
            raw_count,
            filtered_count,
            blocked_count: raw_count.saturating_sub(filtered_count),
        }
    }
}
