//! Root-cause classification boundary
//!
//! The root-cause extractor is an external collaborator. This module fixes the
//! contract ([`RootCauseClassifier`]), ships a deterministic keyword-based
//! default, and isolates the batch from per-record classifier failures.

use crate::record::DefectRecord;
use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

pub const UNCLASSIFIED: &str = "Unclassified";

/// Classifier confidence in a root cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Root cause attributed to one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Classification {
    pub root_cause: String,
    pub confidence: Confidence,
}

impl Classification {
    pub fn new(root_cause: impl Into<String>, confidence: Confidence) -> Self {
        Classification {
            root_cause: root_cause.into(),
            confidence,
        }
    }

    /// Lowest-confidence fallback used when no cause can be attributed
    pub fn unclassified() -> Self {
        Classification::new(UNCLASSIFIED, Confidence::Low)
    }
}

/// Contract for root-cause extraction
///
/// Implementations must be deterministic for a given record so repeated runs
/// produce identical groupings. Called once per record, possibly from
/// several threads.
pub trait RootCauseClassifier: Send + Sync {
    fn classify(&self, record: &DefectRecord) -> Result<Classification>;
}

/// Classify every record, in input order
///
/// A failing call never aborts the batch: that record falls back to
/// [`Classification::unclassified`].
pub fn classify_all<C>(records: &[DefectRecord], classifier: &C) -> Vec<Classification>
where
    C: RootCauseClassifier + ?Sized,
{
    records
        .par_iter()
        .map(|record| match classifier.classify(record) {
            Ok(classification) => classification,
            Err(e) => {
                warn!(id = %record.id, error = %e, "root-cause classification failed");
                Classification::unclassified()
            }
        })
        .collect()
}

/// Keyword rule: a named cause and the pattern that signals it
struct CauseRule {
    cause: &'static str,
    pattern: Regex,
}

/// Ordered rule table; first match wins
fn cause_rules() -> &'static [CauseRule] {
    static RULES: OnceLock<Vec<CauseRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            ("Null Reference", r"(?i)\bnull\b|null ?pointer|nullreference|\bnpe\b|undefined is not"),
            ("Memory Management", r"(?i)memory leak|out of memory|\boom\b|heap|buffer overflow"),
            ("Concurrency", r"(?i)race condition|deadlock|thread|concurren|lock contention"),
            ("Timeout", r"(?i)time ?out|timed out|hang(s|ing)?\b|unresponsive"),
            ("Configuration", r"(?i)config|setting|environment variable|registry key"),
            ("Data Validation", r"(?i)validat|invalid input|incorrect value|wrong value|format error"),
            ("Integration", r"(?i)\bapi\b|interface|integration|protocol|handshake|third[- ]party"),
            ("Performance", r"(?i)performance|\bslow\b|latency|throughput|cpu usage"),
            ("Error Handling", r"(?i)exception|crash|unhandled|stack trace|error handling"),
            ("UI/Display", r"(?i)\bui\b|display|layout|render|screen|button|dialog|label"),
            ("Localization", r"(?i)locali[sz]|translation|unicode|encoding|language"),
        ]
        .into_iter()
        .map(|(cause, pattern)| CauseRule {
            cause,
            pattern: Regex::new(pattern).unwrap(),
        })
        .collect()
    })
}

/// Default deterministic classifier over title and description text
///
/// A rule matching the title yields high confidence, a rule matching only the
/// description yields medium confidence, and no match is unclassified.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        KeywordClassifier
    }
}

impl RootCauseClassifier for KeywordClassifier {
    fn classify(&self, record: &DefectRecord) -> Result<Classification> {
        let rules = cause_rules();
        if let Some(rule) = rules.iter().find(|r| r.pattern.is_match(&record.title)) {
            return Ok(Classification::new(rule.cause, Confidence::High));
        }
        if let Some(rule) = rules.iter().find(|r| r.pattern.is_match(&record.description)) {
            return Ok(Classification::new(rule.cause, Confidence::Medium));
        }
        Ok(Classification::unclassified())
    }
}
