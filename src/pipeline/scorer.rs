use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of evidence that feed an actor confidence score, each with a fixed weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceFactor {
    TechnicalEvidence,
    BehavioralPatterns,
    HistoricalData,
    SourceReliability,
    CorrelationStrength,
}

impl EvidenceFactor {
    pub const ALL: [EvidenceFactor; 5] = [
        EvidenceFactor::TechnicalEvidence,
        EvidenceFactor::BehavioralPatterns,
        EvidenceFactor::HistoricalData,
        EvidenceFactor::SourceReliability,
        EvidenceFactor::CorrelationStrength,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            EvidenceFactor::TechnicalEvidence => 2.0,
            EvidenceFactor::BehavioralPatterns => 1.5,
            EvidenceFactor::HistoricalData => 1.0,
            EvidenceFactor::SourceReliability => 1.5,
            EvidenceFactor::CorrelationStrength => 1.0,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            EvidenceFactor::TechnicalEvidence => "technical_evidence",
            EvidenceFactor::BehavioralPatterns => "behavioral_patterns",
            EvidenceFactor::HistoricalData => "historical_data",
            EvidenceFactor::SourceReliability => "source_reliability",
            EvidenceFactor::CorrelationStrength => "correlation_strength",
        }
    }
}

pub type Evidence = BTreeMap<EvidenceFactor, f64>;

/// Reads the known numeric factors out of a JSON object; anything else is ignored.
pub fn evidence_from_value(value: &Value) -> Evidence {
    let mut evidence = Evidence::new();
    if let Some(map) = value.as_object() {
        for factor in EvidenceFactor::ALL {
            if let Some(n) = map.get(factor.key()).and_then(Value::as_f64) {
                evidence.insert(factor, n);
            }
        }
    }
    evidence
}

/// Weighted evidence normalized onto the 1..=5 confidence scale. Ties round to even.
pub fn calculate_confidence(evidence: &Evidence) -> i32 {
    let max_score: f64 = EvidenceFactor::ALL.iter().map(|f| f.weight()).sum();
    let score: f64 = evidence
        .iter()
        .map(|(factor, value)| value * factor.weight())
        .sum();
    let scaled = ((score / max_score) * 4.0).round_ties_even();
    if scaled.is_nan() {
        return 1;
    }
    scaled.clamp(0.0, 4.0) as i32 + 1
}
