use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// ISO-8601 timestamp as the producer wrote it, plus its UTC value
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    pub raw: String,
    pub utc: DateTime<Utc>,
}

impl Timestamp {
    pub fn parse(raw: &str) -> Option<Self> {
        parse_timestamp(raw).map(|utc| Self {
            raw: raw.to_string(),
            utc,
        })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).ok_or_else(|| {
            de::Error::custom(format!("expected ISO-8601 timestamp, got {:?}", raw))
        })
    }
}

/// Accepts RFC 3339, a naive date-time (taken as UTC), or a bare date
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// `null` reads as an empty list
fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A forecastable yes/no question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub resolution_date: Option<Timestamp>,
    /// Market-implied probability at snapshot time
    #[serde(default)]
    pub baseline_probability: Option<f64>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub probability: f64,
    #[serde(default)]
    pub rationale: Option<Vec<EvidenceItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetadata {
    pub model: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub prediction: PredictionPayload,
    #[serde(default)]
    pub metadata: Option<PredictionMetadata>,
}

/// Ground truth for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub id: String,
    pub outcome: u8,
    #[serde(default)]
    pub verified_value: Option<f64>,
    #[serde(default)]
    pub verified_source: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
}

impl ResolutionRecord {
    /// Weak = provenance incomplete (no source or no resolution time)
    pub fn is_weak(&self) -> bool {
        self.verified_source.is_none() || self.resolved_at.is_none()
    }
}

/// One prediction joined with its resolution and (optionally) its event.
///
/// Serializes to the `records.jsonl` row layout; the question is kept only
/// for explanations. `timestamp` is the predictor's string, unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub event_id: String,
    pub probability: f64,
    pub outcome: u8,
    pub market_probability: Option<f64>,
    pub model: Option<String>,
    #[serde(rename = "timestamp")]
    pub prediction_timestamp: Option<String>,
    #[serde(skip)]
    pub question: Option<String>,
}

impl ScoredRecord {
    /// Bare record without market or provenance data
    pub fn new(event_id: impl Into<String>, probability: f64, outcome: u8) -> Self {
        Self {
            event_id: event_id.into(),
            probability,
            outcome,
            market_probability: None,
            model: None,
            prediction_timestamp: None,
            question: None,
        }
    }

    pub fn with_market(mut self, market_probability: f64) -> Self {
        self.market_probability = Some(market_probability);
        self
    }

    pub fn outcome_f64(&self) -> f64 {
        self.outcome as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scored_record_row_layout() {
        let mut record = ScoredRecord::new("e1", 0.8, 1).with_market(0.6);
        record.model = Some("stub".to_string());
        record.question = Some("Will it rain?".to_string());

        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["event_id", "market_probability", "model", "outcome", "probability", "timestamp"]
        );
        assert_eq!(obj["timestamp"], serde_json::Value::Null);
    }

    #[test]
    fn test_weak_resolution() {
        let mut res = ResolutionRecord {
            id: "e1".to_string(),
            outcome: 1,
            verified_value: None,
            verified_source: Some("manual".to_string()),
            resolved_at: None,
        };
        assert!(res.is_weak());
        res.resolved_at = Timestamp::parse("2025-01-02");
        assert!(!res.is_weak());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01T00:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01"), Some(expected));
        assert_eq!(parse_timestamp("next tuesday"), None);
    }

    #[test]
    fn test_timestamp_keeps_producer_text() {
        let ts: Timestamp = serde_json::from_str(r#""2025-03-01T12:00:00+02:00""#).unwrap();
        assert_eq!(ts.utc, Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            r#""2025-03-01T12:00:00+02:00""#
        );
        assert!(serde_json::from_str::<Timestamp>(r#""soon""#).is_err());
    }
}
