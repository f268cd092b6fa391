//! Common types used across the brewery lake

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PipelineError;

/// Medallion layer of the data lake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Raw API payloads, persisted verbatim
    Bronze,
    /// Cleaned, deduplicated records
    Silver,
    /// Aggregated analytical tables
    Gold,
}

impl Layer {
    /// All layers in pipeline order
    pub const ALL: [Layer; 3] = [Layer::Bronze, Layer::Silver, Layer::Gold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The date a pipeline run is scoped to.
///
/// Every layer stores its output under a `date=YYYY-MM-DD` partition derived
/// from this value, and reruns for the same date overwrite that partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunDate(NaiveDate);

impl RunDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in UTC
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Partition directory name, e.g. `date=2024-01-01`
    pub fn partition(&self) -> String {
        format!("date={}", self)
    }
}

impl std::fmt::Display for RunDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl std::str::FromStr for RunDate {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // NaiveDate accepts unpadded fields; partitions must stay canonical
        if trimmed.len() != 10 {
            return Err(PipelineError::InvalidRunDate(s.to_string()));
        }
        NaiveDate::parse_from_str(trimmed, Self::FORMAT)
            .map(Self)
            .map_err(|_| PipelineError::InvalidRunDate(s.to_string()))
    }
}

impl Serialize for RunDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RunDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_date_parse_and_partition() {
        let date: RunDate = "2024-01-01".parse().unwrap();
        assert_eq!(date.to_string(), "2024-01-01");
        assert_eq!(date.partition(), "date=2024-01-01");
    }

    #[test]
    fn test_run_date_rejects_malformed() {
        assert!("2024-1-1".parse::<RunDate>().is_err());
        assert!("2024/01/01".parse::<RunDate>().is_err());
        assert!("2024-02-30".parse::<RunDate>().is_err());
        assert!("".parse::<RunDate>().is_err());
    }

    #[test]
    fn test_run_date_serde() {
        let date: RunDate = "2024-03-15".parse().unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"2024-03-15\"");
        let back: RunDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }

    #[test]
    fn test_layer_names() {
        let names: Vec<_> = Layer::ALL.iter().map(|l| l.to_string()).collect();
        assert_eq!(names, vec!["bronze", "silver", "gold"]);
    }
}
