//! Regulators whose publications feed the pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatorySource {
    pub source: String,
    pub url: String,
}

impl RegulatorySource {
    pub fn new(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
        }
    }
}

/// The configured regulator list.
pub fn default_sources() -> Vec<RegulatorySource> {
    vec![
        RegulatorySource::new("SEC", "https://www.sec.gov/rules"),
        RegulatorySource::new("FINRA", "https://www.finra.org/rules-guidance"),
        RegulatorySource::new("CFTC", "https://www.cftc.gov/LawRegulation/index.htm"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources() {
        let sources = default_sources();
        let names: Vec<&str> = sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(names, vec!["SEC", "FINRA", "CFTC"]);
        assert!(sources.iter().all(|s| s.url.starts_with("https://")));
    }
}
