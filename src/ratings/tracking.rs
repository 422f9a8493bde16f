/// Allow-list matching for series and category labels
use serde::{Deserialize, Serialize};

/// A tracked series or category and the spellings that refer to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedName {
    /// Canonical name written to the race record
    pub name: String,
    /// Alternative spellings, matched like the canonical name
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TrackedName {
    pub fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// True if the name or one of its aliases occurs in the label as a run of whole words
    pub fn matches(&self, label_words: &[String]) -> bool {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .any(|candidate| contains_words(label_words, &words(candidate)))
    }
}

/// Ordered allow-list; earlier entries win when several match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingList(Vec<TrackedName>);

impl TrackingList {
    pub fn new(entries: Vec<TrackedName>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[TrackedName] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical name of the first entry matching `label`
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let label_words = words(label);
        if label_words.is_empty() {
            return None;
        }

        self.0
            .iter()
            .find(|entry| entry.matches(&label_words))
            .map(|entry| entry.name.as_str())
    }

    /// Series followed by default
    pub fn default_series() -> Self {
        Self(vec![
            TrackedName::new("X2O Badkamers Trofee", &[]),
            TrackedName::new("UCI World Cup", &["world cup", "cdm", "coupe du monde"]),
            TrackedName::new("Superprestige", &[]),
            TrackedName::new("X2O Trofee", &["x2o", "trofee"]),
            TrackedName::new("Exact Cross", &["exactcross"]),
            TrackedName::new("European Championships", &["european championship", "european champs"]),
            TrackedName::new("World Championships", &["world championship", "worlds"]),
            TrackedName::new("Koppenbergcross", &[]),
            TrackedName::new("Azencross", &[]),
            TrackedName::new("GP Sven Nys", &["sven nys"]),
            TrackedName::new("Druivencross", &[]),
        ])
    }

    /// Categories followed by default
    pub fn default_categories() -> Self {
        Self(vec![
            TrackedName::new("Elite Men", &["men elite", "mens elite", "elite mens"]),
            TrackedName::new("Elite Women", &["women elite", "womens elite", "elite womens"]),
        ])
    }
}

/// Lowercase alphanumeric words of a label, apostrophes dropped
pub fn words(label: &str) -> Vec<String> {
    label
        .to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
