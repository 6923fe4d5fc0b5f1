// File: ./src/model/property.rs
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// One external feed attached to a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub url: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CalendarSource {
    pub fn new(label: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            label: label.to_string(),
            active: true,
        }
    }

    /// A source is fetched only when it is enabled and has somewhere to fetch from.
    pub fn is_syncable(&self) -> bool {
        self.active && !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Ordered; earlier sources win complete ties during dominant selection.
    #[serde(default)]
    pub sources: Vec<CalendarSource>,
}

impl Property {
    pub fn new(id: &str, sources: Vec<CalendarSource>) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            sources,
        }
    }

    pub fn syncable_sources(&self) -> impl Iterator<Item = &CalendarSource> {
        self.sources.iter().filter(|s| s.is_syncable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_and_blank_sources_are_not_synced() {
        let mut disabled = CalendarSource::new("Booking", "https://b.example/feed.ics");
        disabled.active = false;
        let blank = CalendarSource::new("Vrbo", "   ");
        let property = Property::new(
            "p1",
            vec![
                CalendarSource::new("Airbnb", "https://a.example/feed.ics"),
                disabled,
                blank,
            ],
        );

        let labels: Vec<&str> = property
            .syncable_sources()
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Airbnb"]);
    }

    #[test]
    fn active_defaults_to_true_when_omitted() {
        let src: CalendarSource =
            toml::from_str("url = \"https://a.example/x.ics\"\nlabel = \"Airbnb\"").unwrap();
        assert!(src.active);
    }
}
