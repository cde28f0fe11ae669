use serde::{Serialize, Serializer};

use crate::Result;
use crate::article::ArticleRecord;
use crate::section::{Section, SectionMap};

/// Configuration for JSON output
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Pretty print JSON output
    pub pretty: bool,
    /// Leave out sections with no articles
    pub skip_empty_sections: bool,
}

/// Sections in canonical order, serialized as one JSON object
struct OrderedSections<'a> {
    entries: Vec<(Section, &'a [ArticleRecord])>,
}

impl Serialize for OrderedSections<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(section, records)| (section, records)))
    }
}

/// Convert sections to a JSON object keyed by section label, in canonical order
pub fn convert_to_json(sections: &SectionMap, config: &JsonConfig) -> Result<String> {
    let entries = sections
        .iter()
        .filter(|(_, records)| !(config.skip_empty_sections && records.is_empty()))
        .collect();
    let output = OrderedSections { entries };

    if config.pretty { Ok(serde_json::to_string_pretty(&output)?) } else { Ok(serde_json::to_string(&output)?) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SectionMap {
        let mut sections = SectionMap::new();
        sections.push(Section::QuickLinks, ArticleRecord::new("Quick", "https://q.example", "Quick summary."));
        sections.push(Section::AttacksVulnerabilities, ArticleRecord::new("Attack", "https://a.example", ""));
        sections
    }

    #[test]
    fn test_json_has_all_sections_in_order() {
        let json = convert_to_json(&sample(), &JsonConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value.as_object().unwrap().len(), 4);
        assert_eq!(value["Quick Links"][0]["title"], "Quick");
        assert_eq!(value["Miscellaneous"], serde_json::json!([]));
        assert!(json.find("Attacks & Vulnerabilities").unwrap() < json.find("Quick Links").unwrap());
    }

    #[test]
    fn test_json_skip_empty_sections() {
        let config = JsonConfig { skip_empty_sections: true, ..Default::default() };
        let value: serde_json::Value = serde_json::from_str(&convert_to_json(&sample(), &config).unwrap()).unwrap();

        assert_eq!(value.as_object().unwrap().len(), 2);
        assert!(value.get("Miscellaneous").is_none());
    }

    #[test]
    fn test_json_pretty() {
        let config = JsonConfig { pretty: true, ..Default::default() };
        let json = convert_to_json(&sample(), &config).unwrap();
        assert!(json.contains("\n  \"Attacks & Vulnerabilities\""));
    }

    #[test]
    fn test_json_round_trips_into_section_map() {
        let json = convert_to_json(&sample(), &JsonConfig::default()).unwrap();
        let parsed: SectionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }
}
