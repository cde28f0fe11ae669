//! Canonical newsletter sections and the ordered map of their articles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::article::ArticleRecord;

/// The closed set of sections the extractor recognizes.
///
/// Declaration order is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "Attacks & Vulnerabilities")]
    AttacksVulnerabilities,
    #[serde(rename = "Strategies & Tactics")]
    StrategiesTactics,
    #[serde(rename = "Miscellaneous")]
    Miscellaneous,
    #[serde(rename = "Quick Links")]
    QuickLinks,
}

impl Section {
    /// All sections in canonical order.
    pub const ALL: [Section; 4] =
        [Section::AttacksVulnerabilities, Section::StrategiesTactics, Section::Miscellaneous, Section::QuickLinks];

    /// Human-readable label, also used as the serialized key.
    pub fn label(self) -> &'static str {
        match self {
            Section::AttacksVulnerabilities => "Attacks & Vulnerabilities",
            Section::StrategiesTactics => "Strategies & Tactics",
            Section::Miscellaneous => "Miscellaneous",
            Section::QuickLinks => "Quick Links",
        }
    }

    /// Classifies heading text by case-sensitive keyword matching.
    ///
    /// Rules are checked in order; a heading matching none of them opens no section.
    ///
    /// ```rust
    /// use digestor_core::Section;
    ///
    /// assert_eq!(Section::classify("🚨 Attacks & Vulnerabilities"), Some(Section::AttacksVulnerabilities));
    /// assert_eq!(Section::classify("Sponsor Message"), None);
    /// ```
    pub fn classify(heading: &str) -> Option<Section> {
        if heading.contains("Attacks") && heading.contains("Vulnerabilities") {
            Some(Section::AttacksVulnerabilities)
        } else if heading.contains("Strategies") && heading.contains("Tactics") {
            Some(Section::StrategiesTactics)
        } else if heading.contains("Miscellaneous") {
            Some(Section::Miscellaneous)
        } else if heading.contains("Quick Links") {
            Some(Section::QuickLinks)
        } else {
            None
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Section::ALL
            .into_iter()
            .find(|section| section.label().to_lowercase() == wanted)
            .or(match wanted.as_str() {
                "attacks" | "vulnerabilities" => Some(Section::AttacksVulnerabilities),
                "strategies" | "tactics" => Some(Section::StrategiesTactics),
                "misc" | "miscellaneous" => Some(Section::Miscellaneous),
                "quick-links" | "quick_links" | "links" => Some(Section::QuickLinks),
                _ => None,
            })
            .ok_or_else(|| format!("Invalid section: {}. Valid options: attacks, strategies, misc, quick-links", s))
    }
}

/// Ordered mapping from every canonical [`Section`] to its articles.
///
/// All four keys are always present; a section with no matched content maps
/// to an empty list. Articles keep document order within a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SectionMap {
    sections: BTreeMap<Section, Vec<ArticleRecord>>,
}

impl SectionMap {
    /// Creates a map with all four sections empty.
    pub fn new() -> Self {
        Self { sections: Section::ALL.into_iter().map(|s| (s, Vec::new())).collect() }
    }

    /// Articles of one section.
    pub fn get(&self, section: Section) -> &[ArticleRecord] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or_default()
    }

    /// Appends an article to a section.
    pub fn push(&mut self, section: Section, record: ArticleRecord) {
        self.sections.entry(section).or_default().push(record);
    }

    /// Appends several articles to a section, keeping their order.
    pub fn extend(&mut self, section: Section, records: impl IntoIterator<Item = ArticleRecord>) {
        self.sections.entry(section).or_default().extend(records);
    }

    /// Iterates sections in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &[ArticleRecord])> {
        self.sections.iter().map(|(s, records)| (*s, records.as_slice()))
    }

    /// Iterates every article with its section, sections in canonical order.
    pub fn records(&self) -> impl Iterator<Item = (Section, &ArticleRecord)> {
        self.iter().flat_map(|(s, records)| records.iter().map(move |r| (s, r)))
    }

    /// Keeps only the listed sections' articles; the others become empty.
    pub fn retain_sections(&mut self, keep: &[Section]) {
        for (section, records) in self.sections.iter_mut() {
            if !keep.contains(section) {
                records.clear();
            }
        }
    }

    /// Total number of articles across all sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Whether no section holds any article.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SectionMap {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BTreeMap<Section, Vec<ArticleRecord>>> for SectionMap {
    fn from(mut sections: BTreeMap<Section, Vec<ArticleRecord>>) -> Self {
        for section in Section::ALL {
            sections.entry(section).or_default();
        }
        Self { sections }
    }
}

impl<'de> Deserialize<'de> for SectionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<Section, Vec<ArticleRecord>>::deserialize(deserializer).map(Self::from)
    }
}
