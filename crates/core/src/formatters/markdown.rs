use crate::section::SectionMap;

/// Configuration for Markdown output
#[derive(Debug, Clone, Default)]
pub struct MarkdownConfig {
    /// Title rendered as an H1 heading before the sections
    pub title: Option<String>,
    /// Include sections with no articles
    pub include_empty_sections: bool,
}

/// Render sections as Markdown: one H2 per section and one list item per article
pub fn convert_to_markdown(sections: &SectionMap, config: &MarkdownConfig) -> String {
    let mut output = String::new();

    if let Some(title) = &config.title {
        output.push_str(&format!("# {}\n\n", title));
    }

    for (section, records) in sections.iter() {
        if records.is_empty() && !config.include_empty_sections {
            continue;
        }

        output.push_str(&format!("## {}\n\n", section.label()));
        if records.is_empty() {
            output.push_str("_No articles._\n\n");
            continue;
        }

        for record in records {
            output.push_str(&format!("- [{}]({})", escape_link_text(&record.title), record.url));
            if record.has_description() {
                output.push_str(&format!(": {}", record.description));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    output.trim_end().to_string()
}

fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleRecord;
    use crate::section::Section;

    #[test]
    fn test_markdown_output() {
        let mut sections = SectionMap::new();
        sections.push(Section::StrategiesTactics, ArticleRecord::new("Zero Trust", "https://s.example", "A guide."));
        sections.push(Section::StrategiesTactics, ArticleRecord::new("Bare", "https://t.example", ""));

        let markdown = convert_to_markdown(&sections, &MarkdownConfig::default());

        assert!(markdown.starts_with("## Strategies & Tactics\n\n"));
        assert!(markdown.contains("- [Zero Trust](https://s.example): A guide.\n"));
        assert!(markdown.ends_with("- [Bare](https://t.example)"));
    }

    #[test]
    fn test_markdown_title_and_empty_sections() {
        let config = MarkdownConfig { title: Some("TLDR InfoSec".to_string()), include_empty_sections: true };
        let markdown = convert_to_markdown(&SectionMap::new(), &config);

        assert!(markdown.starts_with("# TLDR InfoSec\n\n## Attacks & Vulnerabilities"));
        assert_eq!(markdown.matches("_No articles._").count(), 4);
    }

    #[test]
    fn test_escape_link_text() {
        assert_eq!(escape_link_text("[Sponsor] Deal"), "\\[Sponsor\\] Deal");
    }
}
