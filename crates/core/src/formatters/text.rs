use crate::section::SectionMap;

/// Configuration for plain text output
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Wrap descriptions at specified width (0 = no wrapping)
    pub line_width: usize,

    /// Print sections with no articles
    pub include_empty_sections: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { line_width: 80, include_empty_sections: false }
    }
}

/// Render sections as plain text: an underlined heading per section, then
/// each article's title, URL and wrapped description
pub fn convert_to_text(sections: &SectionMap, config: &TextConfig) -> String {
    let mut blocks = Vec::new();

    for (section, records) in sections.iter() {
        if records.is_empty() && !config.include_empty_sections {
            continue;
        }

        let label = section.label();
        let mut block = format!("{}\n{}\n", label, "=".repeat(label.chars().count()));

        if records.is_empty() {
            block.push_str("\n(no articles)\n");
        }
        for record in records {
            block.push('\n');
            block.push_str(&record.title);
            block.push('\n');
            block.push_str(&record.url);
            block.push('\n');
            if record.has_description() {
                block.push_str(&wrap_text(&record.description, config.line_width));
                block.push('\n');
            }
        }

        blocks.push(block);
    }

    blocks.join("\n").trim_end().to_string()
}

/// Wrap text to specified line width
fn wrap_text(text: &str, width: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if width == 0 {
        return words.join(" ");
    }
    wrap_words(&words, width)
}

/// Wrap a slice of words to specified width
fn wrap_words(words: &[&str], width: usize) -> String {
    let mut lines = Vec::new();
    let mut current_line = Vec::new();
    let mut current_length = 0;

    for &word in words {
        let word_len = word.chars().count();

        if current_length == 0 {
            current_line.push(word);
            current_length = word_len;
        } else if current_length + 1 + word_len <= width {
            current_length += 1 + word_len;
            current_line.push(word);
        } else {
            lines.push(current_line.join(" "));
            current_line = vec![word];
            current_length = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line.join(" "));
    }

    lines.join("\n")
}
