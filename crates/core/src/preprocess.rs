use regex::Regex;

/// Configuration for newsletter HTML preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Whether to remove script tags
    pub remove_scripts: bool,
    /// Whether to remove style tags
    pub remove_styles: bool,
    /// Whether to remove HTML comments (including Outlook conditional blocks)
    pub remove_comments: bool,
    /// Whether to remove 1x1 open-tracking images
    pub remove_tracking_pixels: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { remove_scripts: true, remove_styles: true, remove_comments: true, remove_tracking_pixels: true }
    }
}

/// Preprocess newsletter HTML by removing elements that never carry article content
pub fn preprocess_html(html: &str, config: &PreprocessConfig) -> String {
    let mut processed = html.to_string();

    if config.remove_scripts || config.remove_styles || config.remove_tracking_pixels {
        processed = remove_unwanted_tags(&processed, config);
    }

    if config.remove_comments {
        processed = remove_comments(&processed);
    }

    processed
}

/// Remove script, style and tracking-pixel tags from HTML
fn remove_unwanted_tags(html: &str, config: &PreprocessConfig) -> String {
    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                if config.remove_scripts {
                    Some(lol_html::element!("script", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.remove_styles {
                    Some(lol_html::element!("style", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.remove_tracking_pixels {
                    Some(lol_html::element!("img", |el| {
                        let width = el.get_attribute("width");
                        let height = el.get_attribute("height");
                        if is_pixel(width.as_deref()) && is_pixel(height.as_deref()) {
                            el.remove();
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
            ]
            .into_iter()
            .flatten()
            .collect(),
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    match rewriter.end() {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    if output.is_empty() { html.to_string() } else { output }
}

fn is_pixel(dimension: Option<&str>) -> bool {
    matches!(dimension.map(|d| d.trim().trim_end_matches("px")), Some("0" | "1"))
}

/// Remove HTML comments from the document
fn remove_comments(html: &str) -> String {
    let re = Regex::new(r"(?s)<!--.*?-->").unwrap();
    re.replace_all(html, "").to_string()
}
