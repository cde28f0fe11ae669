use digestor_core::{PipelineReport, SectionMap, SkipReason};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "Digestor".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Turn newsletter emails into social media posts\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print a labelled detail line under a step
pub fn print_detail(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// Print how many articles each section holds
pub fn print_section_counts(sections: &SectionMap) {
    for (section, records) in sections.iter() {
        print_detail(section.label(), &records.len().to_string());
    }
}

/// Print a pipeline run summary
pub fn print_report(report: &PipelineReport, dry_run: bool) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", if dry_run { "Dry Run Summary" } else { "Posting Summary" }.bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());

    for article in &report.posted {
        let kind = if article.posts.len() > 1 { format!("thread of {}", article.posts.len()) } else { "post".to_string() };
        eprintln!("  {} {} {}", "✓".green(), article.title.bright_white(), format!("({})", kind).dimmed());
    }
    for article in &report.skipped {
        let reason = match &article.reason {
            SkipReason::EmptyDescription => "no description".to_string(),
            SkipReason::NoUsableChunks { dropped_chunks } => format!("{} chunk(s) failed revision", dropped_chunks),
            SkipReason::PublishFailed { message, .. } => message.clone(),
        };
        eprintln!("  {} {} {}", "✗".yellow(), article.title.bright_white(), format!("({})", reason).dimmed());
    }

    eprintln!(
        "\n  {} {}  {} {}\n",
        "Posts:".dimmed(),
        report.post_count().to_string().bright_white(),
        "Skipped:".dimmed(),
        report.skipped.len().to_string().bright_white()
    );
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
