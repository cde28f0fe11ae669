mod echo;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use digestor_core::{
    DryRunPublisher, ExtractConfig, FetchConfig, JsonConfig, MarkdownConfig, OutputFormat, Pipeline, PipelineConfig,
    Publisher, ReviserKind, Section, SectionMap, Settings, ShortenService, Shortener, StagedMessage, TextConfig,
    UnwrapPolicy, XPublisher, build_reviser, convert_to_json, convert_to_markdown, convert_to_text,
    extract_sections_with_config, fetch_file, fetch_stdin, fetch_url, html_body, load_latest_html, split, trim,
};
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extract curated links from security newsletters and post them
#[derive(Parser, Debug)]
#[command(name = "digestor")]
#[command(version)]
#[command(about = "Turn newsletter emails into social media posts", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: <config dir>/digestor/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the curated sections of a newsletter
    Extract {
        /// HTML file, .eml file, URL, or "-" for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output format (json, text, markdown)
        #[arg(short, long, default_value = "json", value_name = "FORMAT")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Wrap descriptions at this width (text only, 0 = no wrapping)
        #[arg(long, default_value = "80", value_name = "COLS")]
        width: usize,

        /// Only keep these sections (repeatable)
        #[arg(short, long = "section", value_name = "SECTION")]
        sections: Vec<Section>,

        /// What to do with links that are not tracking redirects (pass-through, skip, fail)
        #[arg(long, default_value = "pass-through", value_name = "POLICY")]
        unwrap: UnwrapPolicy,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        /// HTTP timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        timeout: u64,
    },

    /// Split text into chunks at sentence, clause or word boundaries
    Split {
        /// Text to split, or "-" for stdin
        #[arg(value_name = "TEXT")]
        text: String,

        /// Maximum characters per chunk
        #[arg(short, long, default_value_t = digestor_core::CHUNK_BUDGET, value_name = "CHARS")]
        budget: usize,
    },

    /// Shorten a post to the character limit, keeping trailing hashtags
    Trim {
        /// Text to trim, or "-" for stdin
        #[arg(value_name = "TEXT")]
        text: String,

        /// Maximum characters
        #[arg(short, long, default_value_t = digestor_core::POST_LIMIT, value_name = "CHARS")]
        limit: usize,
    },

    /// Revise every article of a newsletter and publish it
    Post {
        /// HTML file, .eml file or URL (default: newest .eml in the inbox)
        #[arg(value_name = "INPUT")]
        input: Option<String>,

        /// Directory holding saved .eml newsletters
        #[arg(long, value_name = "DIR")]
        inbox: Option<PathBuf>,

        /// Log posts instead of publishing them
        #[arg(long)]
        dry_run: bool,

        /// Revision backend (openai, anthropic, ollama, echo)
        #[arg(long, value_name = "NAME")]
        reviser: Option<ReviserKind>,

        /// Only post these sections (repeatable)
        #[arg(short, long = "section", value_name = "SECTION")]
        sections: Vec<Section>,

        /// Maximum characters per chunk sent for revision
        #[arg(long, value_name = "CHARS")]
        budget: Option<usize>,

        /// Seconds to wait between articles
        #[arg(long, value_name = "SECS")]
        pause: Option<u64>,

        /// Attempts per post
        #[arg(long, value_name = "NUM")]
        retries: Option<u32>,

        /// Seconds between attempts
        #[arg(long, value_name = "SECS")]
        retry_delay: Option<u64>,

        /// Write the run report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// HTTP timeout in seconds when INPUT is a URL
        #[arg(long, default_value = "30", value_name = "SECS")]
        timeout: u64,
    },

    /// Shorten a URL
    Shorten {
        #[arg(value_name = "URL")]
        url: String,

        /// Service (tinyurl, isgd, vgd, bitly)
        #[arg(long, default_value = "tinyurl", value_name = "NAME")]
        service: ShortenService,
    },
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "warn,digestor=debug,digestor_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Reads a positional text argument, or stdin for "-"
fn read_text_arg(text: &str) -> anyhow::Result<String> {
    if text == "-" {
        let input = fetch_stdin().context("Failed to read from stdin")?;
        Ok(input.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Ok(text.to_string())
    }
}

/// Loads newsletter HTML from stdin, a URL, an .eml file or an HTML file
async fn read_newsletter(input: &str, timeout: u64, verbose: bool) -> anyhow::Result<String> {
    if input == "-" {
        if verbose {
            echo::print_step(1, 3, "Reading from stdin");
        }
        return fetch_stdin().context("Failed to read from stdin");
    }

    if input.starts_with("http://") || input.starts_with("https://") {
        if verbose {
            echo::print_step(1, 3, &format!("Fetching from {}", input.bright_white().underline()));
        }
        let config = FetchConfig { timeout, ..Default::default() };
        return fetch_url(input, &config).await.with_context(|| format!("Failed to fetch {}", input));
    }

    let path = Path::new(input);
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("eml")) {
        if verbose {
            echo::print_step(1, 3, &format!("Reading email {}", input.bright_white()));
        }
        let bytes = fs::read(path).with_context(|| format!("Failed to read file: {}", input))?;
        return html_body(&bytes).with_context(|| format!("Failed to read HTML body of {}", input));
    }

    if verbose {
        echo::print_step(1, 3, &format!("Reading from file {}", input.bright_white()));
    }
    fetch_file(path).with_context(|| format!("Failed to read file: {}", input))
}

fn extract(html: &str, sections: &[Section], unwrap: UnwrapPolicy) -> anyhow::Result<SectionMap> {
    let config = ExtractConfig::builder().unwrap_policy(unwrap).build();
    let mut extracted = extract_sections_with_config(html, &config).context("Failed to extract sections")?;
    if !sections.is_empty() {
        extracted.retain_sections(sections);
    }
    Ok(extracted)
}

#[allow(clippy::too_many_arguments)]
async fn run_extract(
    input: &str, format: OutputFormat, output: Option<PathBuf>, width: usize, sections: &[Section],
    unwrap: UnwrapPolicy, compact: bool, timeout: u64, verbose: bool,
) -> anyhow::Result<()> {
    let html = read_newsletter(input, timeout, verbose).await?;
    if verbose {
        echo::print_detail("Size", &echo::format_size(html.len()));
        echo::print_step(2, 3, "Extracting sections");
    }

    let extracted = extract(&html, sections, unwrap)?;
    if verbose {
        echo::print_section_counts(&extracted);
        echo::print_step(3, 3, "Writing output");
        echo::print_detail("Format", &format.to_string());
    }

    let rendered = match format {
        OutputFormat::Json => convert_to_json(&extracted, &JsonConfig { pretty: !compact, ..Default::default() })
            .context("Failed to render JSON")?,
        OutputFormat::Text => convert_to_text(&extracted, &TextConfig { line_width: width, ..Default::default() }),
        OutputFormat::Markdown => convert_to_markdown(&extracted, &MarkdownConfig::default()),
    };

    match output {
        Some(path) => {
            fs::write(&path, rendered).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

struct PostArgs {
    input: Option<String>,
    inbox: Option<PathBuf>,
    dry_run: bool,
    reviser: Option<ReviserKind>,
    sections: Vec<Section>,
    budget: Option<usize>,
    pause: Option<u64>,
    retries: Option<u32>,
    retry_delay: Option<u64>,
    report: Option<PathBuf>,
    timeout: u64,
}

async fn run_post(mut settings: Settings, args: PostArgs, verbose: bool) -> anyhow::Result<()> {
    if let Some(kind) = args.reviser.filter(|kind| *kind != settings.revise.provider) {
        settings.revise.provider = kind;
        settings.revise.model = None;
        settings.revise.api_key = None;
        settings.apply_env(|key| std::env::var(key).ok());
    }
    let pipeline_settings = &mut settings.pipeline;
    if !args.sections.is_empty() {
        pipeline_settings.sections = args.sections;
    }
    if let Some(budget) = args.budget {
        pipeline_settings.chunk_budget = budget;
    }
    if let Some(pause) = args.pause {
        pipeline_settings.pause_secs = pause;
    }
    if let Some(retries) = args.retries {
        pipeline_settings.retry_attempts = retries;
    }
    if let Some(delay) = args.retry_delay {
        pipeline_settings.retry_delay_secs = delay;
    }

    let (html, staged): (String, Option<StagedMessage>) = match args.input {
        Some(input) => (read_newsletter(&input, args.timeout, verbose).await?, None),
        None => {
            let inbox = args
                .inbox
                .or_else(|| settings.pipeline.inbox.clone())
                .context("No input given and no inbox configured (use --inbox or [pipeline] inbox)")?;
            let staging = settings
                .pipeline
                .staging_dir
                .clone()
                .unwrap_or_else(|| inbox.join(".staging"));
            if verbose {
                echo::print_step(1, 3, &format!("Reading newest message in {}", inbox.display().bright_white()));
            }
            let (staged, content) = load_latest_html(&inbox, &staging)
                .with_context(|| format!("Failed to load a newsletter from {}", inbox.display()))?;
            if let Some(subject) = &content.subject {
                echo::print_info(&format!("Processing \"{}\"", subject));
            }
            (content.html, Some(staged))
        }
    };

    if verbose {
        echo::print_step(2, 3, "Extracting sections");
    }
    let extracted = extract(&html, &settings.pipeline.sections, UnwrapPolicy::default())?;
    if verbose {
        echo::print_section_counts(&extracted);
    }
    if extracted.is_empty() {
        echo::print_warning("No articles found in the newsletter");
    }

    let reviser = build_reviser(&settings.revise).context("Failed to set up the reviser")?;
    let publisher: Box<dyn Publisher> = if args.dry_run {
        Box::new(DryRunPublisher::new())
    } else {
        Box::new(XPublisher::new(&settings.publish).context("Failed to set up the publisher")?)
    };

    if verbose {
        echo::print_step(3, 3, &format!("Posting with reviser {}", reviser.name().bright_white()));
    }
    let config = PipelineConfig::from(&settings.pipeline);
    let report = Pipeline::new(reviser.as_ref(), publisher.as_ref(), config).run(&extracted).await;
    echo::print_report(&report, args.dry_run);

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to render report")?;
        fs::write(&path, json).with_context(|| format!("Failed to write to file: {}", path.display()))?;
    }

    if let Some(staged) = staged {
        if args.dry_run {
            echo::print_info(&format!("Dry run: left {} in the inbox", staged.original_path().display()));
        } else {
            staged.consume().context("Failed to remove the processed message")?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    debug!(reviser = %settings.revise.provider, inbox = ?settings.pipeline.inbox, "settings loaded");

    match cli.command {
        Command::Extract { input, format, output, width, sections, unwrap, compact, timeout } => {
            run_extract(&input, format, output, width, &sections, unwrap, compact, timeout, cli.verbose).await?;
        }
        Command::Split { text, budget } => {
            for chunk in split(&read_text_arg(&text)?, budget) {
                println!("{}", chunk);
            }
        }
        Command::Trim { text, limit } => {
            let trimmed = trim(&read_text_arg(&text)?, limit).context("Failed to trim text")?;
            println!("{}", trimmed);
        }
        Command::Post { input, inbox, dry_run, reviser, sections, budget, pause, retries, retry_delay, report, timeout } => {
            let args =
                PostArgs { input, inbox, dry_run, reviser, sections, budget, pause, retries, retry_delay, report, timeout };
            run_post(settings, args, cli.verbose).await?;
        }
        Command::Shorten { url, service } => {
            let shortener = Shortener::new(settings.shorten.bitly_token.clone())?;
            let short = shortener.shorten(&url, service).await.context("Failed to shorten URL")?;
            println!("{}", short);
        }
    }

    Ok(())
}
