use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let sections = ["attacks", "strategies", "misc", "quick-links"];

    let mut cmd = clap::Command::new("digestor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn newsletter emails into social media posts")
        .arg(clap::arg!(-v --verbose "Enable debug logging").global(true))
        .arg(
            clap::arg!(--config <FILE> "Settings file")
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .subcommand_required(true)
        .subcommand(
            clap::Command::new("extract")
                .about("Extract the curated sections of a newsletter")
                .arg(clap::arg!(<INPUT> "HTML file, .eml file, URL, or '-' for stdin"))
                .arg(
                    clap::arg!(-f --format <FORMAT> "Output format")
                        .default_value("json")
                        .value_parser(["json", "text", "markdown"]),
                )
                .arg(
                    clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(clap::arg!(--width <COLS> "Wrap descriptions at this width").default_value("80"))
                .arg(
                    clap::arg!(-s --section <SECTION> "Only keep these sections")
                        .action(clap::ArgAction::Append)
                        .value_parser(sections),
                )
                .arg(
                    clap::arg!(--unwrap <POLICY> "Handling of links that are not tracking redirects")
                        .default_value("pass-through")
                        .value_parser(["pass-through", "skip", "fail"]),
                )
                .arg(clap::arg!(--compact "Single-line JSON"))
                .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30")),
        )
        .subcommand(
            clap::Command::new("split")
                .about("Split text into chunks at sentence, clause or word boundaries")
                .arg(clap::arg!(<TEXT> "Text to split, or '-' for stdin"))
                .arg(clap::arg!(-b --budget <CHARS> "Maximum characters per chunk").default_value("220")),
        )
        .subcommand(
            clap::Command::new("trim")
                .about("Shorten a post to the character limit, keeping trailing hashtags")
                .arg(clap::arg!(<TEXT> "Text to trim, or '-' for stdin"))
                .arg(clap::arg!(-l --limit <CHARS> "Maximum characters").default_value("280")),
        )
        .subcommand(
            clap::Command::new("post")
                .about("Revise every article of a newsletter and publish it")
                .arg(clap::arg!([INPUT] "HTML file, .eml file or URL"))
                .arg(
                    clap::arg!(--inbox <DIR> "Directory holding saved .eml newsletters")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(clap::arg!(--dry_run "Log posts instead of publishing them"))
                .arg(
                    clap::arg!(--reviser <NAME> "Revision backend")
                        .value_parser(["openai", "anthropic", "ollama", "echo"]),
                )
                .arg(
                    clap::arg!(-s --section <SECTION> "Only post these sections")
                        .action(clap::ArgAction::Append)
                        .value_parser(sections),
                )
                .arg(clap::arg!(--budget <CHARS> "Maximum characters per chunk sent for revision"))
                .arg(clap::arg!(--pause <SECS> "Seconds to wait between articles"))
                .arg(clap::arg!(--retries <NUM> "Attempts per post"))
                .arg(clap::arg!(--retry_delay <SECS> "Seconds between attempts"))
                .arg(
                    clap::arg!(--report <FILE> "Write the run report as JSON")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds when INPUT is a URL").default_value("30")),
        )
        .subcommand(
            clap::Command::new("shorten")
                .about("Shorten a URL")
                .arg(clap::arg!(<URL> "URL to shorten"))
                .arg(
                    clap::arg!(--service <NAME> "Shortening service")
                        .default_value("tinyurl")
                        .value_parser(["tinyurl", "isgd", "vgd", "bitly"]),
                ),
        );

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "digestor", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "digestor", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "digestor", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "digestor", &completions_dir).unwrap();

    println!("cargo:warning=Shell completions generated in: {}", completions_dir.display());
}
