// SPDX-License-Identifier: AGPL-3.0-or-later
// Command-line interface for emlc
//
// Converts one file per invocation. Formats come from the file extensions:
// an input ending in `.eml` is read as EML, anything else as markup; the
// output extension picks the renderer (`.eml`, strict markup for `.xml`,
// `.xaml` and `.fxml`, loose markup otherwise).
//
// Usage:
//  emlc <input> <output> [--config <path>] [--indent <n>] [--dump-ast]
//  emlc -h | --help | /?
//  emlc -v | --version

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command, ValueHint};
use emlc_core::{EmlcConfig, FormatRegistry, SourceFormat};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXAMPLES: &str = "\
Examples:
  emlc index.eml index.html       Convert EML to HTML
  emlc site.eml index.php         Convert EML to PHP
  emlc view.eml view.xaml         Convert EML to XAML
  emlc layout.eml layout.fxml     Convert EML to FXML
  emlc input.eml output.xml       Convert EML to XML

  emlc index.html index.eml       Convert HTML to EML
  emlc index.php site.eml         Convert PHP to EML
  emlc view.xaml view.eml         Convert XAML to EML
  emlc layout.fxml layout.eml     Convert FXML to EML
  emlc input.xml output.eml       Convert XML to EML";

fn build_cli() -> Command {
    Command::new("emlc")
        .about("Convert between EML and HTML, PHP, XML, XAML or FXML")
        .disable_version_flag(true)
        .after_help(EXAMPLES)
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("Input file path (.eml, .xml, .html, .php, .xaml, .fxml)")
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .help("Output file path")
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Show version information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to an emlc.toml configuration file")
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("indent")
                .long("indent")
                .value_name("N")
                .help("Indent output with N spaces per level")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("dump-ast")
                .long("dump-ast")
                .help("Print the parsed document tree as JSON")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emlc=warn,emlc_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();
    let mut cli = build_cli();

    if args.len() < 2 || args[1] == "/?" {
        println!("{}", cli.render_help());
        return ExitCode::SUCCESS;
    }

    let matches = match cli.clone().try_get_matches_from(&args) {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if matches.get_flag("version") {
        println!("emlc version {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let (Some(input), Some(output)) = (
        matches.get_one::<PathBuf>("input"),
        matches.get_one::<PathBuf>("output"),
    ) else {
        eprintln!("Error: Missing output file path.");
        eprintln!("{}", cli.render_help());
        return ExitCode::FAILURE;
    };

    init_logging();

    match run(input, output, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(matches: &ArgMatches) -> Result<EmlcConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EmlcConfig::load(path)
            .with_context(|| format!("Could not load config {}", path.display()))?,
        None => EmlcConfig::default(),
    };
    if let Some(width) = matches.get_one::<usize>("indent") {
        config.render.indent = " ".repeat(*width);
    }
    Ok(config)
}

fn run(input: &Path, output: &Path, matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;

    let source = fs::read_to_string(input)
        .with_context(|| format!("Could not open {}", input.display()))?;

    let from = SourceFormat::from_path(input);
    let to = SourceFormat::from_path(output);
    debug!(from = from.label(), to = to.label(), "converting");

    let registry = FormatRegistry::with_defaults();
    let parser = registry
        .get(from)
        .with_context(|| format!("No parser for {}", from.label()))?;
    let renderer = registry
        .get(to)
        .with_context(|| format!("No renderer for {}", to.label()))?;

    let outcome = parser.parse_with_anomalies(&source, &config.parse);
    for anomaly in &outcome.anomalies {
        debug!(%anomaly, "recovered");
    }
    if !outcome.is_clean() {
        info!(
            count = outcome.anomalies.len(),
            "{} was malformed, recovered",
            input.display()
        );
    }

    let document = outcome.document;
    if matches.get_flag("dump-ast") {
        println!("{}", document.to_json()?);
    }

    let rendered = renderer.render(&document, &config.render)?;
    fs::write(output, rendered)
        .with_context(|| format!("Could not open output {}", output.display()))?;

    println!("Converted {} -> {}", input.display(), output.display());
    Ok(())
}
