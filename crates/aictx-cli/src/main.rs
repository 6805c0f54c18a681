//! aictx - Build LLM context files from code, repositories, videos and web pages
//!
//! Each input location becomes one markdown file in the output directory.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "aictx")]
#[command(about = "Build LLM context files from code, repositories, videos and web pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only print warnings, errors and the final summary
    #[arg(long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./aictx.toml or ~/.config/aictx/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert locations into context files
    Run(cmd::run::RunArgs),
    /// Serve a JSON API for generating one context file at a time
    Serve(cmd::serve::ServeArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(aictx_core::ProgressContext::new());

    // Logging:
    //   TTY:     warn unless --debug, the status line shows activity
    //   non-TTY: info unless --debug or --quiet
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    aictx_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    aictx_sources::set_http_config(config.http_config());

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress, cli.quiet),
        Command::Serve(args) => cmd::serve::run(args, &config),
        Command::Config => {
            show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn show_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let endpoints = config.endpoints();
    let ignore = if config.ignore.patterns.is_empty() {
        "(defaults only)".to_string()
    } else {
        config.ignore.patterns.join(", ")
    };

    table.add_row(vec![
        "Output directory",
        &config.output.dir.display().to_string(),
    ]);
    table.add_row(vec![
        "Workers",
        &format!("{} (max: {})", config.workers.default, config.workers.max),
    ]);
    table.add_row(vec![
        "Connect timeout",
        &format!("{}s", config.http.connect_timeout),
    ]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", config.http.request_timeout),
    ]);
    table.add_row(vec!["Ignore patterns", &ignore]);
    table.add_row(vec!["Transcript API", &endpoints.api_base]);
    table.add_row(vec!["Watch page", &endpoints.watch_base]);
    table.add_row(vec!["Serve address", &config.serve.bind.to_string()]);
    table.add_row(vec![
        aictx_sources::repository::TOKEN_ENV,
        if std::env::var_os(aictx_sources::repository::TOKEN_ENV).is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);

    eprintln!("\n{table}");
}
