//! load-tweets - load zipped tweet archives into a normalized database
//!
//! Main entry point for the load-tweets command-line tool.

use anyhow::Result;
use chrono::Local;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

use tweet_loader::doctor::{self, HealthCheck};
use tweet_loader::logging::{LogConfig, init_logging};
use tweet_loader::*;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error(&cli, &err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    if !config.output.colors {
        colored::control::set_override(false);
    }
    init_logging(&LogConfig::from_flags(
        cli.quiet || config.output.quiet,
        cli.verbose,
        config.output.colors,
    ));

    match &cli.command {
        Commands::Load(args) => cmd_load(cli, &config, args),
        Commands::Stats(args) => cmd_stats(cli, &config, args),
        Commands::Config(args) => cmd_config(cli, &config, args),
        Commands::Completions(args) => {
            cmd_completions(args);
            Ok(())
        }
    }
}

fn render_error(cli: &Cli, err: &anyhow::Error) -> String {
    let title = match &cli.command {
        Commands::Load(_) => "Load failed",
        Commands::Stats(_) => "Stats failed",
        Commands::Config(_) => "Config failed",
        Commands::Completions(_) => "Completions failed",
    };
    let loader_err = err.downcast_ref::<LoaderError>();
    let mut suggestions: Vec<&str> = loader_err
        .and_then(LoaderError::suggestion)
        .into_iter()
        .collect();
    if loader_err.is_some_and(LoaderError::is_record_error) {
        suggestions.push("Records loaded before this one were committed.");
    }
    if suggestions.is_empty() && !loader_err.is_some_and(LoaderError::is_recoverable) {
        suggestions.push("Re-run with -v for more detail.");
    }
    format_error(title, &format!("{err:#}"), &suggestions)
}

fn get_db_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| config.db_path())
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[derive(Serialize)]
struct LoadReport<'a> {
    db: &'a Path,
    summary: &'a LoadSummary,
    tables: TableCounts,
}

fn cmd_load(cli: &Cli, config: &Config, args: &cli::LoadArgs) -> Result<()> {
    let db_path = get_db_path(cli, config);
    let quiet = cli.quiet || config.output.quiet;
    let text = cli.format == OutputFormat::Text;

    let mut options = LoadOptions::from(&config.load);
    if let Some(every) = args.print_every {
        options.print_every = every;
    }
    if args.no_reverse {
        options.reverse_order = false;
    }

    let mut storage = open_store(&db_path)?;
    debug!(db = %db_path.display(), ?options, "Starting load");

    if text && !quiet {
        println!("{}", "Loading tweet archives...".bold().cyan());
        println!("  Database: {}", db_path.display());
        println!();
    }

    let show_progress = text && !quiet;
    let pb = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };
    // A bar drawing to a non-terminal is hidden and swallows its printlns.
    let emit = |line: String| {
        if show_progress && pb.is_hidden() {
            println!("{line}");
        } else {
            pb.println(line);
        }
    };

    let summary = load_archives(&mut storage, &args.inputs, &options, |event| match event {
        ProgressEvent::ArchiveStarted {
            archive,
            position,
            total,
        } => {
            pb.set_length(total as u64);
            pb.set_position(position as u64);
            pb.set_message(
                archive
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            emit(format!("{} {}", timestamp(), archive.display()));
        }
        ProgressEvent::Record {
            archive,
            entry,
            index,
            id_tweets,
            ..
        } => emit(format!(
            "{} {} {} i= {} id= {}",
            timestamp(),
            archive.display(),
            entry,
            index,
            id_tweets
        )),
        ProgressEvent::ArchiveFinished { .. } => pb.inc(1),
    });
    pb.finish_and_clear();
    let summary = summary?;
    let tables = storage.table_counts()?;

    match cli.format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let report = LoadReport {
                db: &db_path,
                summary: &summary,
                tables,
            };
            print_json(cli.format, &report)?;
        }
        OutputFormat::Text => {
            if !quiet {
                println!();
                println!("{}", "Load complete!".bold().green());
                println!(
                    "  {} archives, {} entries, {} records",
                    format_count(summary.archives),
                    format_count(summary.entries),
                    format_count(summary.records)
                );
                println!(
                    "  {} inserted, {} already present",
                    format_count(summary.inserted).cyan(),
                    format_count(summary.skipped).dimmed()
                );
                println!(
                    "  Store now holds {} tweets from {} users",
                    format_number(tables.tweets).cyan(),
                    format_number(tables.users).cyan()
                );
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct StatsReport {
    tables: TableCounts,
    unhydrated_users: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    checks: Option<Vec<HealthCheck>>,
}

fn cmd_stats(cli: &Cli, config: &Config, args: &cli::StatsArgs) -> Result<()> {
    let db_path = get_db_path(cli, config);
    if !db_path.exists() {
        return Err(LoaderError::database_not_found(&db_path).into());
    }

    let storage = Storage::open(&db_path)?;
    let report = StatsReport {
        tables: storage.table_counts()?,
        unhydrated_users: storage.unhydrated_user_count()?,
        checks: args.check.then(|| storage.database_health_checks()),
    };

    match cli.format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(cli.format, &report)?,
        OutputFormat::Text => {
            let t = &report.tables;
            println!("{}", "Store Statistics".bold().cyan());
            println!("{}", "─".repeat(40));
            for (label, count) in [
                ("users:", t.users),
                ("tweets:", t.tweets),
                ("urls:", t.urls),
                ("tweet_urls:", t.tweet_urls),
                ("tweet_mentions:", t.tweet_mentions),
                ("tweet_tags:", t.tweet_tags),
                ("tweet_media:", t.tweet_media),
            ] {
                println!("  {label:<20} {:>14}", format_number(count));
            }
            println!("{}", "─".repeat(40));
            println!(
                "  {:<20} {:>14}",
                "unhydrated users:",
                format_number(report.unhydrated_users)
            );

            if let Some(checks) = &report.checks {
                println!();
                println!("{}", "Checks".bold().cyan());
                for check in checks {
                    println!("{}", check.render());
                }
            }
        }
    }

    if let Some(checks) = &report.checks {
        if !doctor::all_ok(checks) {
            anyhow::bail!("Store checks failed for {}", db_path.display());
        }
    }

    Ok(())
}

fn cmd_config(cli: &Cli, config: &Config, args: &cli::ConfigArgs) -> Result<()> {
    if args.path {
        match Config::user_config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", "No config directory on this platform.".yellow()),
        }
    }

    if args.init {
        match Config::user_config_path() {
            Some(path) if path.exists() => {
                println!(
                    "{} Config already exists at {}",
                    "!".yellow(),
                    path.display()
                );
            }
            _ => {
                let path = Config::write_user_config(&Config::default_config_content())?;
                println!("{} Wrote {}", "✓".green(), path.display());
            }
        }
    }

    if args.show || !(args.path || args.init) {
        let mut effective = config.clone();
        effective.paths.db = Some(get_db_path(cli, config));
        match cli.format {
            OutputFormat::Json | OutputFormat::JsonPretty => print_json(cli.format, &effective)?,
            OutputFormat::Text => {
                println!("{}", "Current Configuration".bold().cyan());
                print!("{}", effective.to_toml());
            }
        }
    }

    Ok(())
}

fn cmd_completions(args: &cli::CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "load-tweets", &mut io::stdout());
}

fn print_json<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let json = if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
