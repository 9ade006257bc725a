mod backend;
mod cli;
mod error_fmt;
mod run;

use std::fs;
use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use poolctl_config::Config;
use poolctl_core::devices::ColorIndex;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(&cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    color_eyre::install()?;

    match cli.cmd {
        // Listing colors needs no config.
        Commands::ShowColors => show_colors(cli.json),
        Commands::Run { ticks } => {
            let (cfg, backend) = setup(cli)?;
            run::run_controller(&cfg, backend, ticks)?;
        }
        Commands::SelfCheck => {
            let (cfg, backend) = setup(cli)?;
            let items = run::self_check(&cfg, &backend);
            let failed: Vec<_> = items.iter().filter(|i| !i.ok).map(|i| i.name.clone()).collect();
            if cli.json {
                let checks: Vec<_> = items
                    .iter()
                    .map(|i| json!({ "name": i.name, "ok": i.ok, "detail": i.detail }))
                    .collect();
                println!("{}", json!({ "ok": failed.is_empty(), "checks": checks }));
            } else {
                for i in &items {
                    println!("{:<4} {}: {}", if i.ok { "ok" } else { "FAIL" }, i.name, i.detail);
                }
            }
            if !failed.is_empty() {
                eyre::bail!("self-check failed: {}", failed.join(", "));
            }
        }
    }
    Ok(())
}

fn setup(cli: &Cli) -> Result<(Config, backend::Backend)> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli, &cfg)?;
    tracing::info!(config = %cli.config.display(), mode = ?cfg.hardware.mode, "config loaded");
    let backend = backend::build(&cfg)?;
    Ok((cfg, backend))
}

fn load_config(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = poolctl_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, cfg: &Config) -> Result<()> {
    // RUST_LOG, then --log-level, then [logging] level.
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err("invalid log level")?;

    let file_writer = match &cfg.logging.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "never" => tracing_appender::rolling::never(dir, name),
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                other => eyre::bail!("logging.rotation must be never|daily|hourly, got {other}"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    // stdout carries snapshots and command replies; logs go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            cli.json
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!cli.json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
        .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn show_colors(as_json: bool) {
    if as_json {
        let colors: Vec<_> = ColorIndex::all()
            .map(|c| json!({ "index": c.get(), "name": c.name() }))
            .collect();
        println!("{}", json!(colors));
    } else {
        for c in ColorIndex::all() {
            println!("{:>2}  {}", c.get(), c.name());
        }
    }
}
