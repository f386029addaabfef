//! tracing-subscriber setup. Logs go to stderr so stdout stays clean for `--json`.

use anyhow::{Context, Result};
use std::io;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingSection};

/// `RUST_LOG` wins over the configured level.
fn filter_directive(rust_log: Option<String>, level: &str) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ => level.to_string(),
    }
}

pub fn init(cfg: &LoggingSection) -> Result<()> {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), &cfg.level);
    let env_filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match cfg.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .json();
            registry.with(json_layer).try_init()
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .with_target(false)
                .with_writer(io::stderr);
            registry.with(pretty_layer).try_init()
        }
    };
    installed.context("install tracing subscriber")?;

    Ok(())
}
