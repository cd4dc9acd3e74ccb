//! `fetch` and `watch` subcommands

use crate::config::EvsyncConfig;
use anyhow::{anyhow, bail, Result};
use evsync_core::{CycleOutcome, RecordSource, StatusSynchronizer, TrackableRecord};
use evsync_http::HttpRecordSource;
use std::process::ExitCode;
use std::time::Duration;

/// Exit code when `--timeout-secs` elapses before everything settles
const EXIT_TIMED_OUT: u8 = 2;

/// Exit code on Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Case(String),
    Item(String),
}

impl Target {
    fn key(&self) -> &str {
        match self {
            Self::Case(key) | Self::Item(key) => key,
        }
    }
}

fn source_for(config: &EvsyncConfig, target: &Target) -> Result<HttpRecordSource> {
    let source = match target {
        Target::Case(_) => HttpRecordSource::collection(&config.api)?,
        Target::Item(_) => HttpRecordSource::item(&config.api)?,
    };
    Ok(source)
}

/// One refresh; a failed fetch becomes an error here since there is no view to fall back on
async fn initial_refresh<S: RecordSource>(sync: &StatusSynchronizer<S>) -> Result<()> {
    match sync.refresh().await {
        CycleOutcome::Applied { .. } => Ok(()),
        CycleOutcome::Skipped => bail!("an id is required"),
        CycleOutcome::Failed => Err(sync
            .last_error()
            .map_or_else(|| anyhow!("fetch failed"), anyhow::Error::from)),
    }
}

fn print_records(records: &[TrackableRecord]) {
    for record in records {
        let name = record
            .field("filename")
            .or_else(|| record.field("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!("{:<28} {:<13} {}", record.id, record.status, name);
    }
}

pub(crate) async fn fetch(config: &EvsyncConfig, target: &Target, json: bool) -> Result<ExitCode> {
    let sync = StatusSynchronizer::builder(source_for(config, target)?)
        .collection_key(target.key())
        .options(config.sync.clone().with_enabled(false))
        .build()?;
    initial_refresh(&sync).await?;

    let records = sync.records();
    if json {
        println!("{}", serde_json::to_string_pretty(&*records)?);
    } else {
        print_records(&records);
        println!("{}", sync.summary());
    }
    Ok(ExitCode::SUCCESS)
}

enum WatchEnd {
    Settled,
    TimedOut,
    Interrupted,
}

pub(crate) async fn watch(
    config: &EvsyncConfig,
    target: &Target,
    timeout_secs: Option<u64>,
) -> Result<ExitCode> {
    let sync = StatusSynchronizer::builder(source_for(config, target)?)
        .collection_key(target.key())
        .options(config.sync.clone())
        .on_status_change(|record, previous| {
            println!("{:<28} {previous} -> {}", record.id, record.status);
        })
        .build()?;
    initial_refresh(&sync).await?;
    print_records(&sync.records());

    if !config.sync.enabled {
        tracing::warn!("polling disabled in config, not watching");
        println!("{}", sync.summary());
        return Ok(ExitCode::SUCCESS);
    }

    let mut updates = sync.subscribe();
    let settled = async {
        while sync.has_non_terminal_items() {
            if updates.changed().await.is_err() {
                break;
            }
        }
    };
    let bounded = async {
        match timeout_secs.map(Duration::from_secs) {
            Some(limit) => tokio::time::timeout(limit, settled).await.is_ok(),
            None => {
                settled.await;
                true
            }
        }
    };

    let end = tokio::select! {
        done = bounded => if done { WatchEnd::Settled } else { WatchEnd::TimedOut },
        _ = tokio::signal::ctrl_c() => WatchEnd::Interrupted,
    };
    sync.stop_polling();

    println!("{}", sync.summary());
    if let Some(e) = sync.last_error() {
        tracing::warn!(error = %e, "last fetch failed");
    }

    Ok(match end {
        WatchEnd::Settled => ExitCode::SUCCESS,
        WatchEnd::TimedOut => {
            tracing::warn!("timed out with records still processing");
            ExitCode::from(EXIT_TIMED_OUT)
        }
        WatchEnd::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use evsync_http::{ApiConfig, Scope};

    #[test]
    fn target_selects_scope() {
        let config = EvsyncConfig::new(ApiConfig::new("http://localhost:8080"));

        let source = source_for(&config, &Target::Case("case-1".into())).unwrap();
        assert!(matches!(source.scope(), Scope::Collection { .. }));

        let source = source_for(&config, &Target::Item("ev-1".into())).unwrap();
        assert_eq!(source.scope(), &Scope::item());
    }

    #[test]
    fn target_key() {
        assert_eq!(Target::Case("c".into()).key(), "c");
        assert_eq!(Target::Item("i".into()).key(), "i");
    }
}
