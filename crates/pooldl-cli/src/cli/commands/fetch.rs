//! `pooldl fetch` – download a batch of URLs over a pool of curl connections.

use anyhow::{bail, Context, Result};
use pooldl_core::config::PooldlConfig;
use pooldl_core::storage::DirectorySink;
use pooldl_core::transport::{CurlConnector, Downloaded};
use pooldl_core::{pooled_download_with_events, EventBus, PoolEvent, Save};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use url::Url;

/// Arguments of `pooldl fetch` after clap parsing.
#[derive(Debug, Default)]
pub struct FetchOptions {
    pub urls: Vec<Url>,
    pub input: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub overwrite: bool,
}

pub async fn run_fetch(cfg: &PooldlConfig, opts: FetchOptions) -> Result<()> {
    let mut urls = opts.urls;
    if let Some(path) = &opts.input {
        urls.extend(read_url_list(path)?);
    }
    if urls.is_empty() {
        bail!("no URLs given; pass them as arguments or with --input");
    }

    let jobs = opts.jobs.unwrap_or(cfg.max_concurrency);
    if jobs == 0 {
        bail!("--jobs must be at least 1");
    }

    let dir = match opts.output_dir.or_else(|| cfg.output_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let sink = Arc::new(DirectorySink::create(&dir, opts.overwrite || cfg.overwrite)?);

    let total = urls.len();
    let events = EventBus::default();
    let progress = tokio::spawn(print_progress(events.subscribe(), total));

    tracing::info!(urls = total, jobs, dir = %dir.display(), "fetch");
    let started = Instant::now();
    let save = {
        let sink = Arc::clone(&sink);
        move |content: Downloaded| {
            let sink = Arc::clone(&sink);
            async move { sink.save(content).await }
        }
    };
    let result = pooled_download_with_events(
        CurlConnector::new(cfg.transport.clone()),
        save,
        urls,
        jobs,
        events,
    )
    .await;

    // Tasks stuck behind a failed download keep the event channel open.
    progress.abort();
    let _ = progress.await;
    if let Ok(report) = &result {
        // The live count misses events a lagging receiver skipped.
        print!("{}", progress_line(report.saved, total));
    }
    println!();

    let report = result.context("batch download failed")?;
    println!(
        "downloaded {} file(s) into {} over {} connection(s) in {:.1}s",
        report.saved,
        sink.dir().display(),
        report.connections,
        started.elapsed().as_secs_f64()
    );
    for path in sink.saved() {
        tracing::debug!(path = %path.display(), "saved");
    }
    Ok(())
}

/// Returns the live count, which can end below `total` if the receiver lagged.
pub(crate) async fn print_progress(
    mut rx: tokio::sync::broadcast::Receiver<PoolEvent>,
    total: usize,
) -> usize {
    let mut done = 0usize;
    loop {
        match rx.recv().await {
            Ok(PoolEvent::DownloadFinished { .. }) => {
                done += 1;
                print!("{}", progress_line(done, total));
                let _ = std::io::stdout().flush();
            }
            Ok(PoolEvent::ConnectFailed { remaining, .. }) => {
                println!("  warning: continuing with {} connection(s)", remaining);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress display lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    done
}

pub(crate) fn progress_line(done: usize, total: usize) -> String {
    format!("\r  {} / {} downloaded  ", done, total)
}

fn read_url_list(path: &Path) -> Result<Vec<Url>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL list {}", path.display()))?;
    parse_url_list(&text).with_context(|| format!("in {}", path.display()))
}

/// One URL per line; blank lines and lines starting with `#` are skipped.
pub(crate) fn parse_url_list(text: &str) -> Result<Vec<Url>> {
    text.lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| Url::parse(line).with_context(|| format!("line {}: invalid URL {:?}", n, line)))
        .collect()
}
