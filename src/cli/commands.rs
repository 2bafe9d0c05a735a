//! Command handlers for the forklet CLI
//!
//! This module implements the command handlers that connect CLI arguments to
//! the GitHub client and the download orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::app::{
    DownloadOrchestrator, DownloadRequest, DownloadResult, DownloadSession, DownloadStatus,
    FilterEngine, FsStorageWriter, GitHubClient, Repository, RepositoryContentClient,
    RepositoryReference,
};
use crate::cli::{
    DownloadArgs, GlobalArgs, ListArgs, ProgressConfig, ProgressDisplay, RefArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the download command
///
/// Resolves the reference, starts a download session and follows it with a
/// progress display until it finishes. Ctrl-C cancels the run; files already
/// in flight are completed. A failed run is returned as an error so the
/// process exits non-zero.
pub async fn handle_download(
    global: &GlobalArgs,
    config: &AppConfig,
    args: DownloadArgs,
) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let client = build_client(global, config)?;
    let reference = resolve_reference(&client, &args.repository, &args.reference).await?;
    info!("Resolved {} as {}", reference, reference.kind());

    let mut display = ProgressDisplay::new(ProgressConfig {
        enable_progress_bars: config.download.show_progress && !args.no_progress && !global.quiet,
        ..Default::default()
    });

    let request = build_request(config, &args, reference, display.bars_enabled());
    let writer = FsStorageWriter::new().with_progress(display.multi_progress().clone());
    let orchestrator = DownloadOrchestrator::new(Arc::new(client), Arc::new(writer))
        .with_config(config.to_orchestrator_config());

    if !global.quiet {
        display.start(&request.reference().to_string())?;
    }
    let session = orchestrator.start(request).await;
    let result = follow_session(&orchestrator, &session, &mut display).await;
    display.finish(&result);

    if !global.quiet {
        print_summary(&result);
    }
    info!("Download command finished in {:?}", start_time.elapsed());

    match result.status {
        DownloadStatus::Failed => Err(AppError::generic(
            result
                .error_message
                .unwrap_or_else(|| "Download failed".to_string()),
        )),
        _ => Ok(()),
    }
}

/// Handle the list command
///
/// Prints the files the filters select without downloading anything.
pub async fn handle_list(global: &GlobalArgs, config: &AppConfig, args: ListArgs) -> Result<()> {
    args.filters.validate().map_err(AppError::generic)?;

    let client = build_client(global, config)?;
    let reference = resolve_reference(&client, &args.repository, &args.reference).await?;

    let listing = client.list_tree(&reference).await?;
    let selection = FilterEngine::new(args.filters.to_criteria()).filter_files(listing);

    for file in &selection.included {
        if args.long {
            println!("{:>10}  {}", format_bytes(file.size), file.path);
        } else {
            println!("{}", file.path);
        }
    }

    if !global.quiet {
        eprintln!(
            "{} of {} entries selected from {} ({})",
            selection.filtered_files,
            selection.total_files,
            reference,
            format_bytes(selection.included_bytes())
        );
    }
    Ok(())
}

/// Handle the rate-limit command
pub async fn handle_rate_limit(global: &GlobalArgs, config: &AppConfig) -> Result<()> {
    let client = build_client(global, config)?;
    let info = client.rate_limit_info().await?;

    println!("API rate limit");
    println!("   Limit:     {}", info.limit);
    println!("   Used:      {}", info.used);
    println!("   Remaining: {}", info.remaining);
    println!(
        "   Resets at: {} (in {})",
        info.reset.format("%Y-%m-%d %H:%M:%S UTC"),
        crate::app::orchestrator::format_duration(info.reset_in())
    );

    if info.is_exhausted() {
        println!("⚠️  Quota nearly exhausted. Set GITHUB_TOKEN for a higher limit.");
    }
    Ok(())
}

/// Build the GitHub client from configuration and the global `--token`
fn build_client(global: &GlobalArgs, config: &AppConfig) -> Result<GitHubClient> {
    let mut client_config = config.to_client_config();
    if let Some(token) = &global.token {
        client_config = client_config.with_token(token.clone());
    }
    if client_config.token.is_none() {
        debug!("No GitHub token configured, using unauthenticated requests");
    }
    client_config.validate()?;
    Ok(GitHubClient::with_config(client_config)?)
}

/// Turn `OWNER/REPO` and the reference flags into a reference
async fn resolve_reference(
    client: &GitHubClient,
    repository: &str,
    refs: &RefArgs,
) -> Result<RepositoryReference> {
    let repository = Repository::parse(repository)?;
    match &refs.sha {
        Some(sha) => Ok(RepositoryReference::commit(repository, sha.clone())?),
        None => Ok(client
            .resolve_reference(&repository, refs.reference.as_deref())
            .await?),
    }
}

/// Combine flags with configured defaults into a request
fn build_request(
    config: &AppConfig,
    args: &DownloadArgs,
    reference: RepositoryReference,
    show_progress: bool,
) -> DownloadRequest {
    let defaults = &config.download;
    let destination = args
        .destination
        .clone()
        .unwrap_or_else(|| PathBuf::from(reference.repo_name()));

    DownloadRequest::builder(reference, destination)
        .strategy(args.strategy.into())
        .filters(args.filters.to_criteria())
        .overwrite_existing(args.force || defaults.overwrite_existing)
        .create_destination(!args.no_create && defaults.create_destination)
        .preserve_structure(!args.flatten && defaults.preserve_structure)
        .max_concurrent_workers(args.workers.unwrap_or(defaults.workers))
        .timeout(args.timeout.unwrap_or(defaults.timeout))
        .show_progress(show_progress)
        .dry_run(args.dry_run)
        .build()
}

/// Poll progress until the session finishes, cancelling on Ctrl-C
async fn follow_session(
    orchestrator: &DownloadOrchestrator,
    session: &DownloadSession,
    display: &mut ProgressDisplay,
) -> DownloadResult {
    let mut ticker = tokio::time::interval(display.update_interval());
    let mut interrupted = false;
    let finished = session.wait();
    tokio::pin!(finished);

    loop {
        tokio::select! {
            result = &mut finished => return result,
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        eprintln!("\nInterrupted, letting files in flight finish...");
                        if orchestrator.cancel().await.is_none() {
                            debug!("Run finished before cancellation");
                        }
                    }
                    Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
                }
            }
            _ = ticker.tick() => {
                if let Some(snapshot) = orchestrator.current_progress().await {
                    display.update(&snapshot);
                }
            }
        }
    }
}

/// Print the final report of a run
fn print_summary(result: &DownloadResult) {
    println!();
    println!("{}", result.summary());
    if result.status == DownloadStatus::Failed {
        return;
    }

    println!(
        "   Downloaded: {} files ({})",
        result.downloaded_files.len(),
        format_bytes(result.progress.completed_bytes)
    );
    println!("   Skipped:    {}", result.skipped_files.len());
    println!("   Failed:     {}", result.failed_files.len());
    if !result.pending_files.is_empty() {
        println!("   Pending:    {}", result.pending_files.len());
    }
    println!(
        "   Duration:   {}",
        crate::app::orchestrator::format_duration(result.duration())
    );
    println!(
        "   Speed:      {}/s, success rate {:.1}%",
        format_bytes(result.average_speed() as u64),
        result.success_rate()
    );

    if result.request.dry_run() && !result.pending_files.is_empty() {
        println!("\nWould download:");
        for path in &result.pending_files {
            println!("   {}", path);
        }
    }

    if !result.failed_files.is_empty() {
        println!("\n⚠️  Failed files:");
        for (path, error) in &result.failed_files {
            println!("   {}: {}", path, error);
        }
    }
}

/// Human readable byte count
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
