//! Post-save side channels: log appends and commands.
//!
//! Both are best-effort. A failure is logged and reported as an event but never
//! changes the outcome of the output that triggered it.

use crate::config::{CommandConfig, Config, LogFileConfig, LogLocation};
use crate::template::{self, Metadata};
use crate::types::Event;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::DownloaderContext;

/// Run every configured log append, then every command, for a saved file
pub(super) async fn after_save(
    ctx: &DownloaderContext,
    config: &Config,
    metadata: &Metadata,
    saved: &Path,
    cancel: &CancellationToken,
) {
    for log in &config.log_files {
        if cancel.is_cancelled() {
            return;
        }
        append_log(ctx, log, metadata, saved).await;
    }

    for command in &config.commands {
        if cancel.is_cancelled() {
            return;
        }
        run_command(ctx, command, metadata, saved, cancel).await;
    }
}

/// Destination file of a log entry for a file saved at `saved`
pub(super) fn log_destination(log: &LogFileConfig, metadata: &Metadata, saved: &Path) -> PathBuf {
    match log.location {
        LogLocation::UniqueFile => PathBuf::from(&log.path),
        LogLocation::NextToImage => {
            let dir = saved.parent().unwrap_or_else(|| Path::new(""));
            template::resolve_path(&log.path, metadata, dir)
        }
    }
}

async fn append_log(ctx: &DownloaderContext, log: &LogFileConfig, metadata: &Metadata, saved: &Path) {
    let path = log_destination(log, metadata, saved);
    let content = template::render(&log.content, metadata);

    match ctx.log_sink.append(&path, &content).await {
        Ok(()) => tracing::debug!(path = %path.display(), "log entry appended"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to append log entry");
            ctx.emit(Event::LogAppendFailed {
                path,
                error: e.to_string(),
            });
        }
    }
}

/// Environment passed to post-save commands
pub(super) fn command_env(metadata: &Metadata, saved: &Path) -> HashMap<String, String> {
    let mut env_vars = HashMap::new();
    env_vars.insert("IMAGE_DL_ID".to_string(), metadata.id.clone());
    env_vars.insert("IMAGE_DL_EXT".to_string(), metadata.ext.clone());
    env_vars.insert("IMAGE_DL_PATH".to_string(), saved.display().to_string());
    env_vars.insert(
        "IMAGE_DL_TAGS".to_string(),
        metadata.tags.join(&metadata.separator),
    );
    if let Some(md5) = &metadata.md5 {
        env_vars.insert("IMAGE_DL_MD5".to_string(), md5.clone());
    }
    if let Some(rating) = &metadata.rating {
        env_vars.insert("IMAGE_DL_RATING".to_string(), rating.clone());
    }
    if !metadata.website.is_empty() {
        env_vars.insert("IMAGE_DL_WEBSITE".to_string(), metadata.website.clone());
    }
    env_vars
}

async fn run_command(
    ctx: &DownloaderContext,
    command: &CommandConfig,
    metadata: &Metadata,
    saved: &Path,
    cancel: &CancellationToken,
) {
    let args: Vec<String> = command
        .args
        .iter()
        .map(|arg| template::render(arg, metadata))
        .collect();

    let mut process = tokio::process::Command::new(&command.program);
    process
        .args(&args)
        .envs(command_env(metadata, saved))
        .kill_on_drop(true);

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = tokio::time::timeout(command.timeout, process.output()) => result,
    };

    let program = command.program.clone();
    match result {
        Ok(Ok(output)) => {
            if output.status.success() {
                tracing::debug!(program = ?program, "command executed successfully");
            } else {
                let exit_code = output.status.code();
                tracing::warn!(program = ?program, code = ?exit_code, "post-save command failed");
                ctx.emit(Event::CommandFailed { program, exit_code });
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(program = ?program, error = %e, "failed to run command");
            ctx.emit(Event::CommandFailed {
                program,
                exit_code: None,
            });
        }
        Err(_) => {
            tracing::warn!(program = ?program, timeout = ?command.timeout, "command timed out");
            ctx.emit(Event::CommandFailed {
                program,
                exit_code: None,
            });
        }
    }
}
