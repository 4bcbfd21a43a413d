//! Save orchestration: top-level lifecycle of one `save()` run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::blacklist::Blacklist;
use crate::config::{Config, LogLocation, MissingTagsPolicy};
use crate::error::Error;
use crate::hash::identify_image;
use crate::sniff;
use crate::tags::TagData;
use crate::template::{self, Metadata};
use crate::types::{Event, SaveOutcome, SaveStatus, Size};
use crate::utils::get_unique_path;

use super::fetch::{Fetched, fetch_variant};
use super::persist::write_output;
use super::{ImageDownloader, OutputRequest, notify};

/// Pipeline stage, traced on every transition
#[derive(Clone, Copy, Debug)]
enum Stage {
    Starting,
    CheckingBlacklist,
    LoadingTags,
    Fetching,
    Identifying,
    ResolvingPath,
    Writing,
    Logging,
    Completed,
}

fn enter(dl: &ImageDownloader, stage: Stage) {
    tracing::debug!(image_id = %dl.image.id(), stage = ?stage, "pipeline stage");
}

/// Run the pipeline for every requested output
///
/// Phases:
/// 1. Snapshot settings
/// 2. Blacklist check on the item's own tags
/// 3. Tag load, when something needs data the item lacks
/// 4. Blacklist check on loaded tags
/// 5. Per output: fetch (shared per size), identify, resolve, write, notify
/// 6. Emit completion
///
/// Returns `None` if the run was cancelled; no completion event is emitted then.
pub(super) async fn run_save(dl: &ImageDownloader) -> Option<Vec<SaveOutcome>> {
    let cancel = &dl.cancel;
    if cancel.is_cancelled() {
        return None;
    }

    // Phase 1: settings are read once per run
    let config = dl.ctx.config().await;
    enter(dl, Stage::Starting);
    dl.ctx.emit(Event::Started {
        image_id: dl.image.id().clone(),
        outputs: dl.outputs.len(),
    });

    if dl.outputs.is_empty() {
        return complete(dl, Vec::new());
    }

    let blacklist = dl.blacklist.clone().or_else(|| {
        (!config.blacklist.tags.is_empty())
            .then(|| Arc::new(Blacklist::from_config(&config.blacklist)))
    });
    let blacklist = blacklist.filter(|b| !b.is_empty());
    let mut tags = TagData::from_image(&dl.image);

    // Phase 2: item already carries tags
    if let Some(blacklist) = &blacklist {
        if !tags.tags.is_empty() {
            enter(dl, Stage::CheckingBlacklist);
            if let Some(outcomes) = check_blacklist(dl, &config, blacklist, &tags) {
                return complete(dl, outcomes);
            }
        }
    }

    // Phase 3: lazy tag load
    let blacklist_needs_tags = blacklist.is_some() && tags.tags.is_empty();
    if dl.options.load_tags && (blacklist_needs_tags || needs_page_data(dl, &config)) {
        if let Some(loader) = &dl.ctx.tag_loader {
            enter(dl, Stage::LoadingTags);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = loader.load_tags(&dl.image) => result,
            };
            match result {
                Ok(loaded) => tags.merge(loaded),
                Err(e) => {
                    tracing::warn!(image_id = %dl.image.id(), error = %e, "tag load failed, continuing without tags");
                }
            }
        }
    }

    // Phase 4: blacklist on loaded tags
    if blacklist_needs_tags {
        if let Some(blacklist) = &blacklist {
            enter(dl, Stage::CheckingBlacklist);
            if tags.tags.is_empty() {
                match config.blacklist.missing_tags {
                    MissingTagsPolicy::Allow => {
                        tracing::debug!(image_id = %dl.image.id(), "tags unavailable, blacklist not applied");
                    }
                    MissingTagsPolicy::Block => {
                        tracing::info!(image_id = %dl.image.id(), "tags unavailable, treating as blacklisted");
                        return complete(dl, blacklisted(dl, &config, &tags, Vec::new()));
                    }
                }
            } else if let Some(outcomes) = check_blacklist(dl, &config, blacklist, &tags) {
                return complete(dl, outcomes);
            }
        }
    }

    // Phase 5: outputs
    let mut fetched: HashMap<Size, Fetched> = HashMap::new();
    let mut outcomes = Vec::with_capacity(dl.outputs.len());

    for output in &dl.outputs {
        if !fetched.contains_key(&output.size) {
            enter(dl, Stage::Fetching);
            let result = fetch_variant(
                &dl.ctx,
                &dl.image,
                output.size,
                &config.save,
                dl.options.rotate_extension,
                cancel,
            )
            .await?;
            fetched.insert(output.size, result);
        }

        let outcome = match fetched.get(&output.size) {
            Some(result) => save_output(dl, &config, &tags, output, result).await?,
            None => continue,
        };
        outcomes.push(outcome);
    }

    // Phase 6
    complete(dl, outcomes)
}

fn complete(dl: &ImageDownloader, outcomes: Vec<SaveOutcome>) -> Option<Vec<SaveOutcome>> {
    if dl.cancel.is_cancelled() {
        return None;
    }
    enter(dl, Stage::Completed);
    dl.ctx.emit(Event::Saved {
        image_id: dl.image.id().clone(),
        outcomes: outcomes.clone(),
    });
    Some(outcomes)
}

/// True if any template needs data only a tag load can provide
fn needs_page_data(dl: &ImageDownloader, config: &Config) -> bool {
    let image = &dl.image;
    dl.outputs
        .iter()
        .any(|o| template::needs_page_data(&o.template, image))
        || config.log_files.iter().any(|log| {
            template::needs_page_data(&log.content, image)
                || (log.location == LogLocation::NextToImage
                    && template::needs_page_data(&log.path, image))
        })
        || config
            .commands
            .iter()
            .flat_map(|c| c.args.iter())
            .any(|arg| template::needs_page_data(arg, image))
}

fn check_blacklist(
    dl: &ImageDownloader,
    config: &Config,
    blacklist: &Blacklist,
    tags: &TagData,
) -> Option<Vec<SaveOutcome>> {
    let matched: Vec<String> = blacklist
        .matches(&tags.tags)
        .into_iter()
        .map(String::from)
        .collect();
    if matched.is_empty() {
        return None;
    }
    tracing::info!(image_id = %dl.image.id(), rules = ?matched, "blacklisted, skipping");
    Some(blacklisted(dl, config, tags, matched))
}

/// One Blacklisted outcome per output, with paths resolved from what is known
fn blacklisted(
    dl: &ImageDownloader,
    config: &Config,
    tags: &TagData,
    rules: Vec<String>,
) -> Vec<SaveOutcome> {
    dl.ctx.emit(Event::Blacklisted {
        image_id: dl.image.id().clone(),
        rules,
    });
    let metadata = Metadata::for_image(&dl.image, tags, &config.save, dl.options.count);
    dl.outputs
        .iter()
        .map(|output| SaveOutcome {
            path: template::resolve_path(&output.template, &metadata, &output.destination_root),
            size: output.size,
            status: SaveStatus::Blacklisted,
            url: None,
        })
        .collect()
}

/// Turn one fetch result into the outcome of `output`
///
/// Returns `None` if cancellation interrupted the write.
async fn save_output(
    dl: &ImageDownloader,
    config: &Config,
    tags: &TagData,
    output: &OutputRequest,
    fetched: &Fetched,
) -> Option<SaveOutcome> {
    let image = &dl.image;
    let base = Metadata::for_image(image, tags, &config.save, dl.options.count);

    let (size, url, rotated_ext, response) = match fetched {
        Fetched::Ok {
            size,
            url,
            rotated_ext,
            response,
        } => (*size, url, rotated_ext, response),
        Fetched::NotFound { url } => {
            tracing::info!(image_id = %image.id(), size = %output.size, "not found");
            return Some(SaveOutcome {
                path: template::resolve_path(&output.template, &base, &output.destination_root),
                size: output.size,
                status: SaveStatus::NotFound,
                url: url.clone(),
            });
        }
        Fetched::NetworkError { url } => {
            return Some(SaveOutcome {
                path: template::resolve_path(&output.template, &base, &output.destination_root),
                size: output.size,
                status: SaveStatus::NetworkError,
                url: Some(url.clone()),
            });
        }
    };
    let bytes = &response.bytes;

    enter(dl, Stage::Identifying);
    let md5 = identify_image(image, bytes).to_string();
    let declared = rotated_ext.as_deref().unwrap_or(image.ext());
    let ext = if dl.options.rotate_extension {
        sniff::detect_extension(bytes, declared, response.content_type())
    } else {
        declared.to_string()
    };
    let dimensions = sniff::read_dimensions(bytes);

    enter(dl, Stage::ResolvingPath);
    let metadata = base
        .with_md5(md5)
        .with_ext(ext)
        .with_dimensions(dimensions);
    let resolved = template::resolve_path(&output.template, &metadata, &output.destination_root);

    let outcome = |path: PathBuf, status: SaveStatus| SaveOutcome {
        path,
        size,
        status,
        url: Some(url.clone()),
    };

    let target = match get_unique_path(&resolved, config.save.file_collision) {
        Ok(target) => target,
        Err(Error::FileExists { path }) => {
            tracing::info!(image_id = %image.id(), path = %path.display(), "already exists, skipping");
            return Some(outcome(path, SaveStatus::AlreadyExists));
        }
        Err(e) => {
            tracing::error!(image_id = %image.id(), path = %resolved.display(), error = %e, "cannot pick a file name");
            return Some(outcome(resolved, SaveStatus::Error));
        }
    };

    enter(dl, Stage::Writing);
    match write_output(&target, bytes, &dl.cancel).await {
        Ok(()) => {}
        Err(Error::Cancelled) => return None,
        Err(e) => {
            tracing::error!(image_id = %image.id(), path = %target.display(), error = %e, "failed to write file");
            return Some(outcome(target, SaveStatus::Error));
        }
    }

    if let Some(dimensions) = dimensions {
        image.set_dimensions(dimensions);
    }

    enter(dl, Stage::Logging);
    notify::after_save(&dl.ctx, config, &metadata, &target, &dl.cancel).await;

    tracing::info!(
        image_id = %image.id(),
        size = %size,
        path = %target.display(),
        bytes = bytes.len(),
        "saved"
    );
    Some(outcome(target, SaveStatus::Saved))
}
