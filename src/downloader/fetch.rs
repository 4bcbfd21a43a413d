//! Variant fetch loop: size fallback and extension rotation around the transport.

use crate::config::SaveConfig;
use crate::error::IsRetryable;
use crate::fallback::{FallbackState, SizeFallback};
use crate::transport::{FetchResponse, FetchStatus};
use crate::types::{Event, Image, Size};
use tokio_util::sync::CancellationToken;

use super::DownloaderContext;

/// Result of fetching one requested size
#[derive(Debug)]
pub(super) enum Fetched {
    /// Bytes are available
    Ok {
        /// Variant that actually succeeded
        size: Size,
        /// URL that served the bytes
        url: String,
        /// Extension of the URL when rotation changed it
        rotated_ext: Option<String>,
        response: FetchResponse,
    },
    /// Every attempted variant was absent
    NotFound {
        /// Last URL attempted (None if no variant had a URL)
        url: Option<String>,
    },
    /// Server or transport failure; no fallback was attempted after it
    NetworkError {
        url: String,
    },
}

/// Fetch `requested`, walking the configured fallback chain on not-found
///
/// Returns `None` if cancelled. The in-flight request future is dropped on
/// cancellation, which aborts it.
pub(super) async fn fetch_variant(
    ctx: &DownloaderContext,
    image: &Image,
    requested: Size,
    save: &SaveConfig,
    rotate_extension: bool,
    cancel: &CancellationToken,
) -> Option<Fetched> {
    let mut walk = SizeFallback::with_enabled(
        requested,
        save.fallback_chain(requested),
        save.sample_fallback,
    );
    let mut last_url = None;

    while let Some(size) = walk.current() {
        match image.url(size) {
            None => {
                tracing::debug!(image_id = %image.id(), size = %size, "no url for variant");
            }
            Some(url) => {
                let mut candidates = vec![(url.to_string(), None)];
                if rotate_extension {
                    candidates.extend(
                        rotated_urls(url, &save.extension_rotation)
                            .into_iter()
                            .map(|(u, ext)| (u, Some(ext))),
                    );
                }

                for (candidate, rotated_ext) in candidates {
                    last_url = Some(candidate.clone());
                    tracing::debug!(image_id = %image.id(), size = %size, url = %candidate, "fetching");

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        result = ctx.transport.fetch(&candidate) => result,
                    };

                    match result {
                        Ok(response) => match response.status {
                            FetchStatus::Ok => {
                                return Some(Fetched::Ok {
                                    size,
                                    url: candidate,
                                    rotated_ext,
                                    response,
                                });
                            }
                            FetchStatus::NotFound => {
                                tracing::debug!(url = %candidate, "not found");
                            }
                            FetchStatus::Failed(code) => {
                                tracing::warn!(
                                    image_id = %image.id(),
                                    url = %candidate,
                                    status = code,
                                    "server error, not falling back"
                                );
                                walk.on_failure();
                                return Some(Fetched::NetworkError { url: candidate });
                            }
                        },
                        Err(e) => {
                            tracing::warn!(
                                image_id = %image.id(),
                                url = %candidate,
                                error = %e,
                                retryable = e.is_retryable(),
                                "fetch failed"
                            );
                            walk.on_failure();
                            return Some(Fetched::NetworkError { url: candidate });
                        }
                    }
                }
            }
        }

        if let FallbackState::Fallback(next) = walk.on_not_found() {
            tracing::info!(image_id = %image.id(), from = %size, to = %next, "variant not found, falling back");
            ctx.emit(Event::FallbackAttempt {
                image_id: image.id().clone(),
                from: size,
                to: next,
            });
        }
    }

    Some(Fetched::NotFound { url: last_url })
}

/// `url` with its extension swapped for each entry of `rotation`
///
/// Starts after the current extension and wraps around; the current
/// extension itself is skipped. URLs without an extension are not rotated.
pub(super) fn rotated_urls(url: &str, rotation: &[String]) -> Vec<(String, String)> {
    let Ok(parsed) = url::Url::parse(url) else {
        return Vec::new();
    };
    let path = parsed.path().to_string();
    let last_slash = path.rfind('/').unwrap_or(0);
    let Some(dot) = path.rfind('.').filter(|&dot| dot > last_slash) else {
        return Vec::new();
    };
    let current = &path[dot + 1..];

    let start = rotation
        .iter()
        .position(|ext| ext.eq_ignore_ascii_case(current))
        .map_or(0, |p| p + 1);

    rotation
        .iter()
        .cycle()
        .skip(start)
        .take(rotation.len())
        .filter(|ext| !ext.eq_ignore_ascii_case(current))
        .map(|ext| {
            let mut rotated = parsed.clone();
            rotated.set_path(&format!("{}{}", &path[..=dot], ext));
            (rotated.to_string(), ext.clone())
        })
        .collect()
}
