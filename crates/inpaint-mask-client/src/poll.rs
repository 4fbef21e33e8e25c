//! Submit, poll and decode: the segmentation request lifecycle.
//!
//! Polling is an explicit bounded loop. Between polls the caller's
//! `is_current` guard is consulted, so a reset or a newer request stops
//! the loop at the next tick instead of leaving it running in the
//! background.

use std::cell::RefCell;
use std::time::Duration;

use inpaint_mask::{AlphaBuffer, ExportSink, MaskId, MaskSession, SegmentationMask};
use serde::{Deserialize, Serialize};

use crate::backend::{SegmentationBackend, Timer};
use crate::error::ClientError;
use crate::wire::{JobStatus, SubmitResponse};

/// Polling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Pause before each status poll, in milliseconds.
    pub interval_ms: u64,
    /// Polls before giving up with [`ClientError::Timeout`].
    pub max_attempts: u32,
    /// Model identifier sent with the submission.
    pub model: String,
}

impl PollConfig {
    /// Two seconds between polls.
    pub const DEFAULT_INTERVAL_MS: u64 = 2_000;
    /// Five minutes at the default interval.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;
    /// Automatic mask generator.
    pub const DEFAULT_MODEL: &'static str = "sam";

    /// The poll interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            model: Self::DEFAULT_MODEL.to_owned(),
        }
    }
}

/// Submit `image_png` and poll until the job reports its mask URLs.
///
/// # Errors
///
/// - [`ClientError::Cancelled`] once `is_current` returns `false`.
/// - [`ClientError::Timeout`] after `config.max_attempts` pending polls.
/// - [`ClientError::JobFailed`] if the service reports failure.
/// - Any transport error from `backend`; there is no retry.
#[allow(clippy::future_not_send)] // backends are usually !Send on WASM
pub async fn wait_for_mask_urls<B, T>(
    backend: &B,
    timer: &T,
    image_png: &[u8],
    config: &PollConfig,
    is_current: impl Fn() -> bool,
) -> Result<Vec<String>, ClientError>
where
    B: SegmentationBackend,
    T: Timer,
{
    let SubmitResponse { job_id } = backend.submit(image_png, &config.model).await?;
    log::debug!(
        "submitted {job_id}: {} bytes, model {}",
        image_png.len(),
        config.model
    );

    for attempt in 1..=config.max_attempts {
        timer.sleep(config.interval()).await;
        if !is_current() {
            log::debug!("{job_id} superseded after {attempt} polls");
            return Err(ClientError::Cancelled);
        }
        match backend.poll(job_id).await? {
            JobStatus::Pending => {}
            JobStatus::Done { mask_urls } => {
                log::debug!("{job_id} done: {} masks", mask_urls.len());
                return Ok(mask_urls);
            }
            JobStatus::Failed { error } => {
                return Err(ClientError::JobFailed(
                    error.unwrap_or_else(|| "no reason given".to_owned()),
                ));
            }
        }
    }

    log::warn!("{job_id} still pending after {} polls", config.max_attempts);
    Err(ClientError::Timeout {
        attempts: config.max_attempts,
    })
}

/// Fetch and decode every URL into a proposal.
///
/// A URL that fails to download or decode is logged and skipped; the
/// rest still load. Identifiers are URL positions, so they stay stable
/// when a mask is skipped.
///
/// # Errors
///
/// Returns [`ClientError::Cancelled`] if `is_current` turns `false`
/// between fetches.
#[allow(clippy::future_not_send)]
pub async fn decode_mask_batch<B: SegmentationBackend>(
    backend: &B,
    urls: &[String],
    is_current: impl Fn() -> bool,
) -> Result<Vec<SegmentationMask>, ClientError> {
    let mut masks = Vec::with_capacity(urls.len());
    for (url, index) in urls.iter().zip(0_u32..) {
        if !is_current() {
            return Err(ClientError::Cancelled);
        }
        let id = MaskId(index);
        match fetch_alpha(backend, url).await {
            Ok(alpha) => {
                log::debug!("decoded {id}: area {}", alpha.area());
                masks.push(SegmentationMask::decoded(id, url.clone(), alpha));
            }
            Err(e) => log::warn!("skipping {id} ({url}): {e}"),
        }
    }
    Ok(masks)
}

#[allow(clippy::future_not_send)]
async fn fetch_alpha<B: SegmentationBackend>(
    backend: &B,
    url: &str,
) -> Result<AlphaBuffer, ClientError> {
    let bytes = backend.fetch(url).await?;
    Ok(AlphaBuffer::decode(&bytes)?)
}

/// Full request: submit, poll, then decode every returned mask.
///
/// # Errors
///
/// See [`wait_for_mask_urls`] and [`decode_mask_batch`].
#[allow(clippy::future_not_send)]
pub async fn request_masks<B, T>(
    backend: &B,
    timer: &T,
    image_png: &[u8],
    config: &PollConfig,
    is_current: impl Fn() -> bool,
) -> Result<Vec<SegmentationMask>, ClientError>
where
    B: SegmentationBackend,
    T: Timer,
{
    let urls = wait_for_mask_urls(backend, timer, image_png, config, &is_current).await?;
    decode_mask_batch(backend, &urls, &is_current).await
}

/// Run a request on behalf of a shared session.
///
/// Starts a new request on `session`, which discards its current
/// proposals and marks it busy. On success the decoded masks are handed
/// to the session and their count returned. Any failure ends the busy
/// state with no masks. Results of a request that was superseded while
/// in flight are dropped by the session.
///
/// The session is only borrowed briefly at each step, never across an
/// `await`.
///
/// # Errors
///
/// Returns the [`ClientError`] that ended the request.
#[allow(clippy::future_not_send)]
pub async fn segment_session<S, B, T>(
    session: &RefCell<MaskSession<S>>,
    backend: &B,
    timer: &T,
    image_png: &[u8],
    config: &PollConfig,
) -> Result<usize, ClientError>
where
    S: ExportSink,
    B: SegmentationBackend,
    T: Timer,
{
    let token = session.borrow_mut().begin_segmentation();
    let result = request_masks(backend, timer, image_png, config, || {
        session.borrow().is_current(token)
    })
    .await;

    let mut session = session.borrow_mut();
    match result {
        Ok(masks) => {
            let count = masks.len();
            if session.accept_masks(token, masks) {
                Ok(count)
            } else {
                Err(ClientError::Cancelled)
            }
        }
        Err(e) => {
            log::warn!("segmentation request {} failed: {e}", token.generation());
            session.finish_segmentation(token);
            Err(e)
        }
    }
}
