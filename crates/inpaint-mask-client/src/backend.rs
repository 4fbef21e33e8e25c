//! Transport and timer seams.
//!
//! The client never performs HTTP itself. Hosts implement
//! [`SegmentationBackend`] over whatever transport they have (browser
//! `fetch`, a native HTTP client, an in-memory fake in tests) and
//! supply a [`Timer`] for the pause between status polls.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;
use crate::wire::{JobId, JobStatus, SubmitResponse};

/// The three calls the segmentation service exposes.
pub trait SegmentationBackend {
    /// Upload the base image (PNG bytes) with a model identifier and
    /// start a job.
    fn submit(
        &self,
        image_png: &[u8],
        model: &str,
    ) -> impl Future<Output = Result<SubmitResponse, ClientError>>;

    /// Ask for the status of `job`.
    fn poll(&self, job: JobId) -> impl Future<Output = Result<JobStatus, ClientError>>;

    /// Download one proposal image.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ClientError>>;
}

/// Something that can wait.
pub trait Timer {
    /// Resolve after `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Browser timer backed by `setTimeout`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTimer;

#[cfg(target_arch = "wasm32")]
impl Timer for GlooTimer {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::future::TimeoutFuture::new(millis)
    }
}

/// Timer that returns immediately. For tests and for hosts that pace
/// polling themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Timer for NoDelay {
    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> {
        std::future::ready(())
    }
}
