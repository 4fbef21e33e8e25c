//! inpaint-mask-client: Segmentation service client for `inpaint-mask`.
//!
//! Submits the base image to an automatic segmentation service, polls
//! the job on a bounded schedule and decodes the returned proposals
//! into [`inpaint_mask::SegmentationMask`]s.
//!
//! Transport and timing are abstracted behind [`SegmentationBackend`]
//! and [`Timer`], so the same logic runs in the browser and under a
//! blocking executor in tests.

pub mod backend;
pub mod error;
pub mod poll;
pub mod wire;

#[cfg(target_arch = "wasm32")]
pub use backend::GlooTimer;
pub use backend::{NoDelay, SegmentationBackend, Timer};
pub use error::ClientError;
pub use poll::{
    PollConfig, decode_mask_batch, request_masks, segment_session, wait_for_mask_urls,
};
pub use wire::{JobId, JobStatus, SamMaskRecord, SubmitResponse};
