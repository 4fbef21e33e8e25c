//! JSON shapes exchanged with the segmentation service.

use std::fmt;

use inpaint_mask::{AlphaBuffer, MaskError, MaskId, SegmentationMask};
use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a segmentation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {}", self.0)
    }
}

/// Body returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Job to poll.
    pub job_id: JobId,
}

/// Body returned by the status endpoint.
///
/// ```json
/// {"status": "pending"}
/// {"status": "done", "mask_urls": ["/media/masks/1_0.png"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    /// Still running (the service may also report `processing`).
    #[serde(alias = "processing", alias = "created")]
    Pending,
    /// Finished; one URL per proposal, in the order the model ranked them.
    Done {
        /// Proposal image URLs.
        mask_urls: Vec<String>,
    },
    /// The job errored on the server.
    Failed {
        /// Server-provided reason, if any.
        #[serde(default)]
        error: Option<String>,
    },
}

/// One record of an automatic mask generator's output.
///
/// Only `segmentation` is needed to build a proposal; the scores are
/// kept for hosts that want to rank or filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamMaskRecord {
    /// Row-major 0/1 grid at the model's input resolution.
    pub segmentation: Vec<Vec<u8>>,
    /// Pixel count reported by the model.
    #[serde(default)]
    pub area: u64,
    /// `[x, y, width, height]`.
    #[serde(default)]
    pub bbox: [f64; 4],
    #[serde(default)]
    pub predicted_iou: f64,
    #[serde(default)]
    pub stability_score: f64,
}

impl SamMaskRecord {
    /// Convert into a decoded proposal with identifier `id`.
    ///
    /// The area is recounted from the grid rather than trusting the
    /// reported value.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] for an empty grid and
    /// [`MaskError::AlphaLength`] for a ragged one.
    pub fn into_mask(self, id: MaskId) -> Result<SegmentationMask, MaskError> {
        let alpha = AlphaBuffer::from_grid(&self.segmentation)?;
        if self.area != 0 && self.area != alpha.area() {
            log::debug!(
                "{id}: reported area {} differs from counted {}",
                self.area,
                alpha.area()
            );
        }
        Ok(SegmentationMask::decoded(id, format!("sam:{}", id.0), alpha))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_pending_and_processing_parse() {
        let pending: JobStatus = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(pending, JobStatus::Pending);
        let processing: JobStatus = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(processing, JobStatus::Pending);
    }

    #[test]
    fn status_done_carries_urls() {
        let done: JobStatus =
            serde_json::from_str(r#"{"status":"done","mask_urls":["/a.png","/b.png"]}"#).unwrap();
        assert_eq!(
            done,
            JobStatus::Done {
                mask_urls: vec!["/a.png".into(), "/b.png".into()]
            }
        );
    }

    #[test]
    fn status_failed_without_reason() {
        let failed: JobStatus = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert_eq!(failed, JobStatus::Failed { error: None });
    }

    #[test]
    fn submit_response_uses_numeric_job_id() {
        let resp: SubmitResponse =
            serde_json::from_str(r#"{"job_id": 42, "status": "pending"}"#).unwrap();
        assert_eq!(resp.job_id, JobId(42));
        assert_eq!(resp.job_id.to_string(), "job 42");
    }

    #[test]
    fn sam_record_becomes_decoded_mask() {
        let json = r#"{
            "segmentation": [[0, 1, 1], [0, 1, 0]],
            "area": 3,
            "bbox": [1, 0, 2, 2],
            "predicted_iou": 0.97,
            "stability_score": 0.95
        }"#;
        let record: SamMaskRecord = serde_json::from_str(json).unwrap();
        let mask = record.into_mask(MaskId(4)).unwrap();
        assert_eq!(mask.id(), MaskId(4));
        assert_eq!(mask.area(), Some(3));
        let alpha = mask.alpha().unwrap();
        assert_eq!(alpha.alpha_at(1, 0), 255);
        assert_eq!(alpha.alpha_at(0, 1), 0);
    }

    #[test]
    fn ragged_sam_record_is_rejected() {
        let record = SamMaskRecord {
            segmentation: vec![vec![1, 1], vec![1]],
            area: 0,
            bbox: [0.0; 4],
            predicted_iou: 0.0,
            stability_score: 0.0,
        };
        assert!(matches!(
            record.into_mask(MaskId(0)),
            Err(MaskError::AlphaLength { .. })
        ));
    }
}
