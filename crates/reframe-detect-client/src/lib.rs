//! Client for the HTTP subject detection service.
//!
//! Frames are JPEG-encoded and posted to the service, which answers with
//! normalized bounding boxes. The client implements
//! [`reframe_media::SubjectDetector`] so the crop planner can use it
//! directly.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DetectionClient, DetectionClientConfig};
pub use error::{DetectClientError, DetectClientResult};
pub use types::{DetectRequest, DetectResponse, HealthResponse};
