//! The gateway takes an image request from the web server, decodes it and
//! forwards the pixels to the detection service. It holds no per-request
//! state, so one instance is shared by every HTTP worker

use crate::config::Settings;
use crate::detection::{DetectionResult, DetectionService};
use crate::intake::{self, DecodeError, EncodedImageRequest, IntakeLimits};
use crate::server::protocol::{ApiResponse, ProcessImageRequest};
use actix_web::http::StatusCode;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task;
use tracing::*;

pub const DETECTED_MESSAGE: &str = "License plate detected and vehicle info retrieved.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no image data provided")]
    MissingInput,

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingInput | GatewayError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::Decode(DecodeError::PayloadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            GatewayError::Decode(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message sent back to the client
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::MissingInput => "No image data provided.".into(),
            GatewayError::MalformedBody(_) => "Invalid JSON body.".into(),
            GatewayError::Decode(DecodeError::PayloadTooLarge { .. }) => {
                "Image payload too large.".into()
            }
            GatewayError::Decode(_) => "Could not decode image.".into(),
            GatewayError::Internal(err) => format!("Server error: {err}"),
        }
    }
}

pub struct Gateway {
    detector: Arc<dyn DetectionService>,
    limits: IntakeLimits,
    detection_timeout: Duration,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("detector", &self.detector.name())
            .field("limits", &self.limits)
            .field("detection_timeout", &self.detection_timeout)
            .finish()
    }
}

impl Gateway {
    pub fn new(
        detector: Arc<dyn DetectionService>,
        limits: IntakeLimits,
        detection_timeout: Duration,
    ) -> Self {
        Gateway {
            detector,
            limits,
            detection_timeout,
        }
    }

    pub fn from_settings(settings: &Settings, detector: Arc<dyn DetectionService>) -> Self {
        Self::new(
            detector,
            settings.intake_limits(),
            settings.detection_timeout(),
        )
    }

    /// Decode the posted image, run detection on it and shape the answer.
    /// A detector that reports failure still produces an `ApiResponse`; only
    /// intake and internal faults are errors
    #[tracing::instrument(skip_all)]
    pub async fn handle_process_request(
        &self,
        req: ProcessImageRequest,
    ) -> Result<ApiResponse, GatewayError> {
        let field = req
            .image
            .filter(|image| !image.is_empty())
            .ok_or(GatewayError::MissingInput)?;

        // Decoding is CPU bound, keep it off the event loop
        let limits = self.limits;
        let image = task::spawn_blocking(move || {
            let raw = EncodedImageRequest::parse(field)?;
            intake::decode_request(&raw, &limits)
        })
        .await
        .map_err(|e| anyhow!("image decoding task failed: {e}"))??;

        debug!("decoded {image:?}");

        let detector = self.detector.clone();
        let detection = task::spawn_blocking(move || detector.detect(&image));
        let result = tokio::time::timeout(self.detection_timeout, detection)
            .await
            .map_err(|_| {
                anyhow!(
                    "detection timed out after {} ms",
                    self.detection_timeout.as_millis()
                )
            })?
            .map_err(|e| anyhow!("detection task failed: {e}"))?;

        match result {
            DetectionResult::Success { vehicle_info } => {
                info!("{} detected a vehicle", self.detector.name());
                Ok(ApiResponse::success(DETECTED_MESSAGE, vehicle_info))
            }
            DetectionResult::Failure { reason } => {
                info!("{} found nothing: {reason}", self.detector.name());
                Ok(ApiResponse::error(reason))
            }
        }
    }
}
