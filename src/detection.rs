//! The detection side of the gateway. A `DetectionService` receives a decoded
//! image and reports what it found; the gateway never knows which one it is
//! talking to

use crate::intake::DecodedImage;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Vehicle details reported by a detector. The set of fields is up to the
/// detector; the gateway only relays them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleInfo(BTreeMap<String, String>);

impl VehicleInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VehicleInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The outcome of running detection on one image
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Success { vehicle_info: VehicleInfo },
    Failure { reason: String },
}

/// Something that can look at an image and find a vehicle in it. Called from
/// many requests at once, on the blocking pool
pub trait DetectionService: Send + Sync {
    fn detect(&self, image: &DecodedImage) -> DetectionResult;

    /// Name used in logs
    fn name(&self) -> &str {
        "detector"
    }
}

static PLACEHOLDER_VEHICLE: Lazy<VehicleInfo> = Lazy::new(|| {
    VehicleInfo::from_iter([
        ("licensePlateNumber", "XYZ7890"),
        ("ownerName", "ALEXANDER SMITH"),
        ("registrationDate", "2022-03-20"),
        ("lastService", "2024-01-15"),
        ("vehicleAge", "02 YEARS"),
        ("fuelType", "ELECTRIC"),
        ("registrationLocation", "TEXAS, USA"),
    ])
});

/// Stand-in until a real plate detector is wired up: reports the same
/// vehicle for every image
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderDetector;

impl DetectionService for PlaceholderDetector {
    fn detect(&self, image: &DecodedImage) -> DetectionResult {
        info!(
            "placeholder detector got {}x{} {:?} image",
            image.width, image.height, image.channel_order
        );
        DetectionResult::Success {
            vehicle_info: PLACEHOLDER_VEHICLE.clone(),
        }
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}
