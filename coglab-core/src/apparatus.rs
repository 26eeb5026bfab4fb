use serde::{Deserialize, Serialize};

/// Physical display setup of the testing station.
///
/// Every field stays `None` until the researcher fills it in or a
/// calibration writes it; conversions are only meaningful once
/// [`ApparatusConfig::is_complete`] holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApparatusConfig {
    #[serde(rename = "width", default)]
    pub width_cm: Option<f64>,
    #[serde(rename = "height", default)]
    pub height_cm: Option<f64>,
    #[serde(rename = "resX", default)]
    pub resolution_x_px: Option<u32>,
    #[serde(rename = "resY", default)]
    pub resolution_y_px: Option<u32>,
    #[serde(rename = "dist", default)]
    pub viewing_distance_cm: Option<f64>,
}

impl ApparatusConfig {
    pub fn new(
        width_cm: f64,
        height_cm: f64,
        resolution_x_px: u32,
        resolution_y_px: u32,
        viewing_distance_cm: f64,
    ) -> Self {
        Self {
            width_cm: Some(width_cm),
            height_cm: Some(height_cm),
            resolution_x_px: Some(resolution_x_px),
            resolution_y_px: Some(resolution_y_px),
            viewing_distance_cm: Some(viewing_distance_cm),
        }
    }

    /// All five fields present, finite and strictly positive.
    pub fn is_complete(&self) -> bool {
        let positive = |v: Option<f64>| v.is_some_and(|v| v.is_finite() && v > 0.0);
        positive(self.width_cm)
            && positive(self.height_cm)
            && positive(self.viewing_distance_cm)
            && self.resolution_x_px.is_some_and(|px| px > 0)
            && self.resolution_y_px.is_some_and(|px| px > 0)
    }
}
