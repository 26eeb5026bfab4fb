use coglab_core::ApparatusConfig;

pub const INCOMPLETE_APPARATUS: &str =
    "Please fill in all apparatus fields to compute visual angle conversions.";

/// Degrees of visual angle subtended by one centimetre and by one pixel on
/// each axis, at the configured viewing distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualAngle {
    pub deg_per_cm: f64,
    pub deg_per_px_x: f64,
    pub deg_per_px_y: f64,
}

impl VisualAngle {
    pub fn compute(
        width_cm: f64,
        height_cm: f64,
        distance_cm: f64,
        resolution_x_px: u32,
        resolution_y_px: u32,
    ) -> Self {
        let deg_per_cm = (2.0 * (1.0 / (2.0 * distance_cm)).atan()).to_degrees();
        let px_per_cm_x = f64::from(resolution_x_px) / width_cm;
        let px_per_cm_y = f64::from(resolution_y_px) / height_cm;
        Self {
            deg_per_cm,
            deg_per_px_x: deg_per_cm / px_per_cm_x,
            deg_per_px_y: deg_per_cm / px_per_cm_y,
        }
    }

    /// `None` unless every apparatus field is filled in.
    pub fn from_apparatus(apparatus: &ApparatusConfig) -> Option<Self> {
        if !apparatus.is_complete() {
            return None;
        }
        Some(Self::compute(
            apparatus.width_cm?,
            apparatus.height_cm?,
            apparatus.viewing_distance_cm?,
            apparatus.resolution_x_px?,
            apparatus.resolution_y_px?,
        ))
    }

    /// Saved values and conversions, or the fill-in prompt.
    pub fn describe(apparatus: &ApparatusConfig) -> String {
        let Some(angle) = Self::from_apparatus(apparatus) else {
            return INCOMPLETE_APPARATUS.to_string();
        };
        let (Some(w), Some(h), Some(d), Some(rx), Some(ry)) = (
            apparatus.width_cm,
            apparatus.height_cm,
            apparatus.viewing_distance_cm,
            apparatus.resolution_x_px,
            apparatus.resolution_y_px,
        ) else {
            return INCOMPLETE_APPARATUS.to_string();
        };
        format!(
            "Saved Values:\n\
             Monitor: {w} cm × {h} cm\n\
             Resolution: {rx} px × {ry} px\n\
             Viewing Distance: {d} cm\n\
             \n\
             Conversion:\n\
             1 cm = {:.4}°\n\
             1 px (X) = {:.4}°\n\
             1 px (Y) = {:.4}°",
            angle.deg_per_cm, angle.deg_per_px_x, angle.deg_per_px_y
        )
    }
}
