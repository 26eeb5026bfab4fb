//! Screen-size estimation from an on-screen credit card the participant
//! resizes until it matches a real card held against the monitor.

use crate::storage::{KeyValueStore, StorageError};
use coglab_core::ApparatusConfig;
use log::{debug, info};
use std::fmt;

/// Card image size on first render, in pixels.
pub const INITIAL_CARD_WIDTH_PX: f64 = 300.0;
pub const INITIAL_CARD_HEIGHT_PX: f64 = 189.0;
/// Physical size that first render measured with a ruler.
pub const INITIAL_CARD_WIDTH_CM: f64 = 6.7;
pub const INITIAL_CARD_HEIGHT_CM: f64 = 4.3;
/// ISO/IEC 7810 ID-1 card.
pub const IDEAL_CARD_WIDTH_CM: f64 = 8.56;
pub const IDEAL_CARD_HEIGHT_CM: f64 = 5.398;

/// Growth per arrow-key press.
pub const NUDGE_FACTOR: f64 = 1.01;

pub const LAST_CARD_WIDTH_KEY: &str = "lastCardWidth";
pub const LAST_CARD_HEIGHT_KEY: &str = "lastCardHeight";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nudge {
    Wider,
    Narrower,
    Taller,
    Shorter,
}

impl Nudge {
    /// Arrow key names as delivered by the input surface.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "arrowright" => Some(Nudge::Wider),
            "arrowleft" => Some(Nudge::Narrower),
            "arrowup" => Some(Nudge::Taller),
            "arrowdown" => Some(Nudge::Shorter),
            _ => None,
        }
    }
}

/// Result of a calibration pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationEstimate {
    pub card_width_px: f64,
    pub card_height_px: f64,
    pub px_per_cm_x: f64,
    pub px_per_cm_y: f64,
    pub monitor_width_cm: f64,
    pub monitor_height_cm: f64,
}

impl CalibrationEstimate {
    /// Writes the monitor size into the apparatus; an axis estimated
    /// without a resolution is left as it was.
    pub fn apply_to(&self, apparatus: &mut ApparatusConfig) {
        if self.monitor_width_cm.is_finite() {
            apparatus.width_cm = Some(self.monitor_width_cm);
        }
        if self.monitor_height_cm.is_finite() {
            apparatus.height_cm = Some(self.monitor_height_cm);
        }
    }
}

impl fmt::Display for CalibrationEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Knowledge-Free Estimate")?;
        writeln!(
            f,
            "Ideal card size (cm): {} × {}",
            IDEAL_CARD_WIDTH_CM, IDEAL_CARD_HEIGHT_CM
        )?;
        writeln!(
            f,
            "Card on-screen (px): {}px × {}px",
            self.card_width_px.round(),
            self.card_height_px.round()
        )?;
        writeln!(
            f,
            "Estimated px/cm: {:.2} × {:.2}",
            self.px_per_cm_x, self.px_per_cm_y
        )?;
        write!(
            f,
            "Estimated monitor size: {:.1}cm × {:.1}cm",
            self.monitor_width_cm, self.monitor_height_cm
        )
    }
}

fn round_to_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Current on-screen card size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardSizer {
    pub width_px: f64,
    pub height_px: f64,
}

impl Default for CardSizer {
    fn default() -> Self {
        Self {
            width_px: INITIAL_CARD_WIDTH_PX,
            height_px: INITIAL_CARD_HEIGHT_PX,
        }
    }
}

impl CardSizer {
    pub fn new(width_px: f64, height_px: f64) -> Self {
        Self {
            width_px,
            height_px,
        }
    }

    /// Picks up the size left by the previous calibration in this session,
    /// or the measured default if there is none.
    pub fn resume<S: KeyValueStore>(store: &S) -> Result<Self, StorageError> {
        let read = |key: &str| -> Result<Option<f64>, StorageError> {
            Ok(store
                .get(key)?
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0))
        };
        Ok(match (read(LAST_CARD_WIDTH_KEY)?, read(LAST_CARD_HEIGHT_KEY)?) {
            (Some(w), Some(h)) => {
                debug!("resuming calibration at {w:.1}×{h:.1} px");
                Self::new(w, h)
            }
            _ => Self::default(),
        })
    }

    pub fn nudge(&mut self, nudge: Nudge) {
        match nudge {
            Nudge::Wider => self.width_px *= NUDGE_FACTOR,
            Nudge::Narrower => self.width_px /= NUDGE_FACTOR,
            Nudge::Taller => self.height_px *= NUDGE_FACTOR,
            Nudge::Shorter => self.height_px /= NUDGE_FACTOR,
        }
    }

    /// Treats the card as rendered at its measured first-render size, so
    /// px/cm is the current pixel size over 6.7 × 4.3 cm. A missing
    /// resolution gives NaN rather than an error.
    pub fn estimate(&self, resolution_x_px: Option<u32>, resolution_y_px: Option<u32>) -> CalibrationEstimate {
        let px_per_cm_x = self.width_px / INITIAL_CARD_WIDTH_CM;
        let px_per_cm_y = self.height_px / INITIAL_CARD_HEIGHT_CM;
        let res_x = resolution_x_px.map_or(f64::NAN, f64::from);
        let res_y = resolution_y_px.map_or(f64::NAN, f64::from);
        CalibrationEstimate {
            card_width_px: self.width_px,
            card_height_px: self.height_px,
            px_per_cm_x,
            px_per_cm_y,
            monitor_width_cm: round_to_tenth(res_x / px_per_cm_x),
            monitor_height_cm: round_to_tenth(res_y / px_per_cm_y),
        }
    }

    /// Final estimate; the card size is kept for the next calibration.
    pub fn finish<S: KeyValueStore>(
        &self,
        store: &mut S,
        resolution_x_px: Option<u32>,
        resolution_y_px: Option<u32>,
    ) -> Result<CalibrationEstimate, StorageError> {
        let estimate = self.estimate(resolution_x_px, resolution_y_px);
        store.set(LAST_CARD_WIDTH_KEY, &self.width_px.to_string())?;
        store.set(LAST_CARD_HEIGHT_KEY, &self.height_px.to_string())?;
        info!(
            "calibration finished: monitor {:.1} × {:.1} cm",
            estimate.monitor_width_cm, estimate.monitor_height_cm
        );
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn default_card_estimate() {
        let est = CardSizer::default().estimate(Some(1920), Some(1080));
        // 300 / 6.7 = 44.776 px/cm, 1920 / 44.776 = 42.88
        assert_eq!(est.monitor_width_cm, 42.9);
        // 189 / 4.3 = 43.953 px/cm, 1080 / 43.953 = 24.57
        assert_eq!(est.monitor_height_cm, 24.6);
    }

    #[test]
    fn doubling_card_pixels_halves_monitor_size() {
        let small = CardSizer::new(200.0, 100.0).estimate(Some(2000), Some(1000));
        let large = CardSizer::new(400.0, 200.0).estimate(Some(2000), Some(1000));
        assert!((small.monitor_width_cm - 2.0 * large.monitor_width_cm).abs() < 0.11);
        assert!((small.monitor_height_cm - 2.0 * large.monitor_height_cm).abs() < 0.11);
    }

    #[test]
    fn missing_resolution_propagates_nan() {
        let est = CardSizer::default().estimate(None, Some(1080));
        assert!(est.monitor_width_cm.is_nan());
        assert!(!est.monitor_height_cm.is_nan());

        let mut apparatus = ApparatusConfig::default();
        est.apply_to(&mut apparatus);
        assert_eq!(apparatus.width_cm, None);
        assert_eq!(apparatus.height_cm, Some(24.6));
    }

    #[test]
    fn nudges_scale_one_axis() {
        let mut card = CardSizer::default();
        card.nudge(Nudge::Wider);
        card.nudge(Nudge::Shorter);
        assert!((card.width_px - 303.0).abs() < 1e-9);
        assert!((card.height_px - 189.0 / 1.01).abs() < 1e-9);
        assert_eq!(Nudge::from_key("ArrowUp"), Some(Nudge::Taller));
        assert_eq!(Nudge::from_key("a"), None);
    }

    #[test]
    fn finish_persists_and_resume_restores() {
        let mut store = MemoryStore::new();
        assert_eq!(CardSizer::resume(&store).unwrap(), CardSizer::default());

        let card = CardSizer::new(412.5, 260.25);
        let mut apparatus = ApparatusConfig::default();
        card.finish(&mut store, Some(2560), Some(1440))
            .unwrap()
            .apply_to(&mut apparatus);
        assert!(apparatus.width_cm.is_some());

        assert_eq!(CardSizer::resume(&store).unwrap(), card);
    }

    #[test]
    fn unreadable_saved_size_falls_back() {
        let mut store = MemoryStore::new();
        store.set(LAST_CARD_WIDTH_KEY, "wide").unwrap();
        store.set(LAST_CARD_HEIGHT_KEY, "200").unwrap();
        assert_eq!(CardSizer::resume(&store).unwrap(), CardSizer::default());
    }

    #[test]
    fn summary_text() {
        let text = CardSizer::default().estimate(Some(1920), Some(1080)).to_string();
        assert!(text.contains("Card on-screen (px): 300px × 189px"));
        assert!(text.contains("Estimated monitor size: 42.9cm × 24.6cm"));
    }
}
