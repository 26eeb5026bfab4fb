pub mod apparatus;
pub mod design;
pub mod document;
pub mod error;
pub mod keys;
pub mod presentation;
pub mod step;
pub mod stimulus;

pub use apparatus::ApparatusConfig;
pub use design::{BreakGate, DesignParameters};
pub use document::{ExperimentDocument, RenameImpact};
pub use error::EditError;
pub use keys::{KeySet, key_label, normalize_key};
pub use presentation::{MediaKind, PresentationSurface, ResolvedStimulus, Visual};
pub use step::{Coordinate, DisplayStep, Position, Positions, StepWait, StimulusPlacement};
pub use stimulus::{PolygonSpec, Shape, StimulusContent, StimulusDefinition, TextContent};
