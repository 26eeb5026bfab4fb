use coglab_core::{
    MediaKind, Position, ResolvedStimulus, StimulusContent, StimulusDefinition, StimulusPlacement,
    Visual,
};
use log::warn;
use rand::Rng;
use serde::Serialize;

/// A keypress that ended a response step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    pub block: u32,
    pub trial: u32,
    pub step: String,
    pub key: String,
    /// From the step being presented to the accepted keypress.
    pub reaction_ms: f64,
}

fn pick<'a, T, R: Rng>(rng: &mut R, options: &'a [T]) -> Option<&'a T> {
    match options.len() {
        0 => None,
        1 => options.first(),
        n => options.get(rng.random_range(0..n)),
    }
}

/// Makes this presentation's random choices for one placement.
pub fn resolve<R: Rng>(
    rng: &mut R,
    placement: &StimulusPlacement,
    definition: &StimulusDefinition,
    fallback: &Position,
) -> ResolvedStimulus {
    let visual = match &definition.content {
        StimulusContent::Text(text) => {
            let options = text.options();
            let chosen = pick(rng, options).cloned().unwrap_or_else(|| {
                warn!("text stimulus {:?} has no options", definition.name);
                String::new()
            });
            Visual::Text(chosen)
        }
        StimulusContent::Polygon(spec) => Visual::Shape {
            shape: spec.shape,
            rgba: spec.rgba(),
            size: spec.size,
        },
        StimulusContent::Image(file) => file_visual(MediaKind::Image, file),
        StimulusContent::Audio(file) => file_visual(MediaKind::Audio, file),
        StimulusContent::Video(file) => file_visual(MediaKind::Video, file),
    };
    let position = placement
        .positions
        .as_ref()
        .and_then(|positions| pick(rng, positions.as_slice()))
        .unwrap_or(fallback)
        .clone();
    ResolvedStimulus {
        name: definition.name.clone(),
        visual,
        position,
    }
}

fn file_visual(media: MediaKind, file: &str) -> Visual {
    Visual::File {
        media,
        file_name: file.to_string(),
    }
}
