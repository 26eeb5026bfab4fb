use crate::keys::KeySet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen anchor for a stimulus centre, kept exactly as typed
/// (`"50%"`, `"120px"`, `"120"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: String,
    pub y: String,
}

impl Position {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    pub fn centre() -> Self {
        Self::new("50%", "50%")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// One axis of a [`Position`] after parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Percent(f32),
    Pixels(f32),
}

impl Coordinate {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (number, make): (&str, fn(f32) -> Coordinate) =
            if let Some(number) = raw.strip_suffix('%') {
                (number, Coordinate::Percent)
            } else if let Some(number) = raw.strip_suffix("px") {
                (number, Coordinate::Pixels)
            } else {
                (raw, Coordinate::Pixels)
            };
        number
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(make)
    }

    /// Offset in pixels along an axis of `extent` pixels.
    pub fn resolve(self, extent: f32) -> f32 {
        match self {
            Coordinate::Percent(p) => extent * p / 100.0,
            Coordinate::Pixels(px) => px,
        }
    }
}

/// A fixed position or a list sampled once per presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Positions {
    One(Position),
    Many(Vec<Position>),
}

impl Positions {
    /// Reads the position text area: one `[x, y]` per line, anything else ignored.
    pub fn parse_list(text: &str) -> Option<Self> {
        let mut found: Vec<Position> = text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('[') && line.ends_with(']') && line.len() >= 2)
            .map(|line| {
                let inner = &line[1..line.len() - 1];
                let mut parts = inner.split(',').map(str::trim);
                let x = parts.next().unwrap_or_default();
                let y = parts.next().unwrap_or_default();
                Position::new(x, y)
            })
            .collect();
        match found.len() {
            0 => None,
            1 => found.pop().map(Positions::One),
            _ => Some(Positions::Many(found)),
        }
    }

    pub fn as_slice(&self) -> &[Position] {
        match self {
            Positions::One(position) => std::slice::from_ref(position),
            Positions::Many(list) => list,
        }
    }

    /// Back to the text-area form, one bracketed pair per line.
    pub fn to_text(&self) -> String {
        self.as_slice()
            .iter()
            .map(Position::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reference from a display step to a stimulus, with where to put it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusPlacement {
    pub name: String,
    #[serde(default)]
    pub positions: Option<Positions>,
}

impl StimulusPlacement {
    pub fn at(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            positions: Some(Positions::One(position)),
        }
    }

    pub fn among(name: impl Into<String>, positions: Vec<Position>) -> Self {
        Self {
            name: name.into(),
            positions: Some(Positions::Many(positions)),
        }
    }
}

/// One screen of the per-trial procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStep {
    pub label: String,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub until_response: bool,
    #[serde(rename = "responseKey", default)]
    pub response_keys: KeySet,
    #[serde(default)]
    pub stimuli: Vec<StimulusPlacement>,
}

/// How a presented step ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepWait<'a> {
    Duration(u64),
    Response(&'a KeySet),
    /// Misconfigured step: waiting on response with no keys, or timed with
    /// no duration. Only the exit action ends it.
    Forever,
}

impl DisplayStep {
    pub fn timed(label: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            label: label.into(),
            duration: Some(duration_ms),
            until_response: false,
            response_keys: KeySet::new(),
            stimuli: Vec::new(),
        }
    }

    pub fn until_keys(label: impl Into<String>, keys: KeySet) -> Self {
        Self {
            label: label.into(),
            duration: None,
            until_response: true,
            response_keys: keys,
            stimuli: Vec::new(),
        }
    }

    pub fn with_stimulus(mut self, placement: StimulusPlacement) -> Self {
        self.stimuli.push(placement);
        self
    }

    pub fn wait(&self) -> StepWait<'_> {
        if self.until_response {
            if self.response_keys.is_empty() {
                StepWait::Forever
            } else {
                StepWait::Response(&self.response_keys)
            }
        } else {
            match self.duration {
                Some(ms) => StepWait::Duration(ms),
                None => StepWait::Forever,
            }
        }
    }

    pub fn references(&self, stimulus: &str) -> bool {
        self.stimuli.iter().any(|s| s.name == stimulus)
    }

    /// Points every reference to `old` at `new`, returning how many changed.
    pub fn rename_stimulus(&mut self, old: &str, new: &str) -> usize {
        let mut changed = 0;
        for placement in self.stimuli.iter_mut().filter(|s| s.name == old) {
            placement.name = new.to_string();
            changed += 1;
        }
        changed
    }
}
