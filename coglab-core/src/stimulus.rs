use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Named stimulus the procedure refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusDefinition {
    pub name: String,
    #[serde(flatten)]
    pub content: StimulusContent,
}

impl StimulusDefinition {
    pub fn new(name: impl Into<String>, content: StimulusContent) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, StimulusContent::Text(TextContent::Single(text.into())))
    }

    pub fn text_choices<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            StimulusContent::Text(TextContent::Choices(
                choices.into_iter().map(Into::into).collect(),
            )),
        )
    }

    pub fn polygon(name: impl Into<String>, shape: Shape, color: &str, size: u32) -> Self {
        Self::new(
            name,
            StimulusContent::Polygon(PolygonSpec {
                shape,
                color: color.to_string(),
                size,
            }),
        )
    }
}

/// Stimulus payload keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum StimulusContent {
    Text(TextContent),
    Polygon(PolygonSpec),
    Image(String),
    Audio(String),
    Video(String),
}

impl StimulusContent {
    pub fn type_name(&self) -> &'static str {
        match self {
            StimulusContent::Text(_) => "text",
            StimulusContent::Polygon(_) => "polygon",
            StimulusContent::Image(_) => "image",
            StimulusContent::Audio(_) => "audio",
            StimulusContent::Video(_) => "video",
        }
    }

    /// False when there is nothing to present: blank text, no choices, no file.
    pub fn has_content(&self) -> bool {
        match self {
            StimulusContent::Text(text) => !text.is_empty(),
            StimulusContent::Polygon(_) => true,
            StimulusContent::Image(file)
            | StimulusContent::Audio(file)
            | StimulusContent::Video(file) => !file.trim().is_empty(),
        }
    }
}

/// Text is either fixed or one of several options drawn per presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextContent {
    Single(String),
    Choices(Vec<String>),
}

impl TextContent {
    /// One option per non-blank line, trimmed.
    pub fn from_lines(text: &str) -> Option<Self> {
        let mut lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        match lines.len() {
            0 => None,
            1 => lines.pop().map(TextContent::Single),
            _ => Some(TextContent::Choices(lines)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TextContent::Single(text) => text.trim().is_empty(),
            TextContent::Choices(choices) => choices.is_empty(),
        }
    }

    pub fn options(&self) -> &[String] {
        match self {
            TextContent::Single(text) => std::slice::from_ref(text),
            TextContent::Choices(choices) => choices,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Triangle,
    Square,
    Circle,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Triangle => "triangle",
            Shape::Square => "square",
            Shape::Circle => "circle",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonSpec {
    pub shape: Shape,
    pub color: String,
    /// A blank size field is stored as `null` and loads as the editor default.
    #[serde(default = "default_size", deserialize_with = "size_or_default")]
    pub size: u32,
}

fn default_size() -> u32 {
    PolygonSpec::DEFAULT_SIZE
}

fn size_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(PolygonSpec::DEFAULT_SIZE))
}

impl PolygonSpec {
    pub const DEFAULT_RGBA: [u8; 4] = [255, 0, 0, 255];
    pub const DEFAULT_SIZE: u32 = 80;

    /// Fill colour; unreadable colour strings fall back to the editor's red.
    pub fn rgba(&self) -> [u8; 4] {
        parse_hex_color(&self.color).unwrap_or_else(|| {
            warn!("unreadable polygon colour {:?}, using red", self.color);
            Self::DEFAULT_RGBA
        })
    }
}

/// Parses `#rgb` and `#rrggbb` colour strings.
pub fn parse_hex_color(color: &str) -> Option<[u8; 4]> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgba[i] = v * 17;
            }
            Some(rgba)
        }
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ]),
        _ => None,
    }
}
