use crate::step::Position;
use crate::stimulus::Shape;

/// Kind of file a file-backed stimulus names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Concrete thing to draw, after random choices are made.
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Text(String),
    Shape {
        shape: Shape,
        rgba: [u8; 4],
        size: u32,
    },
    File {
        media: MediaKind,
        file_name: String,
    },
}

impl Visual {
    /// Text stand-in for surfaces that cannot play the file itself.
    pub fn placeholder(&self) -> Option<String> {
        match self {
            Visual::File { media, file_name } => Some(format!("[{}: {}]", media.as_str(), file_name)),
            _ => None,
        }
    }
}

/// A stimulus ready to be put on screen, centred on `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStimulus {
    pub name: String,
    pub visual: Visual,
    pub position: Position,
}

/// Full-screen target the scheduler presents on.
///
/// The scheduler holds it exclusively for the whole run: it clears, draws
/// every stimulus of a step, then calls [`present`](Self::present) once.
pub trait PresentationSurface {
    fn clear(&mut self);
    fn draw(&mut self, stimulus: &ResolvedStimulus);
    fn show_message(&mut self, text: &str);
    fn present(&mut self) {}
}

impl<S: PresentationSurface + ?Sized> PresentationSurface for &mut S {
    fn clear(&mut self) {
        (**self).clear()
    }
    fn draw(&mut self, stimulus: &ResolvedStimulus) {
        (**self).draw(stimulus)
    }
    fn show_message(&mut self, text: &str) {
        (**self).show_message(text)
    }
    fn present(&mut self) {
        (**self).present()
    }
}
