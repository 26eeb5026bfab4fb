use coglab_core::{PresentationSurface, ResolvedStimulus, Visual, normalize_key};
use coglab_timing::{CancelToken, Keyboard};
use log::{debug, info};
use std::io::BufRead;
use std::thread;

/// Terminal stand-in for the screen: every draw becomes a log line.
#[derive(Debug, Default)]
pub struct LogSurface {
    frames: u64,
    pending: Vec<String>,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

fn describe(stimulus: &ResolvedStimulus) -> String {
    let what = match &stimulus.visual {
        Visual::Text(text) => format!("{text:?}"),
        Visual::Shape { shape, rgba, size } => format!(
            "{shape} {size}px #{:02x}{:02x}{:02x}",
            rgba[0], rgba[1], rgba[2]
        ),
        file @ Visual::File { .. } => file.placeholder().unwrap_or_default(),
    };
    format!("{} {} at {}", stimulus.name, what, stimulus.position)
}

impl PresentationSurface for LogSurface {
    fn clear(&mut self) {
        self.pending.clear();
    }

    fn draw(&mut self, stimulus: &ResolvedStimulus) {
        self.pending.push(describe(stimulus));
    }

    fn show_message(&mut self, text: &str) {
        self.pending.push(format!("message {text:?}"));
    }

    fn present(&mut self) {
        self.frames += 1;
        if self.pending.is_empty() {
            debug!("frame {}: blank", self.frames);
        } else {
            info!("frame {}: {}", self.frames, self.pending.join("; "));
        }
    }
}

/// What one line of stdin means to a headless run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    Key(String),
    Exit,
    Nothing,
}

pub fn parse_line(line: &str) -> LineInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineInput::Nothing;
    }
    match normalize_key(trimmed).as_str() {
        "escape" => LineInput::Exit,
        key => LineInput::Key(key.to_string()),
    }
}

/// Feeds stdin lines to `keyboard` from a background thread. The keyboard
/// handle is dropped at end of input, which closes it once the caller has
/// dropped its own.
pub fn spawn_stdin_keys(keyboard: Keyboard, cancel: CancelToken) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_line(&line) {
                LineInput::Key(key) => {
                    let seen = keyboard.press(&key);
                    debug!("stdin key {key:?} reached {seen} listener(s)");
                }
                LineInput::Exit => {
                    cancel.cancel();
                    break;
                }
                LineInput::Nothing => {}
            }
        }
        debug!("stdin closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coglab_core::{MediaKind, Position, Shape};

    #[test]
    fn stdin_lines_become_keys() {
        assert_eq!(parse_line("space\n"), LineInput::Key(" ".into()));
        assert_eq!(parse_line(" F "), LineInput::Key("f".into()));
        assert_eq!(parse_line("Esc"), LineInput::Exit);
        assert_eq!(parse_line("   "), LineInput::Nothing);
    }

    #[test]
    fn frames_describe_what_was_drawn() {
        let mut s = LogSurface::new();
        s.clear();
        s.draw(&ResolvedStimulus {
            name: "dot".into(),
            visual: Visual::Shape {
                shape: Shape::Circle,
                rgba: [255, 0, 0, 255],
                size: 40,
            },
            position: Position::centre(),
        });
        assert_eq!(s.pending, vec!["dot circle 40px #ff0000 at [50%, 50%]"]);
        s.present();
        assert_eq!(s.frames(), 1);

        let file = ResolvedStimulus {
            name: "pic".into(),
            visual: Visual::File {
                media: MediaKind::Image,
                file_name: "a.png".into(),
            },
            position: Position::new("10px", "20px"),
        };
        assert_eq!(describe(&file), "pic [image: a.png] at [10px, 20px]");
    }
}
