use log::warn;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

/// A keydown as delivered by the input surface.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub key: String,
    pub at: Instant,
}

/// Fan-out point for keydown events.
///
/// Presses reach only listeners registered at the time of the press;
/// nothing is queued for a listener that attaches later.
#[derive(Debug, Clone)]
pub struct Keyboard {
    tx: broadcast::Sender<KeyPress>,
}

impl Keyboard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Returns how many listeners saw the press.
    pub fn press(&self, key: &str) -> usize {
        let press = KeyPress {
            key: key.to_string(),
            at: Instant::now(),
        };
        self.tx.send(press).unwrap_or(0)
    }

    pub fn listen(&self) -> KeyListener {
        KeyListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a [`Keyboard`]. Does not keep the hub alive.
#[derive(Debug)]
pub struct KeyListener {
    rx: broadcast::Receiver<KeyPress>,
}

impl KeyListener {
    /// A new listener that only sees presses made from now on.
    pub fn resubscribe(&self) -> KeyListener {
        KeyListener {
            rx: self.rx.resubscribe(),
        }
    }

    /// Next press, or `None` once every [`Keyboard`] handle is gone.
    pub async fn next(&mut self) -> Option<KeyPress> {
        loop {
            match self.rx.recv().await {
                Ok(press) => return Some(press),
                Err(RecvError::Lagged(missed)) => {
                    warn!("key listener fell behind, {} press(es) dropped", missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
