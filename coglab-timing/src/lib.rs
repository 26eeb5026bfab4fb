pub mod cancel;
pub mod keyboard;
pub mod suspend;
pub mod timer;

pub use cancel::CancelToken;
pub use keyboard::{KeyListener, KeyPress, Keyboard};
pub use suspend::{Interrupted, Suspender};
pub use timer::{MonotonicTimer, Timer, TimingStats};
