use crate::cancel::CancelToken;
use crate::keyboard::{KeyListener, KeyPress, Keyboard};
use crate::timer::Timer;
use std::time::Duration;
use thiserror::Error;

/// Why a suspend point returned without its condition being met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("run cancelled")]
    Cancelled,
    #[error("keyboard input closed")]
    InputClosed,
}

/// The only places a run yields: a timed wait, a key wait, or an endless
/// wait. Each one races its condition against the cancel token.
pub struct Suspender<T: Timer> {
    timer: T,
    keys: KeyListener,
    cancel: CancelToken,
}

impl<T: Timer> Suspender<T> {
    pub fn new(timer: T, keyboard: &Keyboard, cancel: CancelToken) -> Self {
        Self {
            timer,
            keys: keyboard.listen(),
            cancel,
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Sleeps for `d`; returns the time actually spent.
    pub async fn duration(&mut self, d: Duration) -> Result<Duration, Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        let start = self.timer.now();
        let slept = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.timer.sleep(d) => true,
        };
        if !slept {
            return Err(Interrupted::Cancelled);
        }
        let actual = self.timer.elapsed(start);
        self.timer.record_wait(d, actual);
        Ok(actual)
    }

    /// Waits, without timeout, for a press `accept` agrees to.
    ///
    /// The listener is registered on entry and dropped on return, so presses
    /// made before the call are never seen.
    pub async fn key<F>(&mut self, accept: F) -> Result<KeyPress, Interrupted>
    where
        F: Fn(&str) -> bool,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        let mut listener = self.keys.resubscribe();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            press = next_accepted(&mut listener, &accept) => press.ok_or(Interrupted::InputClosed),
        }
    }

    /// Blocks until the run is cancelled.
    pub async fn forever(&mut self) -> Interrupted {
        self.cancel.cancelled().await;
        Interrupted::Cancelled
    }
}

async fn next_accepted<F>(listener: &mut KeyListener, accept: &F) -> Option<KeyPress>
where
    F: Fn(&str) -> bool,
{
    while let Some(press) = listener.next().await {
        if accept(&press.key) {
            return Some(press);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::MonotonicTimer;
    use tokio::time::Instant;

    fn suspender() -> (Suspender<MonotonicTimer>, Keyboard, CancelToken) {
        let keyboard = Keyboard::new();
        let cancel = CancelToken::new();
        let s = Suspender::new(MonotonicTimer::new(), &keyboard, cancel.clone());
        (s, keyboard, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn duration_records_overshoot() {
        let (mut s, _keyboard, _cancel) = suspender();
        let spent = s.duration(Duration::from_millis(100)).await.unwrap();
        assert!(spent >= Duration::from_millis(100));
        assert_eq!(s.timer().timing_stats().samples, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn key_ignores_other_keys_and_earlier_presses() {
        let (mut s, keyboard, _cancel) = suspender();
        keyboard.press("a");
        let presser = keyboard.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            presser.press("x");
            tokio::time::sleep(Duration::from_millis(10)).await;
            presser.press("A");
        });
        let started = Instant::now();
        let press = s.key(|k| k.eq_ignore_ascii_case("a")).await.unwrap();
        assert_eq!(press.key, "A");
        assert!(press.at - started >= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_every_wait() {
        let (mut s, _keyboard, cancel) = suspender();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        assert_eq!(s.forever().await, Interrupted::Cancelled);
        assert_eq!(
            s.duration(Duration::from_secs(10)).await,
            Err(Interrupted::Cancelled)
        );
        assert_eq!(s.key(|_| true).await.unwrap_err(), Interrupted::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_a_timed_wait() {
        let (mut s, _keyboard, cancel) = suspender();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cancel.cancel();
        });
        let started = Instant::now();
        assert_eq!(
            s.duration(Duration::from_secs(60)).await,
            Err(Interrupted::Cancelled)
        );
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn dropped_keyboard_closes_input() {
        let (mut s, keyboard, _cancel) = suspender();
        drop(keyboard);
        assert_eq!(s.key(|_| true).await.unwrap_err(), Interrupted::InputClosed);
    }
}
