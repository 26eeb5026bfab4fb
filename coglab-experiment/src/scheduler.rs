use crate::config::RunnerConfig;
use crate::trial::{ResponseRecord, resolve};
use coglab_core::{BreakGate, DisplayStep, ExperimentDocument, KeySet, PresentationSurface, StepWait};
use coglab_timing::{CancelToken, Interrupted, Keyboard, Suspender, Timer, TimingStats};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("run cancelled by the exit action")]
    Cancelled,
    #[error("keyboard input closed while waiting for a key")]
    InputClosed,
}

impl From<Interrupted> for RunError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::Cancelled => RunError::Cancelled,
            Interrupted::InputClosed => RunError::InputClosed,
        }
    }
}

/// What a run did, complete or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Display steps put on screen.
    pub presentations: u64,
    pub breaks: u32,
    pub responses: Vec<ResponseRecord>,
    pub timing: TimingStats,
    pub completed: bool,
}

/// Plays an [`ExperimentDocument`] block by block, trial by trial and step
/// by step on a surface it holds for the whole run.
pub struct TrialScheduler<T: Timer, R: Rng> {
    suspend: Suspender<T>,
    rng: R,
    config: RunnerConfig,
    report: RunReport,
}

impl<T: Timer> TrialScheduler<T, StdRng> {
    /// Seeds from `config.seed`, or from the OS when unset.
    pub fn from_config(timer: T, keyboard: &Keyboard, cancel: CancelToken, config: RunnerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new(timer, keyboard, cancel, rng, config)
    }
}

impl<T: Timer, R: Rng> TrialScheduler<T, R> {
    pub fn new(timer: T, keyboard: &Keyboard, cancel: CancelToken, rng: R, config: RunnerConfig) -> Self {
        Self {
            suspend: Suspender::new(timer, keyboard, cancel),
            rng,
            config,
            report: RunReport::default(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        self.suspend.cancel_token()
    }

    /// Progress of the current or last run; after an error this is the
    /// partial record up to the interruption.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub async fn run<P>(&mut self, doc: &ExperimentDocument, surface: &mut P) -> Result<RunReport, RunError>
    where
        P: PresentationSurface + ?Sized,
    {
        self.report = RunReport::default();
        info!(
            "starting run: {} block(s) × {} trial(s) × {} step(s)",
            doc.design.blocks_per_session,
            doc.design.trials_per_block,
            doc.procedure.len()
        );
        let outcome = self.run_session(doc, surface).await;
        self.report.timing = self.suspend.timer().timing_stats();
        match outcome {
            Ok(()) => {
                self.report.completed = true;
                info!(
                    "run complete: {} presentation(s), {} response(s)",
                    self.report.presentations,
                    self.report.responses.len()
                );
                Ok(self.report.clone())
            }
            Err(interrupted) => {
                surface.clear();
                surface.present();
                warn!("run stopped after {} presentation(s): {interrupted}", self.report.presentations);
                Err(interrupted.into())
            }
        }
    }

    async fn run_session<P>(&mut self, doc: &ExperimentDocument, surface: &mut P) -> Result<(), Interrupted>
    where
        P: PresentationSurface + ?Sized,
    {
        let design = &doc.design;
        let blocks = design.blocks_per_session;
        for block in 0..blocks {
            info!("block {} of {}", block + 1, blocks);
            for trial in 0..design.trials_per_block {
                info!("trial {} of block {}", trial + 1, block + 1);
                for step in &doc.procedure {
                    self.present_step(doc, step, surface, block, trial).await?;
                }
                surface.clear();
                surface.present();
                self.suspend
                    .duration(Duration::from_millis(design.inter_trial_interval_ms))
                    .await?;
            }
            if block + 1 < blocks {
                self.take_break(&design.block_break_message, design.break_gate(), surface)
                    .await?;
            }
        }

        surface.clear();
        surface.show_message(&self.config.completion_message);
        surface.present();
        let keys = self.config.completion_keys(&design.break_response_keys).clone();
        self.wait_for_any(&keys).await?;
        surface.clear();
        surface.present();
        Ok(())
    }

    async fn present_step<P>(
        &mut self,
        doc: &ExperimentDocument,
        step: &DisplayStep,
        surface: &mut P,
        block: u32,
        trial: u32,
    ) -> Result<(), Interrupted>
    where
        P: PresentationSurface + ?Sized,
    {
        surface.clear();
        for placement in &step.stimuli {
            let Some(definition) = doc.stimulus(&placement.name) else {
                debug!("step {:?}: no stimulus named {:?}, skipped", step.label, placement.name);
                continue;
            };
            let resolved = resolve(&mut self.rng, placement, definition, &self.config.fallback_position);
            surface.draw(&resolved);
        }
        surface.present();
        self.report.presentations += 1;
        let shown = Instant::now();
        debug!("step {:?} shown", step.label);

        match step.wait() {
            StepWait::Duration(ms) => {
                self.suspend.duration(Duration::from_millis(ms)).await?;
            }
            StepWait::Response(keys) => {
                let press = self.suspend.key(|key| keys.contains(key)).await?;
                let reaction_ms = press.at.saturating_duration_since(shown).as_secs_f64() * 1000.0;
                debug!("step {:?}: {:?} after {:.1} ms", step.label, press.key, reaction_ms);
                self.report.responses.push(ResponseRecord {
                    block,
                    trial,
                    step: step.label.clone(),
                    key: press.key,
                    reaction_ms,
                });
            }
            StepWait::Forever => {
                warn!(
                    "step {:?} has nothing to end it, waiting for the exit action",
                    step.label
                );
                return Err(self.suspend.forever().await);
            }
        }
        Ok(())
    }

    async fn take_break<P>(&mut self, message: &str, gate: BreakGate<'_>, surface: &mut P) -> Result<(), Interrupted>
    where
        P: PresentationSurface + ?Sized,
    {
        surface.clear();
        surface.show_message(message);
        surface.present();
        self.report.breaks += 1;
        match gate {
            BreakGate::Key(keys) => {
                info!("break: waiting for {keys}");
                self.suspend.key(|key| keys.contains(key)).await?;
            }
            BreakGate::Duration(ms) => {
                info!("break: {ms} ms");
                self.suspend.duration(Duration::from_millis(ms)).await?;
            }
            BreakGate::Immediate => {}
        }
        surface.clear();
        Ok(())
    }

    /// An empty key set never resolves; only the exit action ends it.
    async fn wait_for_any(&mut self, keys: &KeySet) -> Result<(), Interrupted> {
        if keys.is_empty() {
            return Err(self.suspend.forever().await);
        }
        self.suspend.key(|key| keys.contains(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coglab_core::{
        DesignParameters, Position, ResolvedStimulus, StimulusDefinition, StimulusPlacement, Visual,
    };
    use coglab_timing::MonotonicTimer;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Clear,
        Draw(ResolvedStimulus),
        Message(String),
        Present,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Recorder {
        fn draws(&self) -> Vec<&ResolvedStimulus> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Draw(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        fn messages(&self) -> Vec<&str> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Message(m) => Some(m.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl PresentationSurface for Recorder {
        fn clear(&mut self) {
            self.events.push(Event::Clear);
        }
        fn draw(&mut self, stimulus: &ResolvedStimulus) {
            self.events.push(Event::Draw(stimulus.clone()));
        }
        fn show_message(&mut self, text: &str) {
            self.events.push(Event::Message(text.to_string()));
        }
        fn present(&mut self) {
            self.events.push(Event::Present);
        }
    }

    fn scheduler(keyboard: &Keyboard) -> TrialScheduler<MonotonicTimer, StdRng> {
        let config = RunnerConfig {
            seed: Some(3),
            ..RunnerConfig::default()
        };
        TrialScheduler::from_config(MonotonicTimer::new(), keyboard, CancelToken::new(), config)
    }

    /// Presses `key` every 10 ms for as long as the test runs.
    fn keep_pressing(keyboard: &Keyboard, key: &'static str) {
        let keyboard = keyboard.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                keyboard.press(key);
            }
        });
    }

    fn hi_document() -> ExperimentDocument {
        let mut doc = ExperimentDocument::new();
        doc.add_stimulus(StimulusDefinition::text_choices("greeting", ["hi"]))
            .unwrap();
        doc.add_step(
            DisplayStep::timed("show", 100)
                .with_stimulus(StimulusPlacement::at("greeting", Position::centre())),
        )
        .unwrap();
        doc.design = DesignParameters {
            trials_per_block: 1,
            blocks_per_session: 1,
            inter_trial_interval_ms: 0,
            break_response_keys: KeySet::parse(" "),
            ..DesignParameters::default()
        };
        doc
    }

    #[tokio::test(start_paused = true)]
    async fn single_text_step_renders_once_then_completes() {
        let keyboard = Keyboard::new();
        keep_pressing(&keyboard, " ");
        let mut sched = scheduler(&keyboard);
        let mut surface = Recorder::default();

        let started = Instant::now();
        let report = sched.run(&hi_document(), &mut surface).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
        let draws = surface.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].visual, Visual::Text("hi".into()));
        assert_eq!(surface.messages(), vec!["Experiment Complete!"]);
        assert_eq!(surface.events.last(), Some(&Event::Present));
        assert_eq!(report.presentations, 1);
        assert_eq!(report.breaks, 0);
        assert!(report.completed);
        // the step wait plus the zero-length inter-trial interval
        assert_eq!(report.timing.samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn presentations_and_breaks_follow_the_design() {
        let keyboard = Keyboard::new();
        let mut doc = ExperimentDocument::new();
        doc.add_stimulus(StimulusDefinition::text("plus", "+")).unwrap();
        for label in ["fixation", "target", "blank"] {
            doc.add_step(
                DisplayStep::timed(label, 50)
                    .with_stimulus(StimulusPlacement::at("plus", Position::centre())),
            )
            .unwrap();
        }
        doc.design = DesignParameters {
            trials_per_block: 4,
            blocks_per_session: 3,
            inter_trial_interval_ms: 20,
            break_duration_ms: Some(500),
            ..DesignParameters::default()
        };
        let config = RunnerConfig {
            completion_keys: Some(KeySet::parse("q")),
            ..RunnerConfig::default()
        };
        keep_pressing(&keyboard, "Q");
        let mut sched = TrialScheduler::from_config(
            MonotonicTimer::new(),
            &keyboard,
            CancelToken::new(),
            config,
        );
        let mut surface = Recorder::default();

        let report = sched.run(&doc, &mut surface).await.unwrap();
        assert_eq!(report.presentations, 3 * 4 * 3);
        assert_eq!(report.breaks, 2);
        assert_eq!(
            surface.messages().iter().filter(|m| **m == "Take a short break!").count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn response_step_ignores_other_keys() {
        let keyboard = Keyboard::new();
        let mut doc = ExperimentDocument::new();
        doc.add_step(DisplayStep::until_keys("probe", KeySet::parse("a")))
            .unwrap();
        doc.design.trials_per_block = 1;
        doc.design.blocks_per_session = 1;
        keep_pressing(&keyboard, "b");
        let mut sched = scheduler(&keyboard);
        let mut surface = Recorder::default();

        let waited = tokio::time::timeout(Duration::from_secs(30), sched.run(&doc, &mut surface)).await;
        assert!(waited.is_err());
        assert_eq!(sched.report().presentations, 1);
        assert!(sched.report().responses.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn response_step_records_the_accepted_key() {
        let keyboard = Keyboard::new();
        let mut doc = ExperimentDocument::new();
        doc.add_step(DisplayStep::until_keys("probe", KeySet::parse("a")))
            .unwrap();
        doc.design.trials_per_block = 2;
        doc.design.blocks_per_session = 1;
        doc.design.inter_trial_interval_ms = 0;
        let config = RunnerConfig {
            completion_keys: Some(KeySet::parse("a")),
            ..RunnerConfig::default()
        };
        keep_pressing(&keyboard, "A");
        let mut sched = TrialScheduler::from_config(
            MonotonicTimer::new(),
            &keyboard,
            CancelToken::new(),
            config,
        );

        let report = sched.run(&doc, &mut Recorder::default()).await.unwrap();
        assert_eq!(report.responses.len(), 2);
        assert_eq!(report.responses[1].trial, 1);
        assert_eq!(report.responses[0].key, "A");
        assert!(report.responses[0].reaction_ms < 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_stimulus_is_skipped() {
        let keyboard = Keyboard::new();
        keep_pressing(&keyboard, " ");
        let mut doc = hi_document();
        doc.procedure[0]
            .stimuli
            .push(StimulusPlacement::at("ghost", Position::centre()));
        let mut surface = Recorder::default();

        let report = scheduler(&keyboard).run(&doc, &mut surface).await.unwrap();
        assert_eq!(report.presentations, 1);
        assert_eq!(surface.draws().len(), 1);
        assert_eq!(surface.draws()[0].name, "greeting");
    }

    #[tokio::test(start_paused = true)]
    async fn break_key_wins_over_break_duration() {
        let keyboard = Keyboard::new();
        let mut doc = hi_document();
        doc.design.blocks_per_session = 2;
        doc.design.break_duration_ms = Some(60_000);
        keep_pressing(&keyboard, "space");

        let started = Instant::now();
        let report = scheduler(&keyboard)
            .run(&doc, &mut Recorder::default())
            .await
            .unwrap();
        assert_eq!(report.breaks, 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_the_surface_and_stops() {
        let keyboard = Keyboard::new();
        let mut doc = hi_document();
        // nothing ever presses the break key
        doc.design.blocks_per_session = 2;
        let mut sched = scheduler(&keyboard);
        let cancel = sched.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        });
        let mut surface = Recorder::default();

        let err = sched.run(&doc, &mut surface).await.unwrap_err();
        assert_eq!(err, RunError::Cancelled);
        assert_eq!(sched.report().breaks, 1);
        assert!(!sched.report().completed);
        let tail = &surface.events[surface.events.len() - 2..];
        assert_eq!(tail, &[Event::Clear, Event::Present]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_keyboard_ends_the_run() {
        let keyboard = Keyboard::new();
        let mut doc = ExperimentDocument::new();
        doc.add_step(DisplayStep::until_keys("probe", KeySet::parse("f,j")))
            .unwrap();
        let mut sched = scheduler(&keyboard);
        drop(keyboard);
        let err = sched.run(&doc, &mut Recorder::default()).await.unwrap_err();
        assert_eq!(err, RunError::InputClosed);
    }
}
