use anyhow::{Context, Result, anyhow};
use coglab_core::{ExperimentDocument, PresentationSurface};
use coglab_experiment::{FileStore, RunError, RunReport, RunnerConfig, TrialScheduler, Workspace};
use coglab_timing::{CancelToken, Keyboard, MonotonicTimer};
use std::fs;
use std::path::{Path, PathBuf};

pub type Store = Workspace<FileStore, FileStore>;

/// Snapshots live in `dir`, the session autosave in `dir/session`.
pub fn open_workspace(dir: &Path) -> Result<Store> {
    let durable = FileStore::open(dir).with_context(|| format!("opening store {}", dir.display()))?;
    let session_dir = dir.join("session");
    let session = FileStore::open(&session_dir)
        .with_context(|| format!("opening session store {}", session_dir.display()))?;
    Ok(Workspace::new(session, durable))
}

pub fn read_document(path: &Path) -> Result<ExperimentDocument> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not an experiment document", path.display()))
}

/// Picks the document to run: a file, a saved snapshot, or whatever the
/// session was last editing. The chosen document becomes the autosave.
pub fn load_document(store: &mut Store, file: Option<&PathBuf>, snapshot: Option<&str>) -> Result<ExperimentDocument> {
    if let Some(path) = file {
        let doc = read_document(path)?;
        store.autosave(&doc)?;
        return Ok(doc);
    }
    if let Some(name) = snapshot {
        return store
            .load_snapshot(name)?
            .ok_or_else(|| anyhow!("no saved experiment named {name:?}"));
    }
    store
        .restore()?
        .ok_or_else(|| anyhow!("nothing to run: pass --file or --snapshot"))
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub error: Option<RunError>,
}

/// Runs the scheduler to completion on a single-threaded runtime.
///
/// `keyboard` is dropped once the scheduler listens on it, so key input
/// closes when every other handle is gone.
pub fn run_blocking<P>(
    doc: &ExperimentDocument,
    config: RunnerConfig,
    keyboard: Keyboard,
    cancel: CancelToken,
    surface: &mut P,
) -> Result<RunOutcome>
where
    P: PresentationSurface + ?Sized,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("starting the presentation runtime")?;
    let mut scheduler = TrialScheduler::from_config(MonotonicTimer::new(), &keyboard, cancel, config);
    drop(keyboard);
    let result = runtime.block_on(scheduler.run(doc, surface));
    Ok(RunOutcome {
        report: scheduler.report().clone(),
        error: result.err(),
    })
}

pub fn write_results(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("writing results to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coglab_core::{DisplayStep, StimulusDefinition, StimulusPlacement, Position};

    fn doc() -> ExperimentDocument {
        let mut doc = ExperimentDocument::new();
        doc.add_stimulus(StimulusDefinition::text("msg", "hi")).unwrap();
        doc.add_step(
            DisplayStep::timed("show", 5).with_stimulus(StimulusPlacement::at("msg", Position::centre())),
        )
        .unwrap();
        doc.design.trials_per_block = 1;
        doc.design.blocks_per_session = 1;
        doc.design.inter_trial_interval_ms = 0;
        doc
    }

    #[test]
    fn document_sources_in_order_of_preference() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_workspace(dir.path()).unwrap();
        assert!(load_document(&mut store, None, None).is_err());

        let file = dir.path().join("doc.json");
        fs::write(&file, serde_json::to_string(&doc()).unwrap()).unwrap();
        let from_file = load_document(&mut store, Some(&file), None).unwrap();
        assert_eq!(from_file, doc());
        // the file became the session document
        assert_eq!(load_document(&mut store, None, None).unwrap(), doc());

        store.save_snapshot("demo", &doc()).unwrap();
        assert!(load_document(&mut store, None, Some("demo")).is_ok());
        assert!(load_document(&mut store, None, Some("missing")).is_err());
        assert_eq!(store.list_snapshots().unwrap(), vec!["demo"]);
    }

    #[test]
    fn closed_input_and_results_file() {
        struct Blank;
        impl PresentationSurface for Blank {
            fn clear(&mut self) {}
            fn draw(&mut self, _: &coglab_core::ResolvedStimulus) {}
            fn show_message(&mut self, _: &str) {}
        }

        let mut d = doc();
        d.design.break_response_keys = coglab_core::KeySet::parse(" ");
        // nobody else holds the keyboard, so the completion wait sees closed input
        let outcome = run_blocking(&d, RunnerConfig::default(), Keyboard::new(), CancelToken::new(), &mut Blank).unwrap();
        assert_eq!(outcome.error, Some(RunError::InputClosed));
        assert_eq!(outcome.report.presentations, 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_results(&path, &outcome.report).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["presentations"], 1);
        assert_eq!(json["completed"], false);
    }
}
