mod app;
mod cli;
mod headless;
mod keymap;
mod session;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cli::{AngleArgs, CalibrateArgs, Cli, Command, RunArgs, SnapshotCommand};
use coglab_core::ApparatusConfig;
use coglab_experiment::{CardSizer, Nudge, RunError, RunnerConfig, VisualAngle};
use coglab_render::{DEFAULT_FONT_PATH, FontArc, load_font};
use coglab_timing::{CancelToken, Keyboard};
use log::{info, warn};
use std::path::Path;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(&cli.store, args),
        Command::Angle(args) => angle(&cli.store, args),
        Command::Calibrate(args) => calibrate(&cli.store, args),
        Command::Snapshots(command) => snapshots(&cli.store, command),
    }
}

fn font(explicit: Option<&Path>) -> Result<Option<FontArc>> {
    match explicit {
        Some(path) => load_font(path).map(Some),
        None => match load_font(DEFAULT_FONT_PATH) {
            Ok(font) => Ok(Some(font)),
            Err(e) => {
                warn!("{e:#}; pass --font to show text");
                Ok(None)
            }
        },
    }
}

fn run(store_dir: &Path, args: RunArgs) -> Result<()> {
    let mut store = session::open_workspace(store_dir)?;
    let doc = session::load_document(&mut store, args.file.as_ref(), args.snapshot.as_deref())?;

    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    info!("{}", doc.design.summary().replace('\n', "; "));

    let outcome = if args.headless {
        let keyboard = Keyboard::new();
        let cancel = CancelToken::new();
        let _stdin = headless::spawn_stdin_keys(keyboard.clone(), cancel.clone());
        info!("headless run: type a key name per line (space, f, j, ...), esc to abort");
        session::run_blocking(&doc, config, keyboard, cancel, &mut headless::LogSurface::new())?
    } else {
        let font = font(args.font.as_deref())?;
        app::App::run(doc, config, font)?
    };

    if let Some(path) = &args.results {
        session::write_results(path, &outcome.report)?;
        info!("results written to {}", path.display());
    }
    let report = &outcome.report;
    info!(
        "{} presentation(s), {} break(s), {} response(s), mean timer overshoot {:.3} ms",
        report.presentations,
        report.breaks,
        report.responses.len(),
        report.timing.mean_overshoot_ns / 1e6
    );
    match outcome.error {
        None => Ok(()),
        Some(RunError::Cancelled) => {
            info!("run aborted");
            Ok(())
        }
        Some(e) => Err(e.into()),
    }
}

fn angle(store_dir: &Path, args: AngleArgs) -> Result<()> {
    let given = ApparatusConfig {
        width_cm: args.width_cm,
        height_cm: args.height_cm,
        resolution_x_px: args.res_x,
        resolution_y_px: args.res_y,
        viewing_distance_cm: args.distance_cm,
    };
    let apparatus = if given == ApparatusConfig::default() {
        // nothing on the command line: use the session document's apparatus
        let store = session::open_workspace(store_dir)?;
        store.restore()?.map(|doc| doc.apparatus).unwrap_or_default()
    } else {
        given
    };
    println!("{}", VisualAngle::describe(&apparatus));
    Ok(())
}

fn calibrate(store_dir: &Path, args: CalibrateArgs) -> Result<()> {
    let mut store = session::open_workspace(store_dir)?;
    let mut card = CardSizer::resume(store.session())?;
    if let Some(w) = args.card_width_px {
        card.width_px = w;
    }
    if let Some(h) = args.card_height_px {
        card.height_px = h;
    }
    for key in &args.nudges {
        match Nudge::from_key(key) {
            Some(nudge) => card.nudge(nudge),
            None => warn!("{key:?} is not an arrow key, ignored"),
        }
    }
    if !(card.width_px > 0.0 && card.height_px > 0.0) {
        return Err(anyhow!("card size must be positive"));
    }

    let estimate = card.finish(store.session_mut(), args.res_x, args.res_y)?;
    println!("{estimate}");

    if let Some(mut doc) = store.restore()? {
        estimate.apply_to(&mut doc.apparatus);
        store.autosave(&doc)?;
        info!("session document now uses the estimated monitor size");
    }
    Ok(())
}

fn snapshots(store_dir: &Path, command: SnapshotCommand) -> Result<()> {
    let mut store = session::open_workspace(store_dir)?;
    match command {
        SnapshotCommand::List => {
            for name in store.list_snapshots()? {
                println!("{name}");
            }
        }
        SnapshotCommand::Save { name, file } => {
            let doc = session::read_document(&file)?;
            store.save_snapshot(&name, &doc)?;
        }
        SnapshotCommand::Show { name } => {
            let doc = store
                .read_snapshot(&name)?
                .ok_or_else(|| anyhow!("no saved experiment named {name:?}"))?;
            println!("{}\n", doc.design.summary());
            println!("Stimuli:");
            for i in 0..doc.stimuli.len() {
                if let Some(line) = doc.stimulus_summary(i) {
                    println!("  {line}");
                }
            }
            println!("Procedure:");
            for i in 0..doc.procedure.len() {
                if let Some(line) = doc.step_summary(i) {
                    println!("  {}. {line}", i + 1);
                }
            }
            println!("\n{}", VisualAngle::describe(&doc.apparatus));
        }
    }
    Ok(())
}
