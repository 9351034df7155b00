use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::Terminal;
use tui_dispatch::{
    EffectContext, EffectStoreLike, EffectStoreWithMiddleware, EventOutcome, RenderContext, TaskKey,
};
use tui_dispatch_debug::debug::DebugLayer;
use tui_dispatch_debug::{DebugCliArgs, DebugRunOutput, DebugSession, DebugSessionError, ReplayItem};

use ridgewood::action::Action;
use ridgewood::effect::Effect;
use ridgewood::reducer::reducer;
use ridgewood::state::{AppState, Timer};
use ridgewood::{audio, encounter, persist, ui};

#[derive(Parser, Debug)]
#[command(name = "ridgewood")]
#[command(about = "Grim Greaser: story dialogue and soul-dodge battles in the terminal")]
struct Args {
    #[command(flatten)]
    debug: DebugCliArgs,
    /// Directory holding save.json (defaults to the local data dir)
    #[arg(long)]
    save_dir: Option<PathBuf>,
    /// RON encounter table to play instead of the built-in one
    #[arg(long)]
    encounters: Option<PathBuf>,
    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    mute: bool,
    /// Milliseconds between simulation frames
    #[arg(long, default_value_t = 33, value_parser = clap::value_parser!(u64).range(10..))]
    frame_ms: u64,
    /// Write logs here (RUST_LOG filters, default info)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct RuntimeConfig {
    save_path: PathBuf,
    mute: bool,
    frame_ms: u64,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let debug = DebugSession::new(args.debug);
    debug.save_state_schema::<AppState>().map_err(debug_error)?;
    debug.save_actions_schema::<Action>().map_err(debug_error)?;

    let config = RuntimeConfig {
        save_path: persist::save_file_path(args.save_dir.as_deref()),
        mute: args.mute,
        frame_ms: args.frame_ms,
    };

    let encounters = match args.encounters.as_deref() {
        Some(path) => encounter::load_table(path)
            .await
            .map_err(|e| io::Error::other(e.to_string()))?,
        None => encounter::builtin_table(),
    };
    log::info!("starting with {} encounters", encounters.len());

    let seed = args.seed;
    let state = debug
        .load_state_or_else_async(move || {
            let encounters = encounters.clone();
            async move {
                let seed = seed.unwrap_or_else(ridgewood::state::seed_from_time);
                Ok::<AppState, io::Error>(AppState::new(encounters, seed))
            }
        })
        .await
        .map_err(debug_error)?;

    let replay_actions = debug.load_replay_items().map_err(debug_error)?;
    let (middleware, recorder) = debug.middleware_with_recorder();
    let store = EffectStoreWithMiddleware::new(state, reducer, middleware);

    let use_alt_screen = debug.use_alt_screen();
    let mut stdout = io::stdout();
    if use_alt_screen {
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    }
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &debug, store, replay_actions, config).await;

    if use_alt_screen {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
    }

    let run_output = result?;
    run_output.write_render_output()?;
    debug.save_actions(recorder.as_ref()).map_err(debug_error)?;
    Ok(())
}

fn init_logging(path: Option<&Path>) -> io::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(logger_error)
}

fn logger_error(error: log::SetLoggerError) -> io::Error {
    io::Error::other(format!("logger init error: {error}"))
}

fn debug_error(error: DebugSessionError) -> io::Error {
    io::Error::other(format!("debug session error: {error}"))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    debug: &DebugSession,
    store: impl EffectStoreLike<AppState, Action, Effect>,
    replay_actions: Vec<ReplayItem<Action>>,
    config: RuntimeConfig,
) -> io::Result<DebugRunOutput<AppState>> {
    let config = Arc::new(config);
    let frame_ms = config.frame_ms;
    debug
        .run_effect_app(
            terminal,
            store,
            DebugLayer::simple(),
            replay_actions,
            Some(Action::Init),
            Some(Action::Quit),
            |runtime| {
                if debug.render_once() {
                    return;
                }
                runtime
                    .subscriptions()
                    .interval("frame", Duration::from_millis(frame_ms), || Action::Frame);
            },
            |frame, area, state, render_ctx: RenderContext| {
                ui::render(frame, area, state, render_ctx);
            },
            |event, state| -> EventOutcome<Action> { ui::handle_event(event, state) },
            |action| matches!(action, Action::Quit),
            move |effect, ctx| handle_effect(effect, ctx, config.clone()),
        )
        .await
}

fn handle_effect(effect: Effect, ctx: &mut EffectContext<Action>, config: Arc<RuntimeConfig>) {
    match effect {
        Effect::ScheduleTimer {
            timer,
            epoch,
            delay_ms,
        } => {
            ctx.tasks().spawn(TaskKey::new(timer.task_key()), async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Action::TimerFired { timer, epoch }
            });
        }
        Effect::CancelTimers => {
            for timer in Timer::ALL {
                ctx.tasks().cancel(&TaskKey::new(timer.task_key()));
            }
        }
        Effect::ScheduleMessageExpiry { serial, delay_ms } => {
            ctx.tasks().spawn(TaskKey::new("message_expiry"), async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Action::MessageExpired { serial }
            });
        }
        Effect::PlayCue(cue) => {
            if !config.mute {
                audio::play_cue(cue);
            }
        }
        Effect::CheckSaveExists => {
            let path = config.save_path.clone();
            ctx.tasks().spawn(TaskKey::new("save_check"), async move {
                Action::SaveExists(persist::save_exists(&path).await)
            });
        }
        Effect::SaveGame { record } => {
            let path = config.save_path.clone();
            ctx.tasks().spawn(TaskKey::new("save"), async move {
                match persist::save_record(&path, &record).await {
                    Ok(()) => Action::SaveComplete,
                    Err(e) => {
                        log::warn!("save failed: {e}");
                        Action::SaveError(e.to_string())
                    }
                }
            });
        }
        Effect::LoadGame => {
            let path = config.save_path.clone();
            ctx.tasks().spawn(TaskKey::new("load"), async move {
                match persist::load_record(&path).await {
                    Ok(record) => Action::LoadComplete(Box::new(record)),
                    Err(e) => {
                        log::warn!("load failed: {e}");
                        Action::LoadError(e.into())
                    }
                }
            });
        }
    }
}
