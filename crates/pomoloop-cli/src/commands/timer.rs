use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use pomoloop_core::duration::{self, format_clock};
use pomoloop_core::{
    AnalyticsLog, Config, DurationError, Event, ExitCoordinator, PhaseKind, PhaseScheduler,
    Player, Result, SessionOverrides, SessionSettings, Supervisor,
};

#[derive(Args, Debug, Default)]
pub struct TimerArgs {
    /// Work phase length, e.g. 25m or 1h30m (default from config)
    #[arg(short, long, value_name = "DUR", value_parser = parse_duration)]
    work: Option<Duration>,
    /// Break phase length, e.g. 5m (default from config)
    #[arg(short = 'b', long = "break", value_name = "DUR", value_parser = parse_duration)]
    break_: Option<Duration>,
    /// Run the timer without background music
    #[arg(long)]
    silent: bool,
    /// Shuffle tracks instead of playing them in name order
    #[arg(long)]
    shuffle: bool,
    /// Play from a named collection under the collections directory
    #[arg(long, value_name = "NAME")]
    collection: Option<String>,
}

fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    duration::parse(input)
}

impl From<TimerArgs> for SessionOverrides {
    fn from(args: TimerArgs) -> Self {
        Self {
            work: args.work,
            break_: args.break_,
            silent: args.silent,
            shuffle: args.shuffle,
            collection: args.collection,
        }
    }
}

fn label(kind: PhaseKind) -> &'static str {
    match kind {
        PhaseKind::Work => "WORK",
        PhaseKind::Break => "BREAK",
    }
}

/// Keep the countdown on one line of stdout.
fn render(event: &Event) {
    let mut out = std::io::stdout().lock();
    let _ = match event {
        Event::Countdown {
            kind,
            remaining_secs,
        } => write!(out, "\r{:<5} {}", label(*kind), format_clock(*remaining_secs)),
        Event::PhaseCompleted { kind, .. } => {
            writeln!(out, "\r{:<5} {}", label(*kind), format_clock(0))
        }
        _ => Ok(()),
    };
    let _ = out.flush();
}

/// Run work/break phases until a signal arrives.
pub fn run(args: TimerArgs) -> Result<()> {
    let mut config = Config::load()?;
    config.apply_env();

    let settings = SessionSettings::resolve(&config, args.into())?;
    let player = if settings.needs_player() {
        Some(Player::detect(&config.audio.player, &config.audio.player_args)?)
    } else {
        None
    };
    tracing::info!(
        work_secs = settings.work.as_secs(),
        break_secs = settings.break_.as_secs(),
        silent = settings.silent,
        player = player.as_ref().map(Player::name).unwrap_or("none"),
        "session starting"
    );

    let supervisor = Arc::new(Supervisor::new(player, settings.supervisor_options()));
    supervisor.reconcile_orphans();
    let guard = ExitCoordinator::install(supervisor.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let coordinator = Arc::clone(guard.coordinator());
    let recorder = AnalyticsLog::new(config.analytics.log);

    runtime.block_on(async move {
        coordinator.spawn_signal_listener()?;
        let mut scheduler =
            PhaseScheduler::new(settings, supervisor, recorder).with_observer(render);
        scheduler.run().await;
        Ok::<_, std::io::Error>(())
    })?;

    drop(guard);
    Ok(())
}
