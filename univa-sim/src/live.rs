//! Real-time driver: ticks the engine from a wall-clock interval, lets a
//! scripted player act, and keeps the save directory current.
use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use univa_game::{ActionError, Catalog, EconomyConfig, GameEngine, GameEvent};

use crate::logic::GameplayStrategy;
use crate::storage::FileStorage;

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub save_dir: PathBuf,
    pub strategy: GameplayStrategy,
    pub seed: u64,
    /// Wall-clock time between ticks.
    pub tick: Duration,
    /// Run-clock seconds per wall-clock second.
    pub speed: f64,
    /// Wall-clock time between forced saves.
    pub save_every: Duration,
    /// Stop after this long; run until Ctrl-C when absent.
    pub duration: Option<Duration>,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveReport {
    pub ticks: u64,
    pub clock: f64,
    pub reach: f64,
    pub interrupted: bool,
}

fn describe(event: &GameEvent) -> Option<ColoredString> {
    let line = match event {
        GameEvent::CataclysmApproaching { kind } => {
            format!("☄️  {kind:?} approaching").yellow()
        }
        GameEvent::CataclysmCrisis { kind } => format!("🚨 {kind:?} crisis").red().bold(),
        GameEvent::Evacuated {
            kind,
            currency,
            gain,
        } => format!("🚀 Evacuated {kind:?}: +{gain} {currency:?}").green().bold(),
        GameEvent::KardashevAdvanced { tier } => {
            format!("🌌 Kardashev tier {tier}").cyan().bold()
        }
        GameEvent::ProjectCompleted { key } => format!("🏗️  Project {key} complete").cyan(),
        GameEvent::ChallengeCompleted { key, completions } => {
            format!("🏆 Challenge {key} x{completions}").green()
        }
        GameEvent::ChallengeFailed { key, reason } => {
            format!("💥 Challenge {key} failed: {reason:?}").red()
        }
        GameEvent::RunAchievementUnlocked { achievement } => {
            format!("⭐ {achievement:?} unlocked").bright_yellow()
        }
        GameEvent::HeroRankUp { key, rank } => format!("🎖️  {key} rank {rank}").magenta(),
        GameEvent::HeroBadgeUp { key, name, .. } => format!("🏅 {key} {name} badge").magenta(),
        _ => return None,
    };
    Some(line)
}

/// Play in real time until the duration elapses or Ctrl-C arrives, then save.
///
/// # Errors
///
/// Returns an error if the save directory is unusable or a save fails.
pub async fn run_live(
    options: &LiveOptions,
    catalog: Arc<Catalog>,
    config: EconomyConfig,
) -> Result<LiveReport> {
    let storage = FileStorage::open(&options.save_dir)
        .with_context(|| format!("opening save dir {}", options.save_dir.display()))?;
    let quiet = options.quiet;
    let mut engine =
        GameEngine::boot(storage, catalog, config)?.with_sink(move |event: &GameEvent| {
            if !quiet && let Some(line) = describe(event) {
                println!("{line}");
            }
        });
    let mut policy = options.strategy.create_policy(options.seed);
    log::info!(
        "live session from clock {:.1}s with {} player",
        engine.session().run().clock,
        policy.name()
    );

    let mut ticker = time::interval(options.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut saver = time::interval_at(Instant::now() + options.save_every, options.save_every);
    let stop = async {
        match options.duration {
            Some(duration) => time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last = Instant::now();
    let mut ticks = 0_u64;
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64() * options.speed;
                last = now;
                engine.tick(dt)?;
                let _ = engine.act(|session| Ok::<_, ActionError>(policy.act(session)))?;
                ticks += 1;
            }
            _ = saver.tick() => {
                engine.save()?;
            }
            result = &mut ctrl_c => {
                result.context("listening for Ctrl-C")?;
                interrupted = true;
                break;
            }
            () = &mut stop => break,
        }
    }

    engine.save()?;
    let run = engine.session().run();
    log::info!("live session stopped at clock {:.1}s", run.clock);
    Ok(LiveReport {
        ticks,
        clock: run.clock,
        reach: run.reach,
        interrupted,
    })
}
