//! Skirmish headless host.
//!
//! Runs the authoritative arena plus a set of scripted bots over the
//! in-process loopback transport, each participant with its own Rapier
//! scene, and logs match status at a fixed interval.
//!
//! Run with: `cargo run -p skirmish-server -- --bots 4 --ticks 7200`

mod bots;
mod scene;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use skirmish_combat::{Arena, TracingSink};
use skirmish_config::{CliArgs, Config};
use skirmish_multiplayer::{FixedTickSchedule, SessionContext};
use skirmish_net::{LoopbackHub, Transport};
use skirmish_physics::MovementInput;
use tracing::{error, info, warn};

use crate::bots::{Bot, BotProfile};

/// Seconds of simulated time between status reports.
const REPORT_INTERVAL_SECS: u64 = 10;

/// Longest wall-clock gap fed to the schedule in one go when pacing.
const MAX_FRAME_TIME: f64 = 0.25;

/// CLI arguments for the server binary.
#[derive(Parser, Debug)]
#[command(name = "skirmish-server", about = "Headless Skirmish host with scripted bots")]
struct ServerArgs {
    /// Scripted bots joining the session.
    #[arg(long, default_value_t = 3)]
    bots: usize,

    /// Ticks to simulate before shutting down.
    #[arg(long, default_value_t = 3600)]
    ticks: u64,

    /// Pace ticks against the wall clock instead of running flat out.
    #[arg(long)]
    realtime: bool,

    /// Probability that a bot's shot is reported as a hit.
    #[arg(long, default_value_t = 0.25)]
    hit_chance: f32,

    #[command(flatten)]
    common: CliArgs,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skirmish")
}

fn main() {
    let args = ServerArgs::parse();

    let config_dir = args.common.config.clone().unwrap_or_else(default_config_dir);
    let (mut config, load_error) = match Config::load_or_create(&config_dir) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    config.apply_cli_overrides(&args.common);

    skirmish_log::init_logging(Some(&config_dir), cfg!(debug_assertions), Some(&config));
    if let Some(err) = load_error {
        warn!("Using default config, {} unusable: {err}", config_dir.display());
    }
    if let Err(err) = config.validate() {
        error!("Refusing to start: {err}");
        std::process::exit(2);
    }

    info!("Skirmish server");
    info!(
        "Tick rate: {} Hz | Respawn delay: {:.1}s | Max health: {:.0} | Seed: {}",
        config.session.tick_rate,
        config.session.respawn_delay_secs,
        config.combat.max_health,
        config.session.rng_seed,
    );
    info!(
        "Weapon: {} | damage={:.0} clip={} reserve={} rpm={:.0}",
        config.weapon.name,
        config.weapon.damage,
        config.weapon.clip_size,
        config.weapon.starting_reserve,
        config.weapon.fire_rate_rpm,
    );

    let mut schedule = FixedTickSchedule::with_tick_rate(config.session.tick_rate);
    let dt = schedule.tick_duration_secs();

    let hub = LoopbackHub::with_duplicate_delivery(config.network.duplicate_delivery);
    let host_endpoint = hub.connect();
    let host_id = host_endpoint.local_id();
    let mut host = Arena::new(config.clone(), SessionContext::host(host_id))
        .with_physics(scene::build(dt as f32))
        .with_transport(host_endpoint)
        .with_sink(TracingSink);

    let max_bots = (config.network.max_participants as usize).saturating_sub(1);
    if args.bots > max_bots {
        warn!("Requested {} bots, session holds {max_bots}", args.bots);
    }
    let profile = BotProfile {
        hit_chance: args.hit_chance.clamp(0.0, 1.0),
        ..Default::default()
    };
    let mut bots: Vec<Bot> = (0..args.bots.min(max_bots))
        .map(|_| {
            let endpoint = hub.connect();
            let ctx = SessionContext::observer(endpoint.local_id(), host_id);
            let arena = Arena::new(config.clone(), ctx)
                .with_physics(scene::build(dt as f32))
                .with_transport(endpoint)
                .with_sink(TracingSink);
            Bot::new(arena, profile, config.session.rng_seed)
        })
        .collect();
    info!("Host {host_id} with {} bots on {:?}", bots.len(), hub.participants());

    let idle = MovementInput::default();
    let report_every = u64::from(config.session.tick_rate.max(1)) * REPORT_INTERVAL_SECS;
    let started = Instant::now();
    let mut last_frame = started;
    let mut tick = 0u64;

    while tick < args.ticks {
        let due = if args.realtime {
            let now = Instant::now();
            let mut frame = now.duration_since(last_frame).as_secs_f64();
            last_frame = now;
            if frame > MAX_FRAME_TIME {
                warn!("Frame time {frame:.3}s clamped to {MAX_FRAME_TIME}s");
                frame = MAX_FRAME_TIME;
            }
            schedule.accumulate(frame)
        } else {
            schedule.accumulate(dt)
        };

        for _ in 0..due {
            host.tick(dt, &idle);
            for bot in &mut bots {
                bot.step(dt);
            }
            tick += 1;
            if tick % report_every == 0 {
                report_status(&host, tick);
            }
            if tick >= args.ticks {
                break;
            }
        }

        if args.realtime && due == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    report_status(&host, tick);
    report_summary(&host, &bots, started.elapsed());
}

fn report_status(host: &Arena, tick: u64) {
    let stats = host.stats();
    info!(
        "Tick {tick} ({:.1}s) | kills={} respawns={}",
        host.clock(),
        stats.kills,
        stats.respawns,
    );
    for id in host.actor_ids() {
        let Some(actor) = host.actor(id) else {
            continue;
        };
        info!(
            "  {id}: health={:.0}{} clip={} reserve={}{}",
            actor.health.current(),
            if actor.health.is_dead() { " (dead)" } else { "" },
            actor.weapon.clip(),
            actor.weapon.reserve(),
            if actor.weapon.is_reloading() { " reloading" } else { "" },
        );
    }
}

fn report_summary(host: &Arena, bots: &[Bot], wall: Duration) {
    info!(
        "Simulated {:.1}s in {:.2}s wall time",
        host.clock(),
        wall.as_secs_f64()
    );
    for bot in bots {
        let stats = bot.arena().stats();
        info!(
            "{}: shots={} hits_reported={} duplicates_dropped={}",
            bot.id(),
            stats.shots_fired,
            stats.hits_reported,
            bot.arena().duplicate_rpcs(),
        );
    }

    let diverged = bots
        .iter()
        .flat_map(|bot| host.actor_ids().into_iter().map(move |id| (bot, id)))
        .filter(|(bot, id)| {
            let canonical = host.actor(*id).map(|actor| actor.health.current());
            let mirrored = bot.arena().actor(*id).map(|actor| actor.health.current());
            canonical != mirrored
        })
        .count();
    if diverged > 0 {
        warn!("{diverged} health mirrors differ from the host at shutdown");
    } else {
        info!("All health mirrors match the host");
    }
}
