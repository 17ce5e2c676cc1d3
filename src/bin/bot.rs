//! Headless scene participant
//!
//! Connects to the relay, wanders around with the same locomotion controller
//! and animation machine a rendered client uses, and logs what the other
//! participants are doing. Handy for exercising a relay without a browser.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::signal;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use avatar_sync::client::{
    headless_animation, KeyEvent, LocalPlayer, LogicalKey, RemoteAvatars, TransportSession,
    WeightMixer,
};
use avatar_sync::config::ClientConfig;
use avatar_sync::VERSION;

/// How often the peer summary is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

const DIRECTIONS: [LogicalKey; 4] = [
    LogicalKey::Forward,
    LogicalKey::Backward,
    LogicalKey::Left,
    LogicalKey::Right,
];

/// Random walk: hold one direction (or none) for a while, then pick again
struct Wander {
    rng: StdRng,
    held: Option<LogicalKey>,
    running: bool,
    next_change: Instant,
}

impl Wander {
    fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            held: None,
            running: false,
            next_change: Instant::now(),
        }
    }

    /// Release the old keys and press new ones when the current leg is over
    fn step(&mut self, player: &mut LocalPlayer<WeightMixer>, now: Instant) {
        if now < self.next_change {
            return;
        }

        if let Some(key) = self.held.take() {
            player.handle_key(KeyEvent::Released(key));
        }
        if self.running {
            player.handle_key(KeyEvent::Released(LogicalKey::Run));
            self.running = false;
        }

        if self.rng.gen_bool(0.8) {
            let key = DIRECTIONS[self.rng.gen_range(0..DIRECTIONS.len())];
            if self.rng.gen_bool(0.3) {
                player.handle_key(KeyEvent::Pressed(LogicalKey::Run));
                self.running = true;
            }
            player.handle_key(KeyEvent::Pressed(key));
            self.held = Some(key);
        }

        if self.rng.gen_bool(0.1) {
            player.handle_key(KeyEvent::Pressed(LogicalKey::Jump));
            player.handle_key(KeyEvent::Released(LogicalKey::Jump));
        }

        player.look(self.rng.gen_range(-1.0..1.0), 0.0);

        let leg = Duration::from_millis(self.rng.gen_range(1000..3000));
        self.next_change = now + leg;
        debug!(held = ?self.held, running = self.running, ?leg, "Bot changed course");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Avatar Sync bot v{}", VERSION);

    let config = ClientConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    let avatars = Arc::new(RemoteAvatars::new(headless_animation));
    let mut session = TransportSession::connect(&config.endpoint, Arc::clone(&avatars))
        .await
        .with_context(|| format!("Failed to connect to {}", config.endpoint))?;

    let mut player = LocalPlayer::new(headless_animation());
    let mut wander = Wander::new();

    let dt = config.frame_step();
    let mut frames = interval(Duration::from_secs_f32(dt));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status = interval(STATUS_INTERVAL);

    let deadline = (config.run_duration_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.run_duration_secs));
    let run_until = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(run_until);

    loop {
        tokio::select! {
            now = frames.tick() => {
                if !session.is_open() {
                    warn!("Relay connection lost");
                    break;
                }
                if player.controller().has_landed() {
                    wander.step(&mut player, now);
                }
                let snapshot = player.frame(dt);
                if let Err(e) = session.send(&snapshot) {
                    warn!(error = %e, "Failed to queue snapshot");
                }
                avatars.tick(dt);
            }
            _ = status.tick() => {
                let pose = player.controller().ground_position();
                info!(
                    own_id = ?avatars.local_id(),
                    peers = avatars.len(),
                    x = pose.x,
                    z = pose.z,
                    action = %player.animation().current(),
                    "Bot status"
                );
                for id in avatars.ids() {
                    if let Some(snapshot) = avatars.snapshot(&id) {
                        debug!(
                            connection_id = %id,
                            x = snapshot.position.x,
                            z = snapshot.position.z,
                            action = %snapshot.current_action_name,
                            "Peer"
                        );
                    }
                }
            }
            _ = &mut run_until => {
                info!("Run duration elapsed");
                break;
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving scene...");
                break;
            }
        }
    }

    session.close().await;
    info!("Bot stopped");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,avatar_sync=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();
}
