//! Dream Shatter headless driver
//!
//! Runs one dream with a seeded autoplay bot and prints a JSON run summary.
//!
//! Usage: `dream-shatter [SEED] [SECONDS] [SETTINGS.json]`

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use dream_shatter::consts::*;
use dream_shatter::sim::{BossEvent, DreamRun, PerformanceTelemetry, SimEvent, TickInput};
use dream_shatter::Settings;

/// Scripted player: holds the required keys with some skill, misses sometimes
struct Bot {
    rng: Pcg32,
    skill: f32,
    combo: u32,
}

impl Bot {
    fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            skill: 0.6,
            combo: 0,
        }
    }

    fn input_for(&mut self, run: &DreamRun) -> TickInput {
        let mut input = TickInput::default();
        let held: Vec<char> = run.tracker().active_keys().collect();

        // Let go of everything now and then so coherence can re-arm
        if !held.is_empty() && self.rng.random::<f32>() < 0.04 {
            input.releases = held.clone();
        }

        for &key in run.tracker().required() {
            if held.contains(&key) {
                continue;
            }
            if self.rng.random::<f32>() < 0.05 * self.skill {
                input.holds.push((key, self.rng.random_range(0.6..=1.0)));
                self.combo += 1;
            } else if self.rng.random::<f32>() < 0.006 {
                input.misses.push(key);
                self.combo = 0;
            }
        }

        if run.boss().is_active() {
            input.boss_grip = Some(self.skill);
            input.counter_pulses = u32::from(self.rng.random::<f32>() < self.skill);
        }

        input.telemetry = Some(PerformanceTelemetry {
            panic: run.tension() * 100.0,
            combo: self.combo,
            wave: 0,
            boss_active: run.boss().is_active(),
        });
        input
    }
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let seed = args.next().unwrap_or_else(|| "lucid".to_string());
    let seconds: f32 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(120.0);
    let settings = args
        .next()
        .map(Settings::load_from)
        .unwrap_or_default();

    log::info!("Dream Shatter (headless) starting: seed '{seed}', {seconds}s");

    let mut run = DreamRun::new(settings);
    let dream = run.spawn_dream_from_seed(&seed);
    log::info!(
        "Archetype {}, boss threshold {:.3}",
        dream.kind().as_str(),
        dream.live.boss_threshold
    );
    let mut bot = Bot::new(u64::from(dream.seed_hash));

    // Fixed-step loop fed by a simulated 144 Hz frame clock
    let frame_dt = 1.0 / 144.0;
    let mut accumulator = 0.0;
    let mut clock = 0.0;
    'frames: while clock < seconds {
        clock += frame_dt;
        accumulator += frame_dt;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let input = bot.input_for(&run);
            for event in run.tick(SIM_DT, &input) {
                match event {
                    SimEvent::Shatter => {
                        log::info!("Shattered at {:.1}s", clock);
                        break 'frames;
                    }
                    SimEvent::Boss(BossEvent::Resolved(outcome)) => {
                        log::info!("Boss resolved: {outcome:?}");
                    }
                    SimEvent::Director(tr) => {
                        log::debug!("Director {:?} -> {:?}", tr.from, tr.to);
                    }
                    _ => {}
                }
            }
            accumulator -= SIM_DT;
            substeps += 1;
        }
    }

    match run.summary().map(|s| serde_json::to_string_pretty(&s)) {
        Some(Ok(json)) => println!("{json}"),
        Some(Err(e)) => log::error!("Failed to serialize summary: {e}"),
        None => log::error!("No dream was running"),
    }
}
