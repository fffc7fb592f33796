//! Helix Drop headless driver
//!
//! Plays one level against the reference physics world with scripted drag
//! input and logs the outcome.
//!
//! Usage: `helix-drop [tuning.json] [seed]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::path::Path;

    use glam::Vec2;
    use helix_drop::Tuning;
    use helix_drop::sim::{DragInput, EventRecorder, Game, GameEvent, SimplePhysics};

    /// Presentation frame rate of the scripted run
    const FRAME_DT: f32 = 1.0 / 60.0;
    /// Give up after this much wall-clock time
    const MAX_SECONDS: f32 = 120.0;

    env_logger::init();

    let mut args = std::env::args().skip(1);
    let mut tuning = match args.next() {
        Some(path) => Tuning::load_or_default(Path::new(&path)),
        None => Tuning::default(),
    };
    if let Some(seed) = args.next() {
        match seed.parse::<u64>() {
            Ok(seed) => tuning.level.seed = seed,
            Err(e) => log::warn!("Ignoring seed {:?}: {}", seed, e),
        }
    }
    log::info!("Helix Drop (headless) starting, seed={:#x}", tuning.level.seed);

    let recorder = EventRecorder::new();
    let mut game = Game::new(tuning, SimplePhysics::new(), "Level1");
    game.subscribe(&recorder);

    // Fixed-step accumulator lives in Game::advance
    let mut elapsed = 0.0;
    while !game.is_over() && elapsed < MAX_SECONDS {
        game.advance(FRAME_DT, scripted_drag(elapsed, Vec2::new(-1.5, 0.0)));
        elapsed += FRAME_DT;

        for event in recorder.drain() {
            if let GameEvent::ScoreChanged { score, multiplier } = event {
                log::debug!("score={} x{}", score, multiplier);
            }
        }
    }

    let broken = game
        .tower()
        .rings()
        .iter()
        .filter(|r| r.is_broken())
        .count();
    match game.session().state().final_score {
        Some(score) => {
            let outcome = if game.session().state().failed {
                "failed"
            } else {
                "cleared"
            };
            println!(
                "{} {} after {:.1}s: score={}, rings broken={}",
                game.session().level(),
                outcome,
                elapsed,
                score,
                broken
            );
        }
        None => println!(
            "{} still running after {:.0}s: score={}, rings broken={}",
            game.session().level(),
            MAX_SECONDS,
            game.score().score(),
            broken
        ),
    }

    /// Short drag every two seconds, released otherwise
    fn scripted_drag(t: f32, delta: Vec2) -> DragInput {
        if t % 2.0 < 0.3 {
            DragInput::held(delta)
        } else {
            DragInput::released()
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // No headless driver on the web
}
