use std::time::Duration;

use rodio::{source::SineWave, OutputStream, Sink, Source};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Cue {
    Start,
    Attack,
    Hit,
    Heal,
    Act,
    Pickup,
    MercySuccess,
    MercyFail,
    Victory,
    GameOver,
    Save,
    Load,
}

impl Cue {
    pub fn name(self) -> &'static str {
        match self {
            Cue::Start => "start",
            Cue::Attack => "attack",
            Cue::Hit => "hit",
            Cue::Heal => "heal",
            Cue::Act => "act",
            Cue::Pickup => "pickup",
            Cue::MercySuccess => "mercy-success",
            Cue::MercyFail => "mercy-fail",
            Cue::Victory => "victory",
            Cue::GameOver => "gameover",
            Cue::Save => "save",
            Cue::Load => "load",
        }
    }

    /// (frequency Hz, duration ms) per note.
    fn notes(self) -> &'static [(f32, u64)] {
        match self {
            Cue::Start => &[(440.0, 90), (660.0, 140)],
            Cue::Attack => &[(640.0, 140)],
            Cue::Hit => &[(180.0, 120)],
            Cue::Heal => &[(520.0, 80), (780.0, 120)],
            Cue::Act => &[(500.0, 100)],
            Cue::Pickup => &[(880.0, 60), (1100.0, 80)],
            Cue::MercySuccess => &[(523.0, 100), (659.0, 100), (784.0, 180)],
            Cue::MercyFail => &[(300.0, 90), (240.0, 140)],
            Cue::Victory => &[(660.0, 100), (880.0, 200)],
            Cue::GameOver => &[(330.0, 200), (220.0, 200), (165.0, 320)],
            Cue::Save => &[(700.0, 70)],
            Cue::Load => &[(600.0, 70), (700.0, 70)],
        }
    }
}

/// Plays on a throwaway thread. No output device means silence, never an error.
pub fn play_cue(cue: Cue) {
    std::thread::spawn(move || {
        let Ok((stream, handle)) = OutputStream::try_default() else {
            log::warn!("no audio output device, skipping cue {}", cue.name());
            return;
        };
        let Ok(sink) = Sink::try_new(&handle) else {
            log::warn!("failed to open audio sink for cue {}", cue.name());
            return;
        };
        for &(freq, ms) in cue.notes() {
            let source = SineWave::new(freq)
                .take_duration(Duration::from_millis(ms))
                .amplify(0.18);
            sink.append(source);
        }
        sink.sleep_until_end();
        drop(stream);
    });
}
