use crate::audio::Cue;
use crate::persist::SaveRecord;
use crate::state::Timer;

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    ScheduleTimer { timer: Timer, epoch: u64, delay_ms: u64 },
    CancelTimers,
    ScheduleMessageExpiry { serial: u64, delay_ms: u64 },
    PlayCue(Cue),

    // Save/Load
    CheckSaveExists,
    SaveGame { record: Box<SaveRecord> },
    LoadGame,
}
