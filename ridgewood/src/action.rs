use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::persist::{LoadFailure, SaveRecord};
use crate::state::{Direction, Timer};

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[action(infer_categories)]
pub enum Action {
    Init,
    UiTerminalResize(u16, u16),
    Frame,

    Start,
    DialogueAdvance,
    Reset,

    // Battle commands
    BattleMenuNext,
    BattleMenuPrev,
    BattleConfirm,
    BattleCancel,
    BattleFight,
    BattleAct(usize),
    BattleItem(String),
    BattleMercy,

    SoulInput(Direction),

    TimerFired { timer: Timer, epoch: u64 },
    MessageExpired { serial: u64 },

    // Save/Load actions
    SaveExists(bool),
    SaveGame,
    SaveComplete,
    SaveError(String),
    LoadGame,
    LoadComplete(Box<SaveRecord>),
    LoadError(LoadFailure),

    Quit,
}
