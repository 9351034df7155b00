use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result of pressing "continue" on the dialogue box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next line.
    Line,
    /// Walked past the last line. Reported once per sequence.
    Exhausted,
    /// Nothing is playing.
    Idle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DialoguePlayer {
    lines: Vec<String>,
    cursor: usize,
    exhausted: bool,
}

impl Default for DialoguePlayer {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            cursor: 0,
            exhausted: true,
        }
    }
}

impl DialoguePlayer {
    pub fn play(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.cursor = 0;
        self.exhausted = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        !self.exhausted
    }

    pub fn current(&self) -> Option<&str> {
        if self.exhausted {
            return None;
        }
        self.lines.get(self.cursor).map(String::as_str)
    }

    /// 1-based position and total, for the "2/4" hint.
    pub fn position(&self) -> (usize, usize) {
        ((self.cursor + 1).min(self.lines.len()), self.lines.len())
    }

    pub fn advance(&mut self) -> Advance {
        if self.exhausted {
            return Advance::Idle;
        }
        self.cursor += 1;
        if self.cursor >= self.lines.len() {
            self.exhausted = true;
            Advance::Exhausted
        } else {
            Advance::Line
        }
    }
}
