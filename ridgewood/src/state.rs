use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tui_dispatch_debug::debug::{ron_string, DebugSection, DebugState};

use crate::dialogue::DialoguePlayer;
use crate::dodge::{FieldItem, Projectile, Soul};
use crate::encounter::{self, ActOption, EncounterDef, EnemyTemplate, ItemStack};
use crate::rules::{self, Route};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum GameMode {
    Menu,
    Intro,
    Exploration,
    BattleStart,
    Battle,
    Victory,
    Ending,
    GameOver,
}

impl GameMode {
    pub fn label(self) -> &'static str {
        match self {
            GameMode::Menu => "menu",
            GameMode::Intro => "intro",
            GameMode::Exploration => "exploration",
            GameMode::BattleStart => "battleStart",
            GameMode::Battle => "battle",
            GameMode::Victory => "victory",
            GameMode::Ending => "ending",
            GameMode::GameOver => "gameover",
        }
    }

    pub fn needs_enemy(self) -> bool {
        matches!(self, GameMode::BattleStart | GameMode::Battle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BattlePhase {
    Menu,
    AttackPattern,
    Resolving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Command {
    Fight,
    Act,
    Item,
    Mercy,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Fight, Command::Act, Command::Item, Command::Mercy];

    pub fn label(self) -> &'static str {
        match self {
            Command::Fight => "FIGHT",
            Command::Act => "ACT",
            Command::Item => "ITEM",
            Command::Mercy => "MERCY",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BattleMenu {
    Commands,
    Acts,
    Items,
}

/// What the current attack-pattern window is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Pattern {
    Strike { base_roll: i32 },
    Counter,
}

/// Delayed battle steps. Each one carries the epoch it was scheduled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Timer {
    StrikeEnd,
    CounterAttack,
    CounterEnd,
}

impl Timer {
    pub const ALL: [Timer; 3] = [Timer::StrikeEnd, Timer::CounterAttack, Timer::CounterEnd];

    pub fn task_key(self) -> &'static str {
        match self {
            Timer::StrikeEnd => "battle_strike_end",
            Timer::CounterAttack => "battle_counter_attack",
            Timer::CounterEnd => "battle_counter_end",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BattleState {
    pub phase: BattlePhase,
    pub menu: BattleMenu,
    pub cursor: usize,
    pub pattern: Option<Pattern>,
    pub projectiles: Vec<Projectile>,
    pub soul: Soul,
    pub hits: u32,
}

impl Default for BattleState {
    fn default() -> Self {
        Self {
            phase: BattlePhase::Menu,
            menu: BattleMenu::Commands,
            cursor: 0,
            pattern: None,
            projectiles: Vec::new(),
            soul: Soul::default(),
            hits: 0,
        }
    }
}

impl BattleState {
    pub fn back_to_commands(&mut self) {
        self.phase = BattlePhase::Menu;
        self.menu = BattleMenu::Commands;
        self.cursor = 0;
        self.pattern = None;
        self.projectiles.clear();
        self.hits = 0;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlayerState {
    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    pub exp: u32,
    pub inventory: BTreeMap<String, ItemStack>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            hp: 20,
            max_hp: 20,
            level: 1,
            exp: 0,
            inventory: encounter::starting_inventory(),
        }
    }
}

impl PlayerState {
    /// Returns the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount.max(0)).min(self.max_hp);
        self.hp - before
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount.max(0)).max(0);
    }

    /// Adds exp and returns the levels gained.
    pub fn gain_exp(&mut self, amount: u32) -> u32 {
        self.exp = self.exp.saturating_add(amount);
        let mut gained = 0;
        while self.level < rules::MAX_LEVEL && self.exp >= rules::exp_to_next(self.level) {
            self.exp -= rules::exp_to_next(self.level);
            self.level += 1;
            self.max_hp = self
                .max_hp
                .saturating_add(rules::LEVEL_HP_GAIN)
                .min(rules::MAX_HP_CAP);
            gained += 1;
        }
        gained
    }

    /// Pulls every stat into the range a run can actually reach.
    pub fn clamp_into_range(&mut self) {
        self.max_hp = self.max_hp.clamp(1, rules::MAX_HP_CAP);
        self.hp = self.hp.clamp(0, self.max_hp);
        self.level = self.level.clamp(1, rules::MAX_LEVEL);
        self.exp = self.exp.min(rules::exp_to_next(self.level) - 1);
        for stack in self.inventory.values_mut() {
            stack.heal = stack.heal.clamp(0, rules::MAX_HP_CAP);
        }
    }

    pub fn add_item(&mut self, id: &str) {
        if let Some(stack) = self.inventory.get_mut(id) {
            stack.qty = stack.qty.saturating_add(1);
        } else if let Some(stack) = encounter::item_stack(id, 1) {
            self.inventory.insert(id.to_string(), stack);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Enemy {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub exp: u32,
    pub mercy_threshold: f64,
    pub acts: Vec<ActOption>,
    pub dialogue: Vec<String>,
    pub mood: i32,
    pub pacified: bool,
}

impl Enemy {
    pub fn from_template(template: &EnemyTemplate) -> Self {
        let max_hp = template.max_hp.max(1);
        Self {
            name: template.name.clone(),
            hp: max_hp,
            max_hp,
            attack: template.attack,
            defense: template.defense,
            exp: template.exp,
            mercy_threshold: template.mercy_threshold,
            acts: template.acts.clone(),
            dialogue: template.dialogue.clone(),
            mood: 0,
            pacified: false,
        }
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount.max(0)).max(0);
    }

    pub fn recover(&mut self, amount: i32) {
        self.hp = self.hp.saturating_add(amount.max(0)).min(self.max_hp);
    }

    pub fn clamp_into_range(&mut self) {
        self.max_hp = self.max_hp.clamp(1, rules::MAX_HP_CAP);
        self.hp = self.hp.clamp(0, self.max_hp);
        self.attack = self.attack.clamp(0, rules::MAX_STAT);
        self.defense = self.defense.clamp(0, rules::MAX_STAT);
        self.exp = self.exp.min(rules::MAX_EXP_REWARD);
        self.mood = self.mood.clamp(-rules::MAX_MOOD, rules::MAX_MOOD);
        self.mercy_threshold = rules::clamp_threshold(self.mercy_threshold);
        for act in &mut self.acts {
            act.mood = act.mood.clamp(-rules::MAX_MOOD, rules::MAX_MOOD);
        }
    }

    pub fn can_spare(&self) -> bool {
        self.pacified
            || self.mood >= rules::MOOD_TO_SPARE
            || rules::within_mercy_threshold(self.hp, self.max_hp, self.mercy_threshold)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppState {
    pub terminal_size: (u16, u16),
    pub mode: GameMode,
    pub encounters: Vec<EncounterDef>,
    pub encounter_index: usize,
    pub player: PlayerState,
    pub enemy: Option<Enemy>,
    pub battle: Option<BattleState>,
    pub field_items: Vec<FieldItem>,
    pub kills: u32,
    pub mercies: u32,
    pub ending: Option<Route>,
    pub dialogue: DialoguePlayer,
    pub message: Option<String>,
    pub message_serial: u64,
    pub epoch: u64,
    pub has_save: bool,
    pub rng_seed: u64,
    pub frame: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(encounter::builtin_table(), seed_from_time())
    }
}

impl AppState {
    pub fn new(encounters: Vec<EncounterDef>, seed: u64) -> Self {
        Self {
            terminal_size: (80, 24),
            mode: GameMode::Menu,
            encounters,
            encounter_index: 0,
            player: PlayerState::default(),
            enemy: None,
            battle: None,
            field_items: Vec::new(),
            kills: 0,
            mercies: 0,
            ending: None,
            dialogue: DialoguePlayer::default(),
            message: None,
            message_serial: 0,
            epoch: 0,
            has_save: false,
            rng_seed: seed,
            frame: 0,
        }
    }

    /// Back to a fresh run. Keeps the table, seed, and terminal size; bumps the epoch.
    pub fn reset_session(&mut self) {
        self.mode = GameMode::Menu;
        self.encounter_index = 0;
        self.player = PlayerState::default();
        self.enemy = None;
        self.battle = None;
        self.field_items.clear();
        self.kills = 0;
        self.mercies = 0;
        self.ending = None;
        self.dialogue.clear();
        self.message = None;
        self.epoch += 1;
    }

    pub fn current_encounter(&self) -> Option<&EncounterDef> {
        self.encounters.get(self.encounter_index)
    }

    pub fn total_encounters(&self) -> usize {
        self.encounters.len()
    }

    pub fn in_attack_pattern(&self) -> bool {
        self.mode == GameMode::Battle
            && self
                .battle
                .as_ref()
                .is_some_and(|battle| battle.phase == BattlePhase::AttackPattern)
    }

    pub fn inventory_ids(&self) -> Vec<String> {
        self.player.inventory.keys().cloned().collect()
    }
}

impl DebugState for AppState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut sections = vec![
            DebugSection::new("Mode")
                .entry("mode", ron_string(&self.mode))
                .entry("epoch", ron_string(&self.epoch))
                .entry("message", ron_string(&self.message)),
            DebugSection::new("Progress")
                .entry("encounter", ron_string(&self.encounter_index))
                .entry("kills", ron_string(&self.kills))
                .entry("mercies", ron_string(&self.mercies))
                .entry("ending", ron_string(&self.ending)),
            DebugSection::new("Player")
                .entry("hp", ron_string(&self.player.hp))
                .entry("max_hp", ron_string(&self.player.max_hp))
                .entry("level", ron_string(&self.player.level))
                .entry("exp", ron_string(&self.player.exp)),
        ];

        if let Some(enemy) = &self.enemy {
            sections.push(
                DebugSection::new("Enemy")
                    .entry("name", ron_string(&enemy.name))
                    .entry("hp", ron_string(&enemy.hp))
                    .entry("mood", ron_string(&enemy.mood))
                    .entry("pacified", ron_string(&enemy.pacified)),
            );
        }

        if let Some(battle) = &self.battle {
            sections.push(
                DebugSection::new("Battle")
                    .entry("phase", ron_string(&battle.phase))
                    .entry("menu", ron_string(&battle.menu))
                    .entry("pattern", ron_string(&battle.pattern))
                    .entry("projectiles", ron_string(&battle.projectiles.len()))
                    .entry("hits", ron_string(&battle.hits)),
            );
        }

        sections
    }
}

pub fn seed_from_time() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() << 32) ^ now.subsec_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heal_and_damage_clamp() {
        let mut player = PlayerState::default();
        player.take_damage(50);
        assert_eq!(player.hp, 0);
        assert_eq!(player.heal(100), player.max_hp);
        assert_eq!(player.hp, player.max_hp);
        assert_eq!(player.heal(5), 0);
    }

    #[test]
    fn level_up_raises_max_hp() {
        let mut player = PlayerState::default();
        assert_eq!(player.gain_exp(19), 0);
        assert_eq!(player.gain_exp(1), 1);
        assert_eq!(player.level, 2);
        assert_eq!(player.exp, 0);
        assert_eq!(player.max_hp, 24);
    }

    #[test]
    fn exp_and_heal_saturate() {
        let mut player = PlayerState {
            exp: u32::MAX - 1,
            ..PlayerState::default()
        };
        let gained = player.gain_exp(u32::MAX);
        assert_eq!(player.level, rules::MAX_LEVEL);
        assert_eq!(gained, rules::MAX_LEVEL - 1);
        assert!(player.max_hp <= rules::MAX_HP_CAP);

        player.max_hp = i32::MAX;
        player.hp = i32::MAX - 1;
        assert_eq!(player.heal(i32::MAX), 1);
        assert_eq!(player.hp, i32::MAX);
    }

    #[test]
    fn enemy_is_a_fresh_copy() {
        let table = encounter::builtin_table();
        let mut first = Enemy::from_template(&table[0].enemy);
        first.take_damage(10);
        first.mood = 5;
        let second = Enemy::from_template(&table[0].enemy);
        assert_eq!(second.hp, second.max_hp);
        assert_eq!(second.mood, 0);
        assert_eq!(table[0].enemy.max_hp, 30);
    }

    #[test]
    fn enemy_hp_clamps() {
        let table = encounter::builtin_table();
        let mut enemy = Enemy::from_template(&table[0].enemy);
        enemy.take_damage(999);
        assert_eq!(enemy.hp, 0);
        enemy.recover(999);
        assert_eq!(enemy.hp, enemy.max_hp);
    }

    #[test]
    fn spare_rules() {
        let table = encounter::builtin_table();
        let mut enemy = Enemy::from_template(&table[2].enemy);
        enemy.hp = 18;
        assert!(!enemy.can_spare());
        enemy.hp = 17;
        assert!(enemy.can_spare());
        enemy.hp = 80;
        enemy.mood = 3;
        assert!(enemy.can_spare());
        enemy.mood = 0;
        enemy.pacified = true;
        assert!(enemy.can_spare());
    }

    #[test]
    fn add_item_stacks() {
        let mut player = PlayerState::default();
        player.add_item("snack");
        assert_eq!(player.inventory["snack"].qty, 3);
        player.add_item("locket-cake");
        assert_eq!(player.inventory["locket-cake"].qty, 1);
    }
}
