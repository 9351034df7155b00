use tui_dispatch::DispatchResult;

use crate::action::Action;
use crate::audio::Cue;
use crate::dialogue::Advance;
use crate::dodge::{self, FieldItem, FIELD_ITEM_RADIUS};
use crate::effect::Effect;
use crate::encounter;
use crate::persist::{LoadFailure, SaveRecord};
use crate::rules;
use crate::state::{
    AppState, BattleMenu, BattlePhase, BattleState, Command, Direction, Enemy, GameMode, Pattern,
    Timer,
};

pub const STRIKE_WINDOW_MS: u64 = 2200;
pub const COUNTER_DELAY_MS: u64 = 600;
pub const MESSAGE_MS: u64 = 1600;
const FIELD_ITEM_CHANCE: u32 = 50;
const FALLING_SPAWN_CHANCE: u32 = 4;

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::Init => {
            state.mode = GameMode::Menu;
            DispatchResult::changed_with(Effect::CheckSaveExists)
        }
        Action::UiTerminalResize(width, height) => {
            if state.terminal_size != (width, height) {
                state.terminal_size = (width, height);
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }
        Action::Frame => frame(state),
        Action::Start => start_game(state),
        Action::DialogueAdvance => advance_dialogue(state),
        Action::Reset => reset(state),

        Action::BattleMenuNext => battle_menu_change(state, 1),
        Action::BattleMenuPrev => battle_menu_change(state, -1),
        Action::BattleConfirm => battle_confirm(state),
        Action::BattleCancel => battle_cancel(state),
        Action::BattleFight => fight(state),
        Action::BattleAct(index) => act(state, index),
        Action::BattleItem(id) => use_item(state, &id),
        Action::BattleMercy => mercy(state),

        Action::SoulInput(direction) => soul_input(state, direction),
        Action::TimerFired { timer, epoch } => timer_fired(state, timer, epoch),
        Action::MessageExpired { serial } => {
            if serial == state.message_serial && state.message.is_some() {
                state.message = None;
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }

        Action::SaveExists(exists) => {
            state.has_save = exists;
            DispatchResult::changed()
        }
        Action::SaveGame => {
            if state.mode == GameMode::Menu {
                let mut effects = Vec::new();
                say(state, "Nothing to save yet.", &mut effects);
                return DispatchResult::changed_with_many(effects);
            }
            DispatchResult::changed_with(Effect::SaveGame {
                record: Box::new(SaveRecord::capture(state)),
            })
        }
        Action::SaveComplete => {
            state.has_save = true;
            let mut effects = vec![Effect::PlayCue(Cue::Save)];
            say(state, "Game saved.", &mut effects);
            DispatchResult::changed_with_many(effects)
        }
        Action::SaveError(error) => {
            let mut effects = Vec::new();
            say(state, &format!("Save failed: {}", error), &mut effects);
            DispatchResult::changed_with_many(effects)
        }
        Action::LoadGame => DispatchResult::changed_with(Effect::LoadGame),
        Action::LoadComplete(record) => load_complete(state, *record),
        Action::LoadError(failure) => load_error(state, failure),

        Action::Quit => DispatchResult::unchanged(),
    }
}

/// Sets the status line and schedules its expiry.
fn say(state: &mut AppState, text: &str, effects: &mut Vec<Effect>) {
    state.message = Some(text.to_string());
    state.message_serial = state.message_serial.wrapping_add(1);
    effects.push(Effect::ScheduleMessageExpiry {
        serial: state.message_serial,
        delay_ms: MESSAGE_MS,
    });
}

fn schedule(state: &AppState, timer: Timer, delay_ms: u64) -> Effect {
    Effect::ScheduleTimer {
        timer,
        epoch: state.epoch,
        delay_ms,
    }
}

fn enter(state: &mut AppState, mode: GameMode) {
    log::debug!("{} -> {}", state.mode.label(), mode.label());
    state.mode = mode;
}

fn start_game(state: &mut AppState) -> DispatchResult<Effect> {
    if state.mode != GameMode::Menu {
        return DispatchResult::unchanged();
    }
    state.reset_session();
    enter(state, GameMode::Intro);
    state.dialogue.play(encounter::intro_lines());
    DispatchResult::changed_with_many(vec![Effect::CancelTimers, Effect::PlayCue(Cue::Start)])
}

fn reset(state: &mut AppState) -> DispatchResult<Effect> {
    state.reset_session();
    log::debug!("session reset, epoch {}", state.epoch);
    let mut effects = vec![Effect::CancelTimers];
    say(state, "Reset.", &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn advance_dialogue(state: &mut AppState) -> DispatchResult<Effect> {
    match state.dialogue.advance() {
        Advance::Idle => DispatchResult::unchanged(),
        Advance::Line => DispatchResult::changed(),
        Advance::Exhausted => dialogue_finished(state),
    }
}

/// Exactly one transition per exhausted sequence.
fn dialogue_finished(state: &mut AppState) -> DispatchResult<Effect> {
    match state.mode {
        GameMode::Intro => {
            enter_exploration(state);
            DispatchResult::changed()
        }
        GameMode::Exploration => {
            approach_encounter(state);
            DispatchResult::changed()
        }
        GameMode::BattleStart => begin_battle(state),
        GameMode::Victory => {
            if state.encounter_index < state.total_encounters() {
                enter_exploration(state);
            } else {
                enter_ending(state);
            }
            DispatchResult::changed()
        }
        GameMode::Ending | GameMode::GameOver => {
            enter(state, GameMode::Menu);
            state.dialogue.clear();
            DispatchResult::changed_with(Effect::CheckSaveExists)
        }
        GameMode::Menu | GameMode::Battle => DispatchResult::unchanged(),
    }
}

fn enter_exploration(state: &mut AppState) {
    let approach = state
        .current_encounter()
        .map(|def| def.approach.clone())
        .unwrap_or_default();
    enter(state, GameMode::Exploration);
    state.dialogue.play(approach);
}

fn approach_encounter(state: &mut AppState) {
    let Some(def) = state.current_encounter() else {
        enter_ending(state);
        return;
    };
    let enemy = Enemy::from_template(&def.enemy);
    let opening = enemy.dialogue.clone();
    state.enemy = Some(enemy);
    enter(state, GameMode::BattleStart);
    state.dialogue.play(opening);
}

fn enter_ending(state: &mut AppState) {
    let route = rules::select_route(state.kills, state.mercies, state.total_encounters());
    log::info!(
        "run finished: {} route ({} kills, {} mercies)",
        route.label(),
        state.kills,
        state.mercies
    );
    state.ending = Some(route);
    enter(state, GameMode::Ending);
    state.dialogue.play(encounter::ending_lines(route));
}

fn begin_battle(state: &mut AppState) -> DispatchResult<Effect> {
    if state.enemy.is_none() {
        return DispatchResult::unchanged();
    }
    enter(state, GameMode::Battle);
    state.epoch += 1;
    state.battle = Some(BattleState::default());
    state.dialogue.clear();
    state.field_items.clear();
    if rules::chance(&mut state.rng_seed, FIELD_ITEM_CHANCE) {
        let catalog = encounter::item_catalog();
        let pick = rules::next_u32(&mut state.rng_seed) as usize % catalog.len();
        let (id, _, _) = catalog[pick];
        let item = FieldItem::spawn(&mut state.rng_seed, id);
        state.field_items.push(item);
    }
    let mut effects = Vec::new();
    say(state, "What will Grim do?", &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn menu_len(state: &AppState, menu: BattleMenu) -> usize {
    match menu {
        BattleMenu::Commands => Command::ALL.len(),
        BattleMenu::Acts => state.enemy.as_ref().map_or(0, |enemy| enemy.acts.len()),
        BattleMenu::Items => state.player.inventory.len(),
    }
}

fn in_command_phase(state: &AppState) -> bool {
    state.mode == GameMode::Battle
        && state.enemy.is_some()
        && state
            .battle
            .as_ref()
            .is_some_and(|battle| battle.phase == BattlePhase::Menu)
}

fn battle_menu_change(state: &mut AppState, delta: i32) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let Some(menu) = state.battle.as_ref().map(|battle| battle.menu) else {
        return DispatchResult::unchanged();
    };
    let len = menu_len(state, menu) as i32;
    if len == 0 {
        return DispatchResult::unchanged();
    }
    if let Some(battle) = state.battle.as_mut() {
        let next = (battle.cursor as i32 + delta).rem_euclid(len);
        battle.cursor = next as usize;
    }
    DispatchResult::changed()
}

fn battle_confirm(state: &mut AppState) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let Some((menu, cursor)) = state.battle.as_ref().map(|b| (b.menu, b.cursor)) else {
        return DispatchResult::unchanged();
    };
    match menu {
        BattleMenu::Commands => match Command::ALL.get(cursor).copied() {
            Some(Command::Fight) => fight(state),
            Some(Command::Act) => open_submenu(state, BattleMenu::Acts, "Nothing to do."),
            Some(Command::Item) => open_submenu(state, BattleMenu::Items, "Your pockets are empty."),
            Some(Command::Mercy) => mercy(state),
            None => DispatchResult::unchanged(),
        },
        BattleMenu::Acts => act(state, cursor),
        BattleMenu::Items => {
            let ids = state.inventory_ids();
            match ids.get(cursor) {
                Some(id) => use_item(state, id),
                None => DispatchResult::unchanged(),
            }
        }
    }
}

fn open_submenu(state: &mut AppState, menu: BattleMenu, empty: &str) -> DispatchResult<Effect> {
    if menu_len(state, menu) == 0 {
        let mut effects = Vec::new();
        say(state, empty, &mut effects);
        return DispatchResult::changed_with_many(effects);
    }
    if let Some(battle) = state.battle.as_mut() {
        battle.menu = menu;
        battle.cursor = 0;
    }
    DispatchResult::changed()
}

fn battle_cancel(state: &mut AppState) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let Some(battle) = state.battle.as_mut() else {
        return DispatchResult::unchanged();
    };
    if battle.menu == BattleMenu::Commands {
        return DispatchResult::unchanged();
    }
    let back_to = match battle.menu {
        BattleMenu::Items => 2,
        _ => 1,
    };
    battle.menu = BattleMenu::Commands;
    battle.cursor = back_to;
    DispatchResult::changed()
}

/// Opens the strike window: the base roll is fixed now, each hit taken while it lasts costs a point.
fn fight(state: &mut AppState) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let defense = state.enemy.as_ref().map_or(0, |enemy| enemy.defense);
    let base_roll = rules::strike_base_roll(&mut state.rng_seed, defense);
    if let Some(battle) = state.battle.as_mut() {
        battle.back_to_commands();
        battle.phase = BattlePhase::AttackPattern;
        battle.pattern = Some(Pattern::Strike { base_roll });
    }
    let mut effects = vec![
        Effect::PlayCue(Cue::Attack),
        schedule(state, Timer::StrikeEnd, STRIKE_WINDOW_MS),
    ];
    say(state, "You swing! Keep dodging to land it clean.", &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn act(state: &mut AppState, index: usize) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let Some(enemy) = state.enemy.as_mut() else {
        return DispatchResult::unchanged();
    };
    let Some(option) = enemy.acts.get(index).cloned() else {
        return DispatchResult::unchanged();
    };
    enemy.mood = enemy.mood.saturating_add(option.mood);
    if option.pacifies {
        enemy.pacified = true;
    }
    let mut effects = vec![Effect::PlayCue(Cue::Act)];
    say(state, &option.text, &mut effects);
    await_counter(state, &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn use_item(state: &mut AppState, id: &str) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let Some(stack) = state.player.inventory.get(id).cloned() else {
        return DispatchResult::unchanged();
    };
    let mut effects = Vec::new();
    if stack.qty == 0 {
        say(state, &format!("You don't have any {} left.", stack.name), &mut effects);
        return DispatchResult::changed_with_many(effects);
    }
    if let Some(entry) = state.player.inventory.get_mut(id) {
        entry.qty -= 1;
    }
    let healed = state.player.heal(stack.heal);
    effects.push(Effect::PlayCue(Cue::Heal));
    say(
        state,
        &format!("You used the {}. Recovered {} HP.", stack.name, healed),
        &mut effects,
    );
    await_counter(state, &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn mercy(state: &mut AppState) -> DispatchResult<Effect> {
    if !in_command_phase(state) {
        return DispatchResult::unchanged();
    }
    let Some(enemy) = state.enemy.as_mut() else {
        return DispatchResult::unchanged();
    };
    if enemy.can_spare() {
        return win(state, false);
    }
    enemy.recover(2);
    enemy.mood = enemy.mood.saturating_sub(1).max(0);
    enemy.pacified = false;
    let text = format!("{} isn't ready to be spared.", enemy.name);
    let mut effects = vec![Effect::PlayCue(Cue::MercyFail)];
    say(state, &text, &mut effects);
    await_counter(state, &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn await_counter(state: &mut AppState, effects: &mut Vec<Effect>) {
    if let Some(battle) = state.battle.as_mut() {
        battle.back_to_commands();
        battle.phase = BattlePhase::Resolving;
    }
    effects.push(schedule(state, Timer::CounterAttack, COUNTER_DELAY_MS));
}

fn soul_input(state: &mut AppState, direction: Direction) -> DispatchResult<Effect> {
    if !state.in_attack_pattern() {
        return DispatchResult::unchanged();
    }
    if let Some(battle) = state.battle.as_mut() {
        battle.soul.nudge(direction);
    }
    DispatchResult::changed()
}

fn timer_fired(state: &mut AppState, timer: Timer, epoch: u64) -> DispatchResult<Effect> {
    if epoch != state.epoch || state.mode != GameMode::Battle {
        log::debug!(
            "ignoring {:?} from epoch {} (current {})",
            timer,
            epoch,
            state.epoch
        );
        return DispatchResult::unchanged();
    }
    let Some((phase, pattern)) = state.battle.as_ref().map(|b| (b.phase, b.pattern)) else {
        return DispatchResult::unchanged();
    };
    match (timer, phase, pattern) {
        (Timer::StrikeEnd, BattlePhase::AttackPattern, Some(Pattern::Strike { base_roll })) => {
            resolve_strike(state, base_roll)
        }
        (Timer::CounterAttack, BattlePhase::Resolving, _) => launch_counter(state),
        (Timer::CounterEnd, BattlePhase::AttackPattern, Some(Pattern::Counter)) => {
            resolve_counter(state)
        }
        _ => DispatchResult::unchanged(),
    }
}

fn resolve_strike(state: &mut AppState, base_roll: i32) -> DispatchResult<Effect> {
    let misses = state.battle.as_ref().map_or(0, |battle| battle.hits);
    let damage = rules::strike_damage(base_roll, misses);
    let Some(enemy) = state.enemy.as_mut() else {
        return DispatchResult::unchanged();
    };
    enemy.take_damage(damage);
    let text = format!("You dealt {} damage to {}!", damage, enemy.name);
    if enemy.hp == 0 {
        return win(state, true);
    }
    let mut effects = vec![Effect::PlayCue(Cue::Hit)];
    say(state, &text, &mut effects);
    await_counter(state, &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn launch_counter(state: &mut AppState) -> DispatchResult<Effect> {
    let Some((attack, name)) = state
        .enemy
        .as_ref()
        .map(|enemy| (enemy.attack, enemy.name.clone()))
    else {
        return DispatchResult::unchanged();
    };
    let window_ms = rules::counter_window_ms(&mut state.rng_seed);
    let AppState {
        battle, rng_seed, ..
    } = &mut *state;
    let Some(battle) = battle.as_mut() else {
        return DispatchResult::unchanged();
    };
    battle.phase = BattlePhase::AttackPattern;
    battle.pattern = Some(Pattern::Counter);
    battle.hits = 0;
    battle.projectiles = dodge::spawn_ring(
        rng_seed,
        (battle.soul.x, battle.soul.y),
        rules::projectile_count(attack),
        rules::projectile_speed(attack),
    );
    let mut effects = vec![schedule(state, Timer::CounterEnd, window_ms)];
    say(state, &format!("{} attacks!", name), &mut effects);
    DispatchResult::changed_with_many(effects)
}

fn resolve_counter(state: &mut AppState) -> DispatchResult<Effect> {
    let attack = state.enemy.as_ref().map_or(0, |enemy| enemy.attack);
    let hits = state
        .battle
        .as_ref()
        .map_or(0, |battle| battle.hits.min(rules::MAX_HITS));
    let damage = rules::counter_damage(attack, hits, state.player.hp);
    state.player.take_damage(damage);
    if state.player.hp == 0 {
        return game_over(state);
    }
    if let Some(battle) = state.battle.as_mut() {
        battle.back_to_commands();
    }
    let mut effects = Vec::new();
    if damage > 0 {
        effects.push(Effect::PlayCue(Cue::Hit));
        say(
            state,
            &format!("You were hit {} times for {} damage.", hits, damage),
            &mut effects,
        );
    } else {
        say(state, "You dodged everything!", &mut effects);
    }
    DispatchResult::changed_with_many(effects)
}

/// Ends the current battle in victory. Pending timers die with the epoch.
fn win(state: &mut AppState, killed: bool) -> DispatchResult<Effect> {
    let Some(enemy) = state.enemy.take() else {
        return DispatchResult::unchanged();
    };
    state.battle = None;
    state.field_items.clear();
    state.epoch += 1;
    if killed {
        state.kills += 1;
    } else {
        state.mercies += 1;
    }
    state.encounter_index += 1;

    let mut lines = vec![if killed {
        format!("{} was defeated.", enemy.name)
    } else {
        format!("You spared {}. Peace, for now.", enemy.name)
    }];
    lines.push(format!("You gained {} EXP.", enemy.exp));
    let levels = state.player.gain_exp(enemy.exp);
    if levels > 0 {
        state.player.hp = state.player.max_hp;
        lines.push(format!(
            "You reached LV {}! Max HP is now {}.",
            state.player.level, state.player.max_hp
        ));
    } else {
        let healed = state.player.heal(rules::VICTORY_HEAL);
        if healed > 0 {
            lines.push(format!("You catch your breath. +{} HP.", healed));
        }
    }
    log::debug!(
        "encounter {} over: {} (kills {}, mercies {})",
        state.encounter_index,
        if killed { "killed" } else { "spared" },
        state.kills,
        state.mercies
    );
    enter(state, GameMode::Victory);
    state.dialogue.play(lines);
    state.message = None;

    let cue = if killed { Cue::Victory } else { Cue::MercySuccess };
    DispatchResult::changed_with_many(vec![Effect::CancelTimers, Effect::PlayCue(cue)])
}

fn game_over(state: &mut AppState) -> DispatchResult<Effect> {
    state.enemy = None;
    state.battle = None;
    state.field_items.clear();
    state.epoch += 1;
    state.message = None;
    enter(state, GameMode::GameOver);
    state.dialogue.play(encounter::game_over_lines());
    DispatchResult::changed_with_many(vec![Effect::CancelTimers, Effect::PlayCue(Cue::GameOver)])
}

fn frame(state: &mut AppState) -> DispatchResult<Effect> {
    state.frame = state.frame.wrapping_add(1);
    if state.mode != GameMode::Battle {
        return DispatchResult::unchanged();
    }
    let AppState {
        battle, rng_seed, ..
    } = &mut *state;
    let Some(battle) = battle.as_mut() else {
        return DispatchResult::unchanged();
    };

    let attacking = battle.phase == BattlePhase::AttackPattern;
    if attacking {
        battle.soul.step();
        if matches!(battle.pattern, Some(Pattern::Strike { .. }))
            && battle.projectiles.len() < rules::MAX_PROJECTILES
            && rules::chance(rng_seed, FALLING_SPAWN_CHANCE)
        {
            battle.projectiles.push(dodge::spawn_falling(rng_seed));
        }
    } else {
        battle.soul.ease_to_rest();
    }

    dodge::advance(&mut battle.projectiles);
    if attacking {
        battle.hits += dodge::collect_hits(&mut battle.projectiles, &battle.soul);
    }
    dodge::prune(&mut battle.projectiles);

    let soul = battle.soul.clone();
    let picked = state
        .field_items
        .iter()
        .position(|item| soul.touches(item.x, item.y, FIELD_ITEM_RADIUS));
    if let Some(index) = picked {
        let item = state.field_items.remove(index);
        state.player.add_item(&item.item_id);
        let name = state
            .player
            .inventory
            .get(&item.item_id)
            .map_or(item.item_id.clone(), |stack| stack.name.clone());
        let mut effects = vec![Effect::PlayCue(Cue::Pickup)];
        say(state, &format!("Picked up a {}!", name), &mut effects);
        return DispatchResult::changed_with_many(effects);
    }
    DispatchResult::changed()
}

fn load_complete(state: &mut AppState, record: SaveRecord) -> DispatchResult<Effect> {
    let mut effects = vec![Effect::CancelTimers];
    match record.validate() {
        Ok(record) => {
            apply_record(state, record);
            effects.push(Effect::PlayCue(Cue::Load));
            say(state, "Game loaded.", &mut effects);
        }
        Err(rejected) => {
            log::warn!("rejected save: {}", rejected);
            state.reset_session();
            say(
                state,
                &format!("Save rejected ({}). Starting fresh.", rejected),
                &mut effects,
            );
        }
    }
    DispatchResult::changed_with_many(effects)
}

fn load_error(state: &mut AppState, failure: LoadFailure) -> DispatchResult<Effect> {
    let mut effects = Vec::new();
    match failure {
        LoadFailure::Missing => say(state, "No save found.", &mut effects),
        LoadFailure::Corrupt(error) => {
            log::warn!("corrupt save: {}", error);
            effects.push(Effect::CancelTimers);
            state.reset_session();
            say(state, "Save file was corrupt. Starting fresh.", &mut effects);
        }
        LoadFailure::Io(error) => say(state, &format!("Load failed: {}", error), &mut effects),
    }
    DispatchResult::changed_with_many(effects)
}

/// Installs a validated record. Battles restart at the command menu in a new epoch.
fn apply_record(state: &mut AppState, record: SaveRecord) {
    state.player = record.player;
    state.encounters = record.encounters;
    state.encounter_index = record.encounter_index;
    state.kills = record.kills;
    state.mercies = record.mercies;
    state.enemy = record.enemy;
    state.field_items = record.field_items;
    state.epoch += 1;
    state.ending = None;
    state.battle = None;
    state.dialogue.clear();
    enter(state, record.mode);

    match record.mode {
        GameMode::Menu | GameMode::Battle => {}
        GameMode::Intro => state.dialogue.play(encounter::intro_lines()),
        GameMode::Exploration => {
            let approach = state
                .current_encounter()
                .map(|def| def.approach.clone())
                .unwrap_or_default();
            state.dialogue.play(approach);
        }
        GameMode::BattleStart => {
            let opening = state
                .enemy
                .as_ref()
                .map(|enemy| enemy.dialogue.clone())
                .unwrap_or_default();
            state.dialogue.play(opening);
        }
        GameMode::Victory => state
            .dialogue
            .play(vec!["The dust settles. The night goes on.".to_string()]),
        GameMode::Ending => {
            let route = rules::select_route(state.kills, state.mercies, state.total_encounters());
            state.ending = Some(route);
            state.dialogue.play(encounter::ending_lines(route));
        }
        GameMode::GameOver => state.dialogue.play(encounter::game_over_lines()),
    }
    if record.mode == GameMode::Battle {
        state.battle = Some(BattleState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fresh() -> AppState {
        AppState::new(encounter::builtin_table(), 1234)
    }

    fn skip_dialogue(state: &mut AppState) {
        let mode = state.mode;
        while state.mode == mode && state.dialogue.is_active() {
            reducer(state, Action::DialogueAdvance);
        }
    }

    fn into_battle(state: &mut AppState) {
        reducer(state, Action::Start);
        for _ in 0..3 {
            skip_dialogue(state);
        }
        assert_eq!(state.mode, GameMode::Battle);
    }

    #[test]
    fn start_walks_into_first_battle() {
        let mut state = fresh();
        reducer(&mut state, Action::Start);
        assert_eq!(state.mode, GameMode::Intro);
        skip_dialogue(&mut state);
        assert_eq!(state.mode, GameMode::Exploration);
        skip_dialogue(&mut state);
        assert_eq!(state.mode, GameMode::BattleStart);
        assert_eq!(state.enemy.as_ref().map(|e| e.name.as_str()), Some("Shadow Wraith"));
        skip_dialogue(&mut state);
        assert_eq!(state.mode, GameMode::Battle);
        let battle = state.battle.as_ref().unwrap();
        assert_eq!(battle.phase, BattlePhase::Menu);
    }

    #[test]
    fn one_transition_per_exhausted_sequence() {
        let mut state = fresh();
        reducer(&mut state, Action::Start);
        skip_dialogue(&mut state);
        assert_eq!(state.mode, GameMode::Exploration);
        let lines = state.dialogue.position().1;
        for _ in 0..lines - 1 {
            reducer(&mut state, Action::DialogueAdvance);
            assert_eq!(state.mode, GameMode::Exploration);
        }
        reducer(&mut state, Action::DialogueAdvance);
        assert_eq!(state.mode, GameMode::BattleStart);
    }

    #[test]
    fn dialogue_advance_is_ignored_in_battle() {
        let mut state = fresh();
        into_battle(&mut state);
        let result = reducer(&mut state, Action::DialogueAdvance);
        assert!(!result.changed);
        assert_eq!(state.mode, GameMode::Battle);
    }

    #[test]
    fn fight_schedules_strike_window() {
        let mut state = fresh();
        into_battle(&mut state);
        let result = reducer(&mut state, Action::BattleFight);
        assert!(result.effects.contains(&Effect::ScheduleTimer {
            timer: Timer::StrikeEnd,
            epoch: state.epoch,
            delay_ms: STRIKE_WINDOW_MS,
        }));
        assert!(state.in_attack_pattern());
    }

    #[test]
    fn strike_without_hits_deals_base_roll() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::BattleFight);
        let Some(Pattern::Strike { base_roll }) = state.battle.as_ref().unwrap().pattern else {
            panic!("expected strike pattern");
        };
        let before = state.enemy.as_ref().unwrap().hp;
        let epoch = state.epoch;
        reducer(&mut state, Action::TimerFired { timer: Timer::StrikeEnd, epoch });
        match state.enemy.as_ref() {
            Some(enemy) => {
                assert_eq!(enemy.hp, before - base_roll);
                assert_eq!(state.battle.as_ref().unwrap().phase, BattlePhase::Resolving);
            }
            None => assert_eq!(state.mode, GameMode::Victory),
        }
    }

    #[test]
    fn stale_timers_are_ignored_after_reset() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::BattleAct(0));
        let stale = state.epoch;
        let result = reducer(&mut state, Action::Reset);
        assert!(result.effects.contains(&Effect::CancelTimers));
        assert_eq!(state.mode, GameMode::Menu);

        into_battle(&mut state);
        let snapshot = state.clone();
        let result = reducer(
            &mut state,
            Action::TimerFired { timer: Timer::CounterAttack, epoch: stale },
        );
        assert!(!result.changed);
        assert_eq!(state, snapshot);
    }

    #[test]
    fn counter_attack_cycle() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::BattleAct(2));
        let epoch = state.epoch;
        reducer(&mut state, Action::TimerFired { timer: Timer::CounterAttack, epoch });
        let battle = state.battle.as_ref().unwrap();
        assert_eq!(battle.phase, BattlePhase::AttackPattern);
        assert_eq!(battle.projectiles.len(), rules::projectile_count(8));

        let hp = state.player.hp;
        if let Some(battle) = state.battle.as_mut() {
            battle.hits = 3;
        }
        reducer(&mut state, Action::TimerFired { timer: Timer::CounterEnd, epoch });
        assert_eq!(state.player.hp, hp - 4);
        let battle = state.battle.as_ref().unwrap();
        assert_eq!(battle.phase, BattlePhase::Menu);
        assert!(battle.projectiles.is_empty());
    }

    #[test]
    fn mercy_after_locket_spares() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::BattleAct(2));
        let enemy = state.enemy.as_ref().unwrap();
        assert_eq!(enemy.mood, 3);
        if let Some(battle) = state.battle.as_mut() {
            battle.back_to_commands();
        }
        reducer(&mut state, Action::BattleMercy);
        assert_eq!(state.mode, GameMode::Victory);
        assert_eq!(state.mercies, 1);
        assert_eq!(state.encounter_index, 1);
        assert!(state.enemy.is_none());
    }

    #[test]
    fn failed_mercy_heals_enemy_and_sours_mood() {
        let mut state = fresh();
        into_battle(&mut state);
        if let Some(enemy) = state.enemy.as_mut() {
            enemy.hp = 20;
            enemy.mood = 1;
        }
        reducer(&mut state, Action::BattleMercy);
        let enemy = state.enemy.as_ref().unwrap();
        assert_eq!(enemy.hp, 22);
        assert_eq!(enemy.mood, 0);
        assert_eq!(state.battle.as_ref().unwrap().phase, BattlePhase::Resolving);
    }

    #[test]
    fn empty_item_stack_is_a_no_op_with_message() {
        let mut state = fresh();
        into_battle(&mut state);
        if let Some(stack) = state.player.inventory.get_mut("soda") {
            stack.qty = 0;
        }
        state.player.hp = 5;
        reducer(&mut state, Action::BattleItem("soda".to_string()));
        assert_eq!(state.player.hp, 5);
        assert_eq!(state.battle.as_ref().unwrap().phase, BattlePhase::Menu);
        assert!(state.message.as_deref().unwrap_or("").contains("Fizzy Soda"));
    }

    #[test]
    fn item_heals_and_clamps() {
        let mut state = fresh();
        into_battle(&mut state);
        state.player.hp = 15;
        reducer(&mut state, Action::BattleItem("soda".to_string()));
        assert_eq!(state.player.hp, state.player.max_hp);
        assert_eq!(state.player.inventory["soda"].qty, 0);
    }

    #[test]
    fn menus_wrap_and_cancel() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::BattleMenuPrev);
        assert_eq!(state.battle.as_ref().unwrap().cursor, 3);
        reducer(&mut state, Action::BattleMenuNext);
        reducer(&mut state, Action::BattleMenuNext);
        reducer(&mut state, Action::BattleConfirm);
        assert_eq!(state.battle.as_ref().unwrap().menu, BattleMenu::Acts);
        reducer(&mut state, Action::BattleCancel);
        let battle = state.battle.as_ref().unwrap();
        assert_eq!(battle.menu, BattleMenu::Commands);
        assert_eq!(battle.cursor, 1);
    }

    #[test]
    fn soul_only_moves_during_attack_pattern() {
        let mut state = fresh();
        into_battle(&mut state);
        let result = reducer(&mut state, Action::SoulInput(Direction::Left));
        assert!(!result.changed);
        reducer(&mut state, Action::BattleFight);
        reducer(&mut state, Action::SoulInput(Direction::Left));
        reducer(&mut state, Action::Frame);
        let soul = &state.battle.as_ref().unwrap().soul;
        assert!(soul.x < dodge::SOUL_REST.0);
    }

    #[test]
    fn killing_blow_wins_and_counts() {
        let mut state = fresh();
        into_battle(&mut state);
        if let Some(enemy) = state.enemy.as_mut() {
            enemy.hp = 1;
        }
        reducer(&mut state, Action::BattleFight);
        let epoch = state.epoch;
        let result = reducer(&mut state, Action::TimerFired { timer: Timer::StrikeEnd, epoch });
        assert!(result.effects.contains(&Effect::CancelTimers));
        assert_eq!(state.mode, GameMode::Victory);
        assert_eq!(state.kills, 1);
        assert!(state.kills + state.mercies <= state.encounter_index as u32);
    }

    #[test]
    fn zero_hp_means_game_over() {
        let mut state = fresh();
        into_battle(&mut state);
        state.player.hp = 1;
        reducer(&mut state, Action::BattleAct(0));
        let epoch = state.epoch;
        reducer(&mut state, Action::TimerFired { timer: Timer::CounterAttack, epoch });
        if let Some(battle) = state.battle.as_mut() {
            battle.hits = 6;
        }
        reducer(&mut state, Action::TimerFired { timer: Timer::CounterEnd, epoch });
        assert_eq!(state.player.hp, 0);
        assert_eq!(state.mode, GameMode::GameOver);
        skip_dialogue(&mut state);
        assert_eq!(state.mode, GameMode::Menu);
    }

    #[test]
    fn message_expiry_checks_serial() {
        let mut state = fresh();
        into_battle(&mut state);
        let old = state.message_serial;
        reducer(&mut state, Action::BattleItem("snack".to_string()));
        assert!(!reducer(&mut state, Action::MessageExpired { serial: old }).changed);
        assert!(state.message.is_some());
        let serial = state.message_serial;
        assert!(reducer(&mut state, Action::MessageExpired { serial }).changed);
        assert!(state.message.is_none());
    }

    #[test]
    fn loading_battle_restarts_at_menu() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::BattleFight);
        let record = SaveRecord::capture(&state);
        let epoch = state.epoch;

        let mut other = fresh();
        reducer(&mut other, Action::LoadComplete(Box::new(record)));
        assert_eq!(other.mode, GameMode::Battle);
        let battle = other.battle.as_ref().unwrap();
        assert_eq!(battle.phase, BattlePhase::Menu);
        assert!(battle.projectiles.is_empty());
        assert_ne!(other.epoch, epoch);
    }

    #[test]
    fn rejected_save_falls_back_to_defaults() {
        let mut state = fresh();
        into_battle(&mut state);
        let mut record = SaveRecord::capture(&state);
        record.enemy = None;
        reducer(&mut state, Action::LoadComplete(Box::new(record)));
        assert_eq!(state.mode, GameMode::Menu);
        assert_eq!(state.encounter_index, 0);
        assert!(state.message.is_some());
    }

    #[test]
    fn missing_save_is_a_notice_only() {
        let mut state = fresh();
        into_battle(&mut state);
        reducer(&mut state, Action::LoadError(LoadFailure::Missing));
        assert_eq!(state.mode, GameMode::Battle);
        assert_eq!(state.message.as_deref(), Some("No save found."));
    }

    #[test]
    fn touching_a_pickup_collects_it() {
        let mut state = fresh();
        into_battle(&mut state);
        let snacks = state.player.inventory["snack"].qty;
        state.field_items = vec![FieldItem {
            item_id: "snack".to_string(),
            x: dodge::SOUL_REST.0,
            y: dodge::SOUL_REST.1,
        }];

        let result = reducer(&mut state, Action::Frame);
        assert!(result.effects.contains(&Effect::PlayCue(Cue::Pickup)));
        assert!(state.field_items.is_empty());
        assert_eq!(state.player.inventory["snack"].qty, snacks + 1);
        assert_eq!(state.message.as_deref(), Some("Picked up a Greasy Snack!"));
    }

    #[test]
    fn pickup_adds_new_inventory_entries() {
        let mut state = fresh();
        into_battle(&mut state);
        state.field_items = vec![FieldItem {
            item_id: "locket-cake".to_string(),
            x: dodge::SOUL_REST.0 + 5.0,
            y: dodge::SOUL_REST.1,
        }];
        reducer(&mut state, Action::Frame);
        assert_eq!(state.player.inventory["locket-cake"].qty, 1);
        assert!(state.field_items.is_empty());
    }

    #[test]
    fn distant_pickup_stays_on_the_field() {
        let mut state = fresh();
        into_battle(&mut state);
        state.field_items = vec![FieldItem {
            item_id: "soda".to_string(),
            x: dodge::ARENA_LEFT + 20.0,
            y: dodge::ARENA_TOP + 20.0,
        }];
        let result = reducer(&mut state, Action::Frame);
        assert!(!result.effects.contains(&Effect::PlayCue(Cue::Pickup)));
        assert_eq!(state.field_items.len(), 1);
    }

    #[test]
    fn battles_start_with_and_without_pickups() {
        let catalog = encounter::item_catalog();
        let mut with_item = 0;
        let mut without_item = 0;
        for seed in 0..64 {
            let mut state = AppState::new(encounter::builtin_table(), seed);
            into_battle(&mut state);
            match state.field_items.as_slice() {
                [] => without_item += 1,
                [item] => {
                    with_item += 1;
                    assert!(catalog.iter().any(|(id, _, _)| *id == item.item_id));
                    assert!((dodge::ARENA_LEFT..=dodge::ARENA_RIGHT).contains(&item.x));
                    assert!((dodge::ARENA_TOP..=dodge::ARENA_BOTTOM).contains(&item.y));
                }
                items => panic!("expected at most one pickup, got {}", items.len()),
            }
        }
        assert!(with_item > 0);
        assert!(without_item > 0);
    }

    #[test]
    fn overpowered_saved_enemy_cannot_overflow_counter() {
        let mut state = fresh();
        into_battle(&mut state);
        let mut record = SaveRecord::capture(&state);
        if let Some(enemy) = record.enemy.as_mut() {
            enemy.attack = i32::MAX;
        }
        reducer(&mut state, Action::LoadComplete(Box::new(record)));
        assert_eq!(state.enemy.as_ref().map(|e| e.attack), Some(rules::MAX_STAT));

        reducer(&mut state, Action::BattleAct(0));
        let epoch = state.epoch;
        reducer(
            &mut state,
            Action::TimerFired {
                timer: Timer::CounterAttack,
                epoch,
            },
        );
        if let Some(battle) = state.battle.as_mut() {
            battle.hits = rules::MAX_HITS;
        }
        reducer(
            &mut state,
            Action::TimerFired {
                timer: Timer::CounterEnd,
                epoch,
            },
        );
        assert_eq!(state.mode, GameMode::GameOver);
        assert_eq!(state.player.hp, 0);
    }

    #[test]
    fn max_level_save_can_still_win() {
        let mut state = fresh();
        into_battle(&mut state);
        let mut record = SaveRecord::capture(&state);
        record.player.level = u32::MAX;
        record.player.exp = u32::MAX;
        if let Some(enemy) = record.enemy.as_mut() {
            enemy.pacified = true;
        }
        reducer(&mut state, Action::LoadComplete(Box::new(record)));
        reducer(&mut state, Action::BattleMercy);
        assert_eq!(state.mode, GameMode::Victory);
        assert_eq!(state.player.level, rules::MAX_LEVEL);
    }

    #[test]
    fn mood_saturates_at_the_extremes() {
        let mut state = fresh();
        into_battle(&mut state);
        if let Some(enemy) = state.enemy.as_mut() {
            enemy.mood = i32::MAX;
            enemy.acts[0].mood = i32::MAX;
        }
        reducer(&mut state, Action::BattleAct(0));
        assert_eq!(state.enemy.as_ref().map(|e| e.mood), Some(i32::MAX));

        let mut state = fresh();
        into_battle(&mut state);
        if let Some(enemy) = state.enemy.as_mut() {
            enemy.mood = i32::MIN;
        }
        reducer(&mut state, Action::BattleMercy);
        assert_eq!(state.enemy.as_ref().map(|e| e.mood), Some(0));
    }

    #[test]
    fn save_in_menu_is_refused() {
        let mut state = fresh();
        let result = reducer(&mut state, Action::SaveGame);
        assert!(!result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::SaveGame { .. })));
    }
}
