use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction as LayoutDir, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        block::Title,
        canvas::{Canvas, Circle, Rectangle},
        Block, BorderType, Borders, Paragraph, Wrap,
    },
    Frame,
};
use tui_dispatch::{EventKind, EventOutcome, RenderContext};

use crate::action::Action;
use crate::dodge::{self, Tint};
use crate::state::{AppState, BattleMenu, BattlePhase, Command, Direction, GameMode};

const BG_BASE: Color = Color::Rgb(10, 8, 20);
const BG_PANEL: Color = Color::Rgb(22, 18, 38);
const BG_PANEL_ALT: Color = Color::Rgb(16, 14, 30);
const BG_ARENA: Color = Color::Rgb(8, 16, 24);
const TEXT_MAIN: Color = Color::Rgb(236, 232, 244);
const TEXT_DIM: Color = Color::Rgb(150, 144, 170);
const ACCENT_RED: Color = Color::Rgb(232, 64, 72);
const ACCENT_GOLD: Color = Color::Rgb(236, 200, 96);
const ACCENT_GREEN: Color = Color::Rgb(104, 204, 120);
const HIGHLIGHT_TEXT: Color = Color::Rgb(16, 12, 24);
const BORDER_ACCENT: Color = Color::Rgb(96, 88, 128);

pub fn render(frame: &mut Frame, area: Rect, state: &AppState, _ctx: RenderContext) {
    draw(frame, area, state);
}

pub fn draw(frame: &mut Frame, area: Rect, state: &AppState) {
    frame.render_widget(Block::default().style(Style::default().bg(BG_BASE)), area);
    match state.mode {
        GameMode::Menu => render_title(frame, area, state),
        GameMode::Battle => render_battle(frame, area, state),
        GameMode::Intro
        | GameMode::Exploration
        | GameMode::BattleStart
        | GameMode::Victory
        | GameMode::Ending
        | GameMode::GameOver => render_story(frame, area, state),
    }
}

pub fn handle_event(event: &EventKind, state: &AppState) -> EventOutcome<Action> {
    match event {
        EventKind::Resize(width, height) => {
            EventOutcome::action(Action::UiTerminalResize(*width, *height)).with_render()
        }
        EventKind::Key(key) => EventOutcome::from(key_action(*key, state)),
        _ => EventOutcome::ignored(),
    }
}

fn is_confirm(code: KeyCode) -> bool {
    matches!(
        code,
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z') | KeyCode::Char(' ')
    )
}

fn direction_for(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Direction::Up),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Direction::Down),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(Direction::Left),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(Direction::Right),
        _ => None,
    }
}

/// Maps a key press to an action for the current screen.
pub fn key_action(key: KeyEvent, state: &AppState) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Action::Quit),
        KeyCode::F(5) => return Some(Action::SaveGame),
        KeyCode::F(9) => return Some(Action::LoadGame),
        KeyCode::Char('r') | KeyCode::Char('R') if state.mode != GameMode::Menu => {
            return Some(Action::Reset)
        }
        _ => {}
    }

    match state.mode {
        GameMode::Menu => is_confirm(key.code).then_some(Action::Start),
        GameMode::Battle => battle_key(key, state),
        GameMode::Intro
        | GameMode::Exploration
        | GameMode::BattleStart
        | GameMode::Victory
        | GameMode::Ending
        | GameMode::GameOver => is_confirm(key.code).then_some(Action::DialogueAdvance),
    }
}

fn battle_key(key: KeyEvent, state: &AppState) -> Option<Action> {
    let battle = state.battle.as_ref()?;
    match battle.phase {
        BattlePhase::AttackPattern => direction_for(key.code).map(Action::SoulInput),
        BattlePhase::Resolving => None,
        BattlePhase::Menu => {
            if is_confirm(key.code) {
                return Some(Action::BattleConfirm);
            }
            match key.code {
                KeyCode::Esc | KeyCode::Char('x') | KeyCode::Char('X') => {
                    Some(Action::BattleCancel)
                }
                code => match direction_for(code)? {
                    Direction::Up | Direction::Left => Some(Action::BattleMenuPrev),
                    Direction::Down | Direction::Right => Some(Action::BattleMenuNext),
                },
            }
        }
    }
}

fn render_title(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" RIDGEWOOD ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let content_height = 12;
    let content_width = 44;
    let x = inner.x + (inner.width.saturating_sub(content_width)) / 2;
    let y = inner.y + (inner.height.saturating_sub(content_height)) / 2;
    let content_area = Rect::new(
        x,
        y,
        content_width.min(inner.width),
        content_height.min(inner.height),
    );

    let mut lines = vec![
        Line::from(Span::styled(
            "GRIM GREASER",
            Style::default().fg(ACCENT_RED).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Ridgewood After Dark",
            Style::default().fg(TEXT_DIM),
        )),
        Line::from(""),
        menu_line("Z/Enter: New Game", true),
    ];
    if state.has_save {
        lines.push(menu_line("F9: Continue", false));
    }
    lines.push(menu_line("Q: Quit", false));
    lines.push(Line::from(""));
    if let Some(message) = &state.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(ACCENT_GOLD),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Arrows/WASD: Dodge  |  F5 Save  F9 Load  R Reset",
        Style::default().fg(TEXT_DIM),
    )));

    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, content_area);
}

fn render_story(frame: &mut Frame, area: Rect, state: &AppState) {
    let layout = Layout::default()
        .direction(LayoutDir::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(6),
        ])
        .split(area);

    render_status(frame, layout[0], state);
    render_scene(frame, layout[1], state);
    render_dialogue(frame, layout[2], state);
}

fn render_status(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" GRIM ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let player = &state.player;
    let mut spans = hp_line(player.hp, player.max_hp).spans;
    spans.push(Span::styled(
        format!(
            "   LV {}  EXP {}/{}   Encounter {}/{}   Kills {}  Spared {}",
            player.level,
            player.exp,
            crate::rules::exp_to_next(player.level),
            (state.encounter_index + 1).min(state.total_encounters()),
            state.total_encounters(),
            state.kills,
            state.mercies
        ),
        Style::default().fg(TEXT_DIM),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn scene_title(state: &AppState) -> String {
    match state.mode {
        GameMode::Intro => " RIDGEWOOD ".to_string(),
        GameMode::Exploration => " OUT IN THE NIGHT ".to_string(),
        GameMode::BattleStart => state
            .enemy
            .as_ref()
            .map(|enemy| format!(" {} ", enemy.name.to_ascii_uppercase()))
            .unwrap_or_else(|| " ENCOUNTER ".to_string()),
        GameMode::Victory => " VICTORY ".to_string(),
        GameMode::Ending => state
            .ending
            .map(|route| format!(" {} ENDING ", route.label().to_ascii_uppercase()))
            .unwrap_or_else(|| " ENDING ".to_string()),
        GameMode::GameOver => " GAME OVER ".to_string(),
        GameMode::Menu | GameMode::Battle => String::new(),
    }
}

fn render_scene(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = scene_title(state);
    let block = panel_block(title.as_str(), BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (glyph, color) = match state.mode {
        GameMode::BattleStart => ("( o_o )", ACCENT_RED),
        GameMode::Victory => ("* * *", ACCENT_GOLD),
        GameMode::GameOver => ("</3", ACCENT_RED),
        GameMode::Ending => ("~ fin ~", ACCENT_GOLD),
        _ => ("<3", ACCENT_RED),
    };
    let top = inner.y + inner.height.saturating_sub(1) / 2;
    let glyph_area = Rect::new(inner.x, top, inner.width, inner.height.min(1));
    let paragraph = Paragraph::new(Span::styled(
        glyph,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center);
    frame.render_widget(paragraph, glyph_area);
}

fn render_dialogue(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" * ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![Line::from(
        state.dialogue.current().unwrap_or_default().to_string(),
    )];
    lines.push(Line::from(""));
    let (at, total) = state.dialogue.position();
    let mut hint = format!("({}/{})  Z/Enter: Continue", at, total);
    if let Some(message) = &state.message {
        hint = format!("{}   {}", hint, message);
    }
    lines.push(Line::from(Span::styled(hint, Style::default().fg(TEXT_DIM))));

    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_battle(frame: &mut Frame, area: Rect, state: &AppState) {
    let layout = Layout::default()
        .direction(LayoutDir::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(7),
        ])
        .split(area);

    render_enemy_panel(frame, layout[0], state);
    render_arena(frame, layout[1], state);
    render_command_box(frame, layout[2], state);
}

fn render_enemy_panel(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(enemy) = state.enemy.as_ref() else {
        return;
    };
    let title = format!(" {} ", enemy.name.to_ascii_uppercase());
    let block = panel_block(title.as_str(), BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mood = if enemy.can_spare() {
        Span::styled("  [spareable]", Style::default().fg(ACCENT_GOLD))
    } else {
        Span::styled(format!("  mood {}", enemy.mood), Style::default().fg(TEXT_DIM))
    };
    let mut spans = hp_line(enemy.hp, enemy.max_hp).spans;
    spans.push(mood);
    let lines = vec![
        Line::from(spans),
        Line::from(Span::styled(
            format!("ATK {}  DEF {}", enemy.attack, enemy.defense),
            Style::default().fg(TEXT_DIM),
        )),
    ];
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);
}

/// Canvas y grows upward; the arena model grows downward.
fn flip(y: f64) -> f64 {
    dodge::SCREEN_H - y
}

fn render_arena(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(battle) = state.battle.as_ref() else {
        return;
    };
    let border = if battle.phase == BattlePhase::AttackPattern {
        ACCENT_RED
    } else {
        TEXT_MAIN
    };
    let canvas = Canvas::default()
        .block(panel_block(" SOUL ", BG_ARENA))
        .background_color(BG_ARENA)
        .marker(Marker::Braille)
        .x_bounds([0.0, dodge::SCREEN_W])
        .y_bounds([0.0, dodge::SCREEN_H])
        .paint(|ctx| {
            ctx.draw(&Rectangle {
                x: dodge::ARENA_LEFT,
                y: flip(dodge::ARENA_BOTTOM),
                width: dodge::ARENA_RIGHT - dodge::ARENA_LEFT,
                height: dodge::ARENA_BOTTOM - dodge::ARENA_TOP,
                color: border,
            });
            for item in &state.field_items {
                ctx.draw(&Circle {
                    x: item.x,
                    y: flip(item.y),
                    radius: dodge::FIELD_ITEM_RADIUS,
                    color: ACCENT_GOLD,
                });
            }
            for shot in &battle.projectiles {
                let color = match shot.tint {
                    Tint::Red => ACCENT_RED,
                    Tint::White => TEXT_MAIN,
                };
                ctx.draw(&Circle {
                    x: shot.x,
                    y: flip(shot.y),
                    radius: shot.radius,
                    color,
                });
            }
            ctx.draw(&Circle {
                x: battle.soul.x,
                y: flip(battle.soul.y),
                radius: dodge::SOUL_RADIUS,
                color: ACCENT_RED,
            });
        });
    frame.render_widget(canvas, area);
}

fn render_command_box(frame: &mut Frame, area: Rect, state: &AppState) {
    let player = &state.player;
    let title = format!(" GRIM  LV {} ", player.level);
    let block = panel_block(title.as_str(), BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(battle) = state.battle.as_ref() else {
        return;
    };

    let mut lines = vec![hp_line(player.hp, player.max_hp)];
    lines.push(Line::from(state.message.clone().unwrap_or_default()));
    match (battle.phase, battle.menu) {
        (BattlePhase::Menu, BattleMenu::Commands) => {
            lines.push(command_line(battle.cursor));
            lines.push(hint_line("Z/Enter: Select"));
        }
        (BattlePhase::Menu, BattleMenu::Acts) => {
            let labels: Vec<String> = state
                .enemy
                .as_ref()
                .map(|enemy| enemy.acts.iter().map(|act| act.label.clone()).collect())
                .unwrap_or_default();
            lines.push(choice_line(&labels, battle.cursor));
            lines.push(hint_line("Z/Enter: Act  |  X/Esc: Back"));
        }
        (BattlePhase::Menu, BattleMenu::Items) => {
            let labels: Vec<String> = state
                .player
                .inventory
                .values()
                .map(|stack| format!("{} x{}", stack.name, stack.qty))
                .collect();
            lines.push(choice_line(&labels, battle.cursor));
            lines.push(hint_line("Z/Enter: Use  |  X/Esc: Back"));
        }
        (BattlePhase::AttackPattern, _) => {
            lines.push(Line::from(Span::styled(
                format!("Hits taken: {}", battle.hits),
                Style::default().fg(ACCENT_RED),
            )));
            lines.push(hint_line("Arrows/WASD: Dodge"));
        }
        (BattlePhase::Resolving, _) => {
            lines.push(hint_line("..."));
        }
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn command_line(selected: usize) -> Line<'static> {
    let labels: Vec<String> = Command::ALL
        .iter()
        .map(|command| command.label().to_string())
        .collect();
    choice_line(&labels, selected)
}

fn choice_line(labels: &[String], selected: usize) -> Line<'static> {
    let mut spans = Vec::new();
    for (idx, label) in labels.iter().enumerate() {
        if idx == selected {
            spans.push(Span::styled(
                format!("♥ {}", label),
                Style::default().fg(ACCENT_GOLD).add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(
                format!("  {}", label),
                Style::default().fg(TEXT_MAIN),
            ));
        }
        if idx + 1 < labels.len() {
            spans.push(Span::raw("   "));
        }
    }
    Line::from(spans)
}

fn hint_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(TEXT_DIM)))
}

fn hp_line(current: i32, max: i32) -> Line<'static> {
    let width: usize = 12;
    let ratio = if max <= 0 {
        0.0
    } else {
        current.max(0) as f32 / max as f32
    };
    let filled = ((ratio * width as f32).round() as usize).min(width);
    let empty = width.saturating_sub(filled);
    let color = if ratio > 0.5 {
        ACCENT_GREEN
    } else if ratio > 0.2 {
        ACCENT_GOLD
    } else {
        ACCENT_RED
    };
    Line::from(vec![
        Span::raw("HP "),
        Span::styled(
            "█".repeat(filled),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled("░".repeat(empty), Style::default().fg(TEXT_DIM)),
        Span::raw(format!(" {}/{}", current, max)),
    ])
}

fn panel_block<'a, T>(title: T, bg: Color) -> Block<'a>
where
    T: Into<Title<'a>>,
{
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .style(Style::default().bg(bg).fg(TEXT_MAIN))
        .border_style(Style::default().fg(BORDER_ACCENT))
}

fn menu_line(label: &str, selected: bool) -> Line<'static> {
    let style = if selected {
        Style::default()
            .fg(HIGHLIGHT_TEXT)
            .bg(ACCENT_GOLD)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_MAIN)
    };
    Line::from(Span::styled(label.to_string(), style))
}
