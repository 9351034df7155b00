use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::rules::{self, Route};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActOption {
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub mood: i32,
    #[serde(default)]
    pub pacifies: bool,
}

/// Immutable enemy definition. Battles copy it into a fresh `Enemy`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnemyTemplate {
    pub name: String,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub exp: u32,
    pub mercy_threshold: f64,
    pub acts: Vec<ActOption>,
    #[serde(default)]
    pub dialogue: Vec<String>,
}

impl EnemyTemplate {
    pub fn clamp_into_range(&mut self) {
        self.max_hp = self.max_hp.clamp(1, rules::MAX_HP_CAP);
        self.attack = self.attack.clamp(0, rules::MAX_STAT);
        self.defense = self.defense.clamp(0, rules::MAX_STAT);
        self.exp = self.exp.min(rules::MAX_EXP_REWARD);
        self.mercy_threshold = rules::clamp_threshold(self.mercy_threshold);
        for act in &mut self.acts {
            act.mood = act.mood.clamp(-rules::MAX_MOOD, rules::MAX_MOOD);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncounterDef {
    pub id: String,
    #[serde(default)]
    pub approach: Vec<String>,
    pub enemy: EnemyTemplate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemStack {
    pub name: String,
    pub heal: i32,
    pub qty: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read encounter table {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encounter table is not valid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("encounter table has no encounters")]
    Empty,
    #[error("encounter {id} has no acts")]
    NoActs { id: String },
}

pub async fn load_table(path: &Path) -> Result<Vec<EncounterDef>, TableError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_table(&text)
}

pub fn parse_table(text: &str) -> Result<Vec<EncounterDef>, TableError> {
    let mut table: Vec<EncounterDef> = ron::de::from_str(text)?;
    if table.is_empty() {
        return Err(TableError::Empty);
    }
    if let Some(def) = table.iter().find(|def| def.enemy.acts.is_empty()) {
        return Err(TableError::NoActs { id: def.id.clone() });
    }
    for def in &mut table {
        def.enemy.clamp_into_range();
    }
    Ok(table)
}

fn act(label: &str, text: &str, mood: i32, pacifies: bool) -> ActOption {
    ActOption {
        label: label.to_string(),
        text: text.to_string(),
        mood,
        pacifies,
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|line| line.to_string()).collect()
}

pub fn builtin_table() -> Vec<EncounterDef> {
    vec![
        EncounterDef {
            id: "park-drain".to_string(),
            approach: lines(&[
                "Zoey: Stay sharp, Grim.",
                "Zoey: I'm studying clues about the missing parents.",
                "Something cold drifts up out of the storm drain...",
            ]),
            enemy: EnemyTemplate {
                name: "Shadow Wraith".to_string(),
                max_hp: 30,
                attack: 8,
                defense: 1,
                exp: 10,
                mercy_threshold: 0.15,
                acts: vec![
                    act("Talk", "The wraith shivers at your words.", -2, false),
                    act("Joke", "A hollow chuckle echoes.", -1, false),
                    act(
                        "Show Locket",
                        "The wraith recognises something... it's calmer.",
                        3,
                        false,
                    ),
                ],
                dialogue: lines(&[
                    "A Shadow Wraith blocks the path!",
                    "Shadow Wraith: ...you shouldn't be out this late...",
                ]),
            },
        },
        EncounterDef {
            id: "alley-ghoul".to_string(),
            approach: lines(&[
                "Zack: Got snacks? Let's go cause trouble!",
                "Zack: Epic trick incoming!",
                "The alley behind the arcade smells like old fries.",
            ]),
            enemy: EnemyTemplate {
                name: "Alley Ghoul".to_string(),
                max_hp: 45,
                attack: 11,
                defense: 2,
                exp: 16,
                mercy_threshold: 0.2,
                acts: vec![
                    act("Share Snacks", "The ghoul munches happily.", 2, false),
                    act("Trick", "Epic trick! The ghoul claps despite itself.", 1, false),
                    act("Insult", "The ghoul's eyes narrow.", -1, false),
                    act("Check", "ALLEY GHOUL - ATK 11 DEF 2. Mostly hungry.", 0, false),
                ],
                dialogue: lines(&[
                    "An Alley Ghoul crawls out of a dumpster!",
                    "Alley Ghoul: Those snacks smell great.",
                ]),
            },
        },
        EncounterDef {
            id: "old-house".to_string(),
            approach: lines(&[
                "Mia: You belong with me, Grim.",
                "Mia: I only want to keep you safe.",
                "Bandit: (woof)",
                "The old house on Maple Street creaks open by itself.",
            ]),
            enemy: EnemyTemplate {
                name: "Heartless Echo".to_string(),
                max_hp: 80,
                attack: 14,
                defense: 3,
                exp: 30,
                mercy_threshold: 0.22,
                acts: vec![
                    act("Reassure", "The echo flickers, listening.", 1, false),
                    act("Refuse", "You stand your ground. The echo wails.", 0, false),
                    act(
                        "Remember",
                        "You remember the park at dusk... the echo lowers its guard.",
                        2,
                        true,
                    ),
                    act("Check", "HEARTLESS ECHO - ATK 14 DEF 3. Lonely.", 0, false),
                ],
                dialogue: lines(&[
                    "The Heartless Echo wears a familiar face.",
                    "Heartless Echo: Stay. Everyone stays here.",
                ]),
            },
        },
    ]
}

pub fn item_catalog() -> Vec<(&'static str, &'static str, i32)> {
    vec![
        ("snack", "Greasy Snack", 8),
        ("soda", "Fizzy Soda", 15),
        ("locket-cake", "Locket Cake", 24),
    ]
}

pub fn item_stack(id: &str, qty: u16) -> Option<ItemStack> {
    item_catalog()
        .into_iter()
        .find(|(item_id, _, _)| *item_id == id)
        .map(|(_, name, heal)| ItemStack {
            name: name.to_string(),
            heal,
            qty,
        })
}

pub fn starting_inventory() -> BTreeMap<String, ItemStack> {
    let mut inventory = BTreeMap::new();
    for (id, qty) in [("snack", 2), ("soda", 1)] {
        if let Some(stack) = item_stack(id, qty) {
            inventory.insert(id.to_string(), stack);
        }
    }
    inventory
}

pub fn intro_lines() -> Vec<String> {
    lines(&[
        "Ridgewood, after dark.",
        "The parents of Ridgewood have gone missing, one by one.",
        "Grim Greaser zips up a jacket and heads for the park.",
        "Arrows/WASD dodge. Z/Enter confirms. F5 saves, F9 loads, R resets.",
    ])
}

pub fn ending_lines(route: Route) -> Vec<String> {
    match route {
        Route::Pacifist => lines(&[
            "Ridgewood is quiet tonight.",
            "Every shadow you met walked away whole.",
            "Zoey: Maybe the parents can come home now.",
            "PACIFIST ENDING",
        ]),
        Route::Genocide => lines(&[
            "Ridgewood is very quiet tonight.",
            "Nothing is left to follow you home.",
            "Bandit won't come near you anymore.",
            "GENOCIDE ENDING",
        ]),
        Route::Neutral => lines(&[
            "The streetlights flicker back on.",
            "Some shadows are gone. Some just went somewhere else.",
            "Zack: So... same time tomorrow?",
            "NEUTRAL ENDING",
        ]),
    }
}

pub fn game_over_lines() -> Vec<String> {
    lines(&[
        "Your SOUL shatters...",
        "Grim! Stay determined...",
        "GAME OVER",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_table_is_playable() {
        let table = builtin_table();
        assert_eq!(table.len(), 3);
        for def in &table {
            assert!(def.enemy.max_hp > 0);
            assert!(!def.enemy.acts.is_empty());
            assert!((0.0..=1.0).contains(&def.enemy.mercy_threshold));
        }
    }

    #[test]
    fn bundled_table_matches_builtin_names() {
        let table = parse_table(include_str!("../assets/encounters.ron")).unwrap();
        let names: Vec<&str> = table.iter().map(|def| def.enemy.name.as_str()).collect();
        let builtin = builtin_table();
        let expected: Vec<&str> = builtin.iter().map(|def| def.enemy.name.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(parse_table("[]"), Err(TableError::Empty)));
        assert!(matches!(parse_table("[(id: 1)]"), Err(TableError::Parse(_))));
    }

    #[test]
    fn act_fields_default() {
        let table = parse_table(
            r#"[(
                id: "x",
                enemy: (
                    name: "Blob",
                    max_hp: 5,
                    attack: 1,
                    defense: 0,
                    exp: 1,
                    mercy_threshold: 0.5,
                    acts: [(label: "Poke", text: "It jiggles.")],
                ),
            )]"#,
        )
        .unwrap();
        let act = &table[0].enemy.acts[0];
        assert_eq!(act.mood, 0);
        assert!(!act.pacifies);
        assert!(table[0].approach.is_empty());
    }

    #[test]
    fn table_stats_are_clamped() {
        let table = parse_table(
            r#"[(
                id: "x",
                enemy: (
                    name: "Titan",
                    max_hp: -4,
                    attack: 2147483647,
                    defense: -2147483648,
                    exp: 4000000000,
                    mercy_threshold: 3.5,
                    acts: [(label: "Poke", text: "...", mood: 2147483647)],
                ),
            )]"#,
        )
        .unwrap();
        let enemy = &table[0].enemy;
        assert_eq!(enemy.max_hp, 1);
        assert_eq!(enemy.attack, rules::MAX_STAT);
        assert_eq!(enemy.defense, 0);
        assert_eq!(enemy.exp, rules::MAX_EXP_REWARD);
        assert_eq!(enemy.mercy_threshold, 1.0);
        assert_eq!(enemy.acts[0].mood, rules::MAX_MOOD);
    }

    #[test]
    fn starting_inventory_has_stock() {
        let inventory = starting_inventory();
        assert_eq!(inventory.get("snack").map(|s| s.qty), Some(2));
        assert_eq!(inventory.get("soda").map(|s| s.heal), Some(15));
        assert!(item_stack("nope", 1).is_none());
    }
}
