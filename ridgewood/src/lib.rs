//! Grim Greaser: Ridgewood
//!
//! Story dialogue and soul-dodge battles, exposed as a library for testing.

pub mod action;
pub mod audio;
pub mod dialogue;
pub mod dodge;
pub mod effect;
pub mod encounter;
pub mod persist;
pub mod reducer;
pub mod rules;
pub mod state;
pub mod ui;
