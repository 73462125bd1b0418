//! Load order management for Pillars of Eternity II: Deadfire.
//!
//! The game reads `modconfig.json` from its user config folder; this crate
//! keeps an in-memory copy of that file in step with disk and lets users
//! reorder and toggle mods through a two-list editor.

pub mod collections;
pub mod config;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod extension;
pub mod game;
pub mod host;
pub mod load_order;
pub mod manifest;
pub mod modconfig;
pub mod poe2;
pub mod reorder;
pub mod store;
