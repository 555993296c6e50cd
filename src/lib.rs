//! GeoMerge library crate. Re-exports all modules for integration testing.
//!
//! The binary crate (`main.rs`) is the actual game entry point.
//! This library crate exposes the same modules so that `tests/` integration
//! tests can drive the game's systems and resources without a window or GPU.

pub mod shared;
pub mod grid;
pub mod tokens;
pub mod debounce;
pub mod config;
pub mod input;
pub mod window;
pub mod crafting;
pub mod movement;
pub mod save;
pub mod ui;
