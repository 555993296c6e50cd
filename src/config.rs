//! Startup configuration.
//!
//! Defaults are compiled in. Native builds also look for `geomerge.ron` in
//! the working directory and then next to the executable; any field left out
//! keeps its default. A file that fails to parse is ignored with a warning.

use bevy::log::{info, warn};

use crate::shared::{GameConfig, WindowStrategy};

pub const CONFIG_FILE: &str = "geomerge.ron";

/// Largest window radius or viewport margin, in cells. Every sync walks the
/// whole window, so the frame cost grows with its square.
pub const MAX_WINDOW_CELLS: u32 = 64;

pub fn parse_game_config(text: &str) -> Result<GameConfig, ron::error::SpannedError> {
    ron::from_str::<GameConfig>(text).map(sanitize)
}

/// Replaces values the game can't run with by their defaults.
fn sanitize(mut config: GameConfig) -> GameConfig {
    let defaults = GameConfig::default();
    if !(config.cell_size.is_finite() && config.cell_size > 0.0) {
        warn!("cell_size {} is unusable, using {}", config.cell_size, defaults.cell_size);
        config.cell_size = defaults.cell_size;
    }
    if config.win_target < 2 {
        warn!("win_target {} is unreachable, using {}", config.win_target, defaults.win_target);
        config.win_target = defaults.win_target;
    }
    config.window = match config.window {
        WindowStrategy::PlayerRadius { radius } if radius > MAX_WINDOW_CELLS => {
            warn!("window radius {} is too large, using {}", radius, MAX_WINDOW_CELLS);
            WindowStrategy::PlayerRadius {
                radius: MAX_WINDOW_CELLS,
            }
        }
        WindowStrategy::Viewport { margin } if margin.unsigned_abs() > MAX_WINDOW_CELLS => {
            let limit = MAX_WINDOW_CELLS as i32;
            warn!("viewport margin {} is out of range, using {}", margin, margin.clamp(-limit, limit));
            WindowStrategy::Viewport {
                margin: margin.clamp(-limit, limit),
            }
        }
        window => window,
    };
    if config.save_size_cap == 0 {
        config.save_size_cap = defaults.save_size_cap;
    }
    config
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_game_config() -> GameConfig {
    use std::path::PathBuf;

    let mut candidates = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    {
        candidates.push(dir.join(CONFIG_FILE));
    }

    for path in candidates {
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        return match parse_game_config(&text) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                GameConfig::default()
            }
        };
    }
    GameConfig::default()
}

#[cfg(target_arch = "wasm32")]
pub fn load_game_config() -> GameConfig {
    GameConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{MergePolicy, MovementMode, WindowStrategy};

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = parse_game_config(
            "(win_target: 2048, merge_policy: WritesToCell, window: Viewport(margin: 2))",
        )
        .unwrap();
        assert_eq!(config.win_target, 2048);
        assert_eq!(config.merge_policy, MergePolicy::WritesToCell);
        assert_eq!(config.window, WindowStrategy::Viewport { margin: 2 });
        assert_eq!(config.interaction_radius, GameConfig::default().interaction_radius);
    }

    #[test]
    fn test_movement_mode_spelling() {
        let config = parse_game_config("(default_movement: tracking, memoryless: false)").unwrap();
        assert_eq!(config.default_movement, MovementMode::Tracking);
        assert!(!config.memoryless);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(parse_game_config("(win_target: \"lots\")").is_err());
        assert!(parse_game_config("not ron at all").is_err());
    }

    #[test]
    fn test_unusable_values_fall_back() {
        let config = parse_game_config("(cell_size: 0.0, win_target: 1)").unwrap();
        assert_eq!(config.cell_size, GameConfig::default().cell_size);
        assert_eq!(config.win_target, GameConfig::default().win_target);
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let config = parse_game_config("(window: PlayerRadius(radius: 100000))").unwrap();
        assert_eq!(
            config.window,
            WindowStrategy::PlayerRadius {
                radius: MAX_WINDOW_CELLS
            }
        );

        let config = parse_game_config("(window: Viewport(margin: -5000))").unwrap();
        assert_eq!(config.window, WindowStrategy::Viewport { margin: -64 });

        let config = parse_game_config("(window: PlayerRadius(radius: 12))").unwrap();
        assert_eq!(config.window, WindowStrategy::PlayerRadius { radius: 12 });
    }
}
