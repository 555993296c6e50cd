//! Inventory and crafting: the click state machine.
//!
//! The player has one hand. Clicking a reachable cell picks up, places, or
//! merges according to what the hand holds and what the cell holds. All
//! rules live in `click`, a plain function over the session, so they can be
//! exercised without an App.

use bevy::prelude::*;

use crate::grid::in_range;
use crate::shared::*;
use crate::window::{CellWindow, CommandViewSink, SyncContext, WindowSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CraftingRules {
    pub interaction_radius: u32,
    pub win_target: TokenValue,
    pub merge_policy: MergePolicy,
}

impl CraftingRules {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            interaction_radius: config.interaction_radius,
            win_target: config.win_target,
            merge_policy: config.merge_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    OutOfRange,
    /// In reach, but the rules say nothing happens.
    Ignored,
    PickedUp(TokenValue),
    Merged {
        value: TokenValue,
        kept_in_hand: bool,
    },
    Placed(TokenValue),
}

impl ClickOutcome {
    pub fn changed_state(self) -> bool {
        matches!(
            self,
            ClickOutcome::PickedUp(_) | ClickOutcome::Merged { .. } | ClickOutcome::Placed(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickResult {
    pub outcome: ClickOutcome,
    /// Set only on the transition that produced a merge at or above the
    /// target.
    pub win: Option<TokenValue>,
}

impl ClickResult {
    fn quiet(outcome: ClickOutcome) -> Self {
        Self { outcome, win: None }
    }
}

/// Applies one click to the session.
pub fn click(session: &mut Session, cell: CellId, rules: &CraftingRules) -> ClickResult {
    if !in_range(cell, session.player_cell, rules.interaction_radius) {
        return ClickResult::quiet(ClickOutcome::OutOfRange);
    }

    let on_cell = session.tokens.effective_value(cell);
    match (session.held, on_cell) {
        (Held::Empty, 0) => ClickResult::quiet(ClickOutcome::Ignored),
        (Held::Empty, value) => {
            session.tokens.set_value(cell, 0);
            session.held = Held::Holding(value);
            ClickResult::quiet(ClickOutcome::PickedUp(value))
        }
        (Held::Holding(held), 0) => {
            session.tokens.set_value(cell, held);
            session.held = Held::Empty;
            ClickResult::quiet(ClickOutcome::Placed(held))
        }
        (Held::Holding(held), value) if value == held => {
            // Past the largest power of two a u32 holds there is nothing to
            // merge into.
            let Some(merged) = held.checked_mul(2) else {
                return ClickResult::quiet(ClickOutcome::Ignored);
            };
            let kept_in_hand = match rules.merge_policy {
                MergePolicy::StaysInHand => {
                    session.tokens.set_value(cell, 0);
                    session.held = Held::Holding(merged);
                    true
                }
                MergePolicy::WritesToCell => {
                    session.tokens.set_value(cell, merged);
                    session.held = Held::Empty;
                    false
                }
            };
            let win = (merged >= rules.win_target).then_some(merged);
            if win.is_some() {
                session.won = true;
            }
            ClickResult {
                outcome: ClickOutcome::Merged {
                    value: merged,
                    kept_in_hand,
                },
                win,
            }
        }
        (Held::Holding(_), _) => ClickResult::quiet(ClickOutcome::Ignored),
    }
}

pub struct CraftingPlugin;

impl Plugin for CraftingPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<CellClickEvent>()
            .add_event::<WinEvent>()
            .add_event::<StatusEvent>()
            .add_systems(
                Update,
                handle_cell_clicks
                    .after(WindowSet)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Runs after the window so a position update from the same frame is
/// fully applied before any click is judged.
pub fn handle_cell_clicks(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut clicks: EventReader<CellClickEvent>,
    mut session: ResMut<Session>,
    window: Option<Res<CellWindow>>,
    mut wins: EventWriter<WinEvent>,
    mut status: EventWriter<StatusEvent>,
) {
    let rules = CraftingRules::from_config(&config);
    for event in clicks.read() {
        // No-op clicks must not schedule a save.
        let result = click(session.bypass_change_detection(), event.cell, &rules);
        match result.outcome {
            ClickOutcome::OutOfRange => {
                status.send(StatusEvent::info(format!("{} is out of reach", event.cell)));
                continue;
            }
            ClickOutcome::Ignored => continue,
            ClickOutcome::PickedUp(v) => debug!("picked up {} from {}", v, event.cell),
            ClickOutcome::Placed(v) => debug!("placed {} on {}", v, event.cell),
            ClickOutcome::Merged { value, .. } => {
                info!("merged to {} at {}", value, event.cell)
            }
        }
        session.set_changed();

        if let Some(window) = window.as_deref() {
            let ctx = SyncContext::new(&config, session.player_cell);
            let mut sink = CommandViewSink::new(&mut commands, ctx.geometry);
            window.refresh_cell(event.cell, &ctx, &session.tokens, &mut sink);
        }

        if let Some(value) = result.win {
            info!("win: reached {} (target {})", value, config.win_target);
            wins.send(WinEvent { value });
            status.send(StatusEvent {
                message: format!("You made {value}! Target reached."),
                kind: StatusKind::Win,
            });
        }
    }
}
