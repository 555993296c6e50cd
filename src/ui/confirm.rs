use bevy::prelude::*;
use std::time::Duration;

use crate::input::PlayerInput;
use crate::shared::*;

/// How long a new-game request waits for confirmation.
const CONFIRM_WINDOW: Duration = Duration::from_secs(5);

/// Two-step reset: the first request arms, a second request (or `Y`) within
/// the window confirms.
#[derive(Resource, Debug, Default)]
pub struct NewGameConfirm {
    window: Option<Timer>,
}

impl NewGameConfirm {
    /// Returns `true` when this request confirms an armed one.
    pub fn request(&mut self) -> bool {
        if self.window.take().is_some() {
            return true;
        }
        self.window = Some(Timer::new(CONFIRM_WINDOW, TimerMode::Once));
        false
    }

    pub fn confirm(&mut self) -> bool {
        self.window.take().is_some()
    }

    pub fn cancel(&mut self) -> bool {
        self.window.take().is_some()
    }

    /// Returns `true` when an armed request just expired.
    pub fn tick(&mut self, delta: Duration) -> bool {
        let Some(timer) = self.window.as_mut() else {
            return false;
        };
        timer.tick(delta);
        if timer.finished() {
            self.window = None;
            return true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.window.is_some()
    }
}

pub fn handle_new_game_confirmation(
    time: Res<Time>,
    input: Res<PlayerInput>,
    mut confirm: ResMut<NewGameConfirm>,
    mut requests: EventReader<NewGameRequestEvent>,
    mut new_game: EventWriter<NewGameEvent>,
    mut status: EventWriter<StatusEvent>,
) {
    let mut confirmed = false;
    for _ in requests.read() {
        if confirm.request() {
            confirmed = true;
        } else {
            status.send(StatusEvent::warning(
                "Start a new game? Press Y or New game again to confirm",
            ));
        }
    }
    if input.confirm && confirm.confirm() {
        confirmed = true;
    }
    if input.cancel && confirm.cancel() {
        status.send(StatusEvent::info("New game cancelled"));
    }
    if confirmed {
        new_game.send(NewGameEvent);
        status.send(StatusEvent::info("New game"));
        return;
    }
    if confirm.tick(time.delta()) {
        status.send(StatusEvent::info("New game cancelled"));
    }
}
