use crossbeam_channel::Sender;

use super::{MovementSource, StepMovement};
use crate::shared::*;

/// Moves one whole cell per step. Owns the player's cell while active.
#[derive(Debug)]
pub struct ManualMovement {
    geometry: GridGeometry,
    cell: CellId,
    listener: Option<Sender<PositionUpdateEvent>>,
    started: bool,
}

impl ManualMovement {
    pub fn new(geometry: GridGeometry, cell: CellId) -> Self {
        Self {
            geometry,
            cell,
            listener: None,
            started: false,
        }
    }

    fn emit(&self) {
        if !self.started {
            return;
        }
        if let Some(listener) = &self.listener {
            let _ = listener.send(PositionUpdateEvent {
                position: self.geometry.center(self.cell),
                follow_camera: true,
                degraded: false,
            });
        }
    }
}

impl MovementSource for ManualMovement {
    fn mode(&self) -> MovementMode {
        MovementMode::Manual
    }

    fn on_position(&mut self, listener: Sender<PositionUpdateEvent>) {
        self.listener = Some(listener);
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.emit();
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn as_stepper(&mut self) -> Option<&mut dyn StepMovement> {
        Some(self)
    }
}

impl StepMovement for ManualMovement {
    fn step_by(&mut self, dx: i32, dy: i32) -> CellId {
        self.cell = self.cell.offset(dy, dx);
        self.emit();
        self.cell
    }
}
