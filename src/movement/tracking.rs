use bevy::log::{info, warn};
use crossbeam_channel::{unbounded, Receiver, Sender};

use super::location::{LocationError, LocationProvider, LocationReport, WatchId};
use super::MovementSource;
use crate::shared::*;

/// Follows a live-location provider. Falls back to a fixed anchor, flagged
/// as degraded, when the provider can't deliver.
pub struct TrackingMovement {
    provider: Box<dyn LocationProvider>,
    fallback: GeoPosition,
    listener: Option<Sender<PositionUpdateEvent>>,
    watch: Option<(WatchId, Receiver<LocationReport>)>,
    degraded: bool,
    started: bool,
}

impl TrackingMovement {
    pub fn new(provider: Box<dyn LocationProvider>, fallback: GeoPosition) -> Self {
        Self {
            provider,
            fallback,
            listener: None,
            watch: None,
            degraded: false,
            started: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    fn emit(&self, position: GeoPosition, degraded: bool) {
        if let Some(listener) = &self.listener {
            let _ = listener.send(PositionUpdateEvent {
                position,
                follow_camera: true,
                degraded,
            });
        }
    }

    /// One fallback per outage; a later good fix clears it.
    fn fall_back(&mut self, error: &LocationError) {
        if self.degraded {
            return;
        }
        warn!("Live location lost ({error}); using the fallback anchor");
        self.degraded = true;
        self.emit(self.fallback, true);
    }
}

impl MovementSource for TrackingMovement {
    fn mode(&self) -> MovementMode {
        MovementMode::Tracking
    }

    fn on_position(&mut self, listener: Sender<PositionUpdateEvent>) {
        self.listener = Some(listener);
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let (tx, rx) = unbounded();
        match self.provider.watch(tx) {
            Ok(id) => {
                info!("Tracking live location (watch {})", id.0);
                self.watch = Some((id, rx));
            }
            Err(error) => self.fall_back(&error),
        }
    }

    fn stop(&mut self) {
        self.started = false;
        self.degraded = false;
        if let Some((id, _)) = self.watch.take() {
            self.provider.clear_watch(id);
        }
    }

    fn poll(&mut self) {
        if !self.started {
            return;
        }
        self.provider.poll();
        let reports: Vec<LocationReport> = match &self.watch {
            Some((_, rx)) => rx.try_iter().collect(),
            None => return,
        };
        for report in reports {
            match report {
                Ok(position) => {
                    self.degraded = false;
                    self.emit(position, false);
                }
                Err(error) => self.fall_back(&error),
            }
        }
    }
}
