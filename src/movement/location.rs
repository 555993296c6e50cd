//! Live-location providers.
//!
//! A provider pushes fixes (or failures) into a channel once watched. On the
//! web this is the browser's Geolocation API; on native builds there is no
//! location service, so the default provider reports `Unavailable` and the
//! scripted provider replays fixes for demos and tests.

use crossbeam_channel::Sender;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::shared::GeoPosition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location services are unavailable")]
    Unavailable,
    #[error("location permission was denied")]
    Denied,
    #[error("location error: {0}")]
    Other(String),
}

pub type LocationReport = Result<GeoPosition, LocationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchId(pub i32);

/// A source of position fixes.
///
/// The first report of a watch doubles as the one-shot current position.
pub trait LocationProvider: Send + Sync {
    fn watch(&mut self, reports: Sender<LocationReport>) -> Result<WatchId, LocationError>;

    fn clear_watch(&mut self, id: WatchId);

    /// Per-frame hook for providers that deliver on the main thread.
    fn poll(&mut self) {}
}

/// Whatever has to stay alive for as long as a watch runs, keyed by watch.
/// The browser provider parks its JS callbacks here and drops them when the
/// watch is cleared.
#[derive(Debug)]
pub struct WatchCallbacks<T> {
    held: HashMap<i32, T>,
}

impl<T> Default for WatchCallbacks<T> {
    fn default() -> Self {
        Self {
            held: HashMap::new(),
        }
    }
}

impl<T> WatchCallbacks<T> {
    pub fn hold(&mut self, id: WatchId, callbacks: T) {
        self.held.insert(id.0, callbacks);
    }

    pub fn release(&mut self, id: WatchId) -> Option<T> {
        self.held.remove(&id.0)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Native default: there is nothing to watch.
#[derive(Debug, Default)]
pub struct UnavailableLocation;

impl LocationProvider for UnavailableLocation {
    fn watch(&mut self, _reports: Sender<LocationReport>) -> Result<WatchId, LocationError> {
        Err(LocationError::Unavailable)
    }

    fn clear_watch(&mut self, _id: WatchId) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted
// ─────────────────────────────────────────────────────────────────────────────

/// Push side of a scripted provider. Clone it before boxing the provider to
/// keep feeding fixes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    queue: Arc<Mutex<VecDeque<LocationReport>>>,
}

impl ScriptedFeed {
    pub fn push(&self, report: LocationReport) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(report);
        }
    }

    pub fn push_fix(&self, position: GeoPosition) {
        self.push(Ok(position));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn pop(&self) -> Option<LocationReport> {
        self.queue.lock().ok()?.pop_front()
    }
}

/// Replays queued reports, one per poll, while watched.
#[derive(Debug, Default)]
pub struct ScriptedLocation {
    feed: ScriptedFeed,
    refuse: Option<LocationError>,
    active: Option<(WatchId, Sender<LocationReport>)>,
    next_id: i32,
}

impl ScriptedLocation {
    pub fn new(fixes: impl IntoIterator<Item = GeoPosition>) -> Self {
        let provider = Self::default();
        for fix in fixes {
            provider.feed.push_fix(fix);
        }
        provider
    }

    /// A provider that replays whatever is pushed into `feed`.
    pub fn from_feed(feed: ScriptedFeed) -> Self {
        Self {
            feed,
            ..Self::default()
        }
    }

    /// A provider whose `watch` fails outright.
    pub fn refusing(error: LocationError) -> Self {
        Self {
            refuse: Some(error),
            ..Self::default()
        }
    }

    pub fn feed(&self) -> ScriptedFeed {
        self.feed.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.active.is_some()
    }
}

impl LocationProvider for ScriptedLocation {
    fn watch(&mut self, reports: Sender<LocationReport>) -> Result<WatchId, LocationError> {
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }
        self.next_id += 1;
        let id = WatchId(self.next_id);
        self.active = Some((id, reports));
        Ok(id)
    }

    fn clear_watch(&mut self, id: WatchId) {
        if matches!(self.active, Some((active, _)) if active == id) {
            self.active = None;
        }
    }

    fn poll(&mut self) {
        let Some((_, reports)) = &self.active else {
            return;
        };
        if let Some(report) = self.feed.pop() {
            // A dropped receiver just means nobody is listening any more.
            let _ = reports.send(report);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Browser
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserGeolocation;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::*;
    use std::cell::RefCell;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use web_sys::{Geolocation, GeolocationPosition, GeolocationPositionError};

    const PERMISSION_DENIED: u16 = 1;

    type Callbacks = (
        Closure<dyn FnMut(GeolocationPosition)>,
        Closure<dyn FnMut(GeolocationPositionError)>,
    );

    thread_local! {
        static WATCHES: RefCell<WatchCallbacks<Callbacks>> =
            RefCell::new(WatchCallbacks::default());
    }

    /// `navigator.geolocation`, looked up per call so the provider stays
    /// `Send`.
    #[derive(Debug, Default)]
    pub struct BrowserGeolocation;

    fn geolocation() -> Result<Geolocation, LocationError> {
        let window = web_sys::window().ok_or(LocationError::Unavailable)?;
        window
            .navigator()
            .geolocation()
            .map_err(|_| LocationError::Unavailable)
    }

    impl LocationProvider for BrowserGeolocation {
        fn watch(&mut self, reports: Sender<LocationReport>) -> Result<WatchId, LocationError> {
            let geolocation = geolocation()?;

            let fixes = reports.clone();
            let on_fix = Closure::<dyn FnMut(GeolocationPosition)>::new(
                move |position: GeolocationPosition| {
                    let coords = position.coords();
                    let _ = fixes.send(Ok(GeoPosition::new(coords.latitude(), coords.longitude())));
                },
            );
            let on_error = Closure::<dyn FnMut(GeolocationPositionError)>::new(
                move |error: GeolocationPositionError| {
                    let report = if error.code() == PERMISSION_DENIED {
                        LocationError::Denied
                    } else {
                        LocationError::Other(error.message())
                    };
                    let _ = reports.send(Err(report));
                },
            );

            let id = geolocation
                .watch_position_with_error_callback(
                    on_fix.as_ref().unchecked_ref(),
                    Some(on_error.as_ref().unchecked_ref()),
                )
                .map_err(|_| LocationError::Unavailable)?;

            let id = WatchId(id);
            WATCHES.with(|watches| watches.borrow_mut().hold(id, (on_fix, on_error)));
            Ok(id)
        }

        fn clear_watch(&mut self, id: WatchId) {
            if let Ok(geolocation) = geolocation() {
                geolocation.clear_watch(id.0);
            }
            // Only safe to free once the browser can no longer call them.
            let released = WATCHES.with(|watches| watches.borrow_mut().release(id));
            drop(released);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_unavailable_provider_refuses_to_watch() {
        let (tx, _rx) = unbounded();
        assert_eq!(
            UnavailableLocation.watch(tx),
            Err(LocationError::Unavailable)
        );
    }

    #[test]
    fn test_scripted_provider_replays_one_fix_per_poll() {
        let mut provider = ScriptedLocation::new([
            GeoPosition::new(1.0, 2.0),
            GeoPosition::new(3.0, 4.0),
        ]);
        let (tx, rx) = unbounded();
        provider.watch(tx).unwrap();
        provider.poll();
        assert_eq!(rx.try_recv().unwrap(), Ok(GeoPosition::new(1.0, 2.0)));
        assert!(rx.try_recv().is_err());
        provider.poll();
        assert_eq!(rx.try_recv().unwrap(), Ok(GeoPosition::new(3.0, 4.0)));
    }

    #[test]
    fn test_scripted_provider_is_silent_after_clear_watch() {
        let mut provider = ScriptedLocation::new([GeoPosition::new(1.0, 2.0)]);
        let feed = provider.feed();
        let (tx, rx) = unbounded();
        let id = provider.watch(tx).unwrap();
        provider.clear_watch(id);
        provider.clear_watch(id);
        provider.poll();
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.pending(), 1);
        assert!(!provider.is_watching());
    }

    #[test]
    fn test_watch_callbacks_are_dropped_on_release() {
        let mut watches = WatchCallbacks::default();
        let alive = Arc::new(());
        watches.hold(WatchId(1), Arc::clone(&alive));
        watches.hold(WatchId(2), Arc::clone(&alive));
        assert_eq!(watches.len(), 2);
        assert_eq!(Arc::strong_count(&alive), 3);

        assert!(watches.release(WatchId(1)).is_some());
        assert!(watches.release(WatchId(1)).is_none());
        assert_eq!(Arc::strong_count(&alive), 2);

        watches.release(WatchId(2));
        assert!(watches.is_empty());
        assert_eq!(Arc::strong_count(&alive), 1);
    }

    #[test]
    fn test_refusing_provider_reports_denied() {
        let mut provider = ScriptedLocation::refusing(LocationError::Denied);
        let (tx, _rx) = unbounded();
        assert_eq!(provider.watch(tx), Err(LocationError::Denied));
    }
}
