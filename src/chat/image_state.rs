use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageLoadState {
    Loading,
    Loaded,
    Error,
}

/// A state change for one message's image, tagged with the attempt that caused it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageTransition {
    pub message_id: String,
    pub state: ImageLoadState,
    pub attempt: u64,
}

struct ImageEntry {
    url: String,
    state: ImageLoadState,
    attempt: u64,
    timer: Option<AbortHandle>,
}

impl ImageEntry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct TrackerInner {
    entries: HashMap<String, ImageEntry>,
    next_attempt: u64,
}

/// Per-message image load state with a load deadline.
///
/// Every (re)start of a load gets a fresh attempt number. Completion, failure and
/// timeout signals carry the attempt they belong to, and anything from a superseded
/// attempt is ignored.
#[derive(Clone)]
pub struct ImageLoadTracker {
    inner: Arc<Mutex<TrackerInner>>,
    timeout: Duration,
    events: Option<mpsc::UnboundedSender<ImageTransition>>,
}

impl ImageLoadTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner::default())),
            timeout,
            events: None,
        }
    }

    /// Tracker plus a receiver of every state transition it makes.
    pub fn with_events(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<ImageTransition>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tracker = Self::new(timeout);
        tracker.events = Some(tx);
        (tracker, rx)
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, message_id: &str, state: ImageLoadState, attempt: u64) {
        if let Some(events) = &self.events {
            let _ = events.send(ImageTransition {
                message_id: message_id.to_string(),
                state,
                attempt,
            });
        }
    }

    pub fn state(&self, message_id: &str) -> Option<ImageLoadState> {
        self.lock().entries.get(message_id).map(|entry| entry.state)
    }

    pub fn attempt(&self, message_id: &str) -> Option<u64> {
        self.lock().entries.get(message_id).map(|entry| entry.attempt)
    }

    /// Register the image a message currently renders. Starts a new load when the
    /// message is new or its url changed, returning the attempt number.
    pub fn observe(&self, message_id: &str, image_url: Option<&str>) -> Option<u64> {
        let Some(url) = image_url.filter(|url| !url.is_empty()) else {
            self.forget(message_id);
            return None;
        };

        let attempt = {
            let mut inner = self.lock();
            if inner
                .entries
                .get(message_id)
                .is_some_and(|entry| entry.url == url)
            {
                return None;
            }
            inner.next_attempt += 1;
            let attempt = inner.next_attempt;
            let entry = ImageEntry {
                url: url.to_string(),
                state: ImageLoadState::Loading,
                attempt,
                timer: self.arm_timeout(message_id, attempt),
            };
            if let Some(mut replaced) = inner.entries.insert(message_id.to_string(), entry) {
                replaced.cancel_timer();
            }
            attempt
        };

        self.emit(message_id, ImageLoadState::Loading, attempt);
        Some(attempt)
    }

    pub fn forget(&self, message_id: &str) {
        if let Some(mut entry) = self.lock().entries.remove(message_id) {
            entry.cancel_timer();
        }
    }

    /// Drop every entry, e.g. when another conversation is opened.
    pub fn clear(&self) {
        for (_, mut entry) in self.lock().entries.drain() {
            entry.cancel_timer();
        }
    }

    pub fn mark_loaded(&self, message_id: &str, attempt: u64) -> bool {
        self.finish(message_id, attempt, ImageLoadState::Loaded)
    }

    pub fn mark_failed(&self, message_id: &str, attempt: u64) -> bool {
        self.finish(message_id, attempt, ImageLoadState::Error)
    }

    /// Deadline for `attempt`. Only moves a still-loading current attempt to `Error`.
    pub fn expire(&self, message_id: &str, attempt: u64) -> bool {
        let expired = self.finish(message_id, attempt, ImageLoadState::Error);
        if expired {
            info!(message_id, attempt, "image load timed out");
        }
        expired
    }

    fn finish(&self, message_id: &str, attempt: u64, state: ImageLoadState) -> bool {
        {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(message_id) else {
                return false;
            };
            if entry.attempt != attempt || entry.state != ImageLoadState::Loading {
                debug!(message_id, attempt, "ignoring stale image signal");
                return false;
            }
            entry.state = state;
            entry.cancel_timer();
        }
        self.emit(message_id, state, attempt);
        true
    }

    /// Manual retry after an error. Other messages are untouched.
    pub fn retry(&self, message_id: &str) -> Option<u64> {
        let attempt = {
            let mut inner = self.lock();
            if inner
                .entries
                .get(message_id)
                .is_none_or(|entry| entry.state != ImageLoadState::Error)
            {
                return None;
            }
            inner.next_attempt += 1;
            let attempt = inner.next_attempt;
            let timer = self.arm_timeout(message_id, attempt);
            let entry = inner.entries.get_mut(message_id)?;
            entry.state = ImageLoadState::Loading;
            entry.attempt = attempt;
            entry.timer = timer;
            attempt
        };

        self.emit(message_id, ImageLoadState::Loading, attempt);
        Some(attempt)
    }

    /// Spawns the deadline for `attempt`. Called with the tracker lock held, so the
    /// timer cannot observe the entry before it is stored.
    fn arm_timeout(&self, message_id: &str, attempt: u64) -> Option<AbortHandle> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(message_id, "no runtime, image timeout not armed");
            return None;
        };
        let tracker = self.clone();
        let message_id = message_id.to_string();
        let timeout = self.timeout;
        let timer = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            tracker.expire(&message_id, attempt);
        });
        Some(timer.abort_handle())
    }
}
