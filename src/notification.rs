//! Transient success/error messages shown after an asynchronous operation settles.
//!
//! A [`NotificationCenter`] holds at most one message; showing a new one replaces
//! the old one. Dismissal happens explicitly, when the display duration has
//! elapsed, or from the timer that `show` starts when called inside a tokio runtime.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use log::debug;
use tokio::runtime::Handle;
use tokio::time::Instant;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    pub duration: Duration,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            duration: DEFAULT_DURATION,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

/// Identifies one `show` call, so a stale timer cannot close a newer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

type DismissListener = Box<dyn Fn(&Notification) + Send + Sync>;

struct Active {
    id: NotificationId,
    notification: Notification,
    shown_at: Instant,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    active: Option<Active>,
}

/// State shared with the dismissal timers.
#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    on_dismiss: Option<DismissListener>,
}

impl Shared {
    fn take_if(&self, keep: impl FnOnce(&Active) -> bool) -> Option<Notification> {
        let taken = {
            let mut slot = self.slot.lock();
            let matches = slot.active.as_ref().is_some_and(keep);
            if matches { slot.active.take() } else { None }
        };
        taken.map(|active| {
            if let Some(listener) = &self.on_dismiss {
                listener(&active.notification);
            }
            active.notification
        })
    }
}

pub struct NotificationCenter {
    shared: Arc<Shared>,
    default_duration: Duration,
}

impl NotificationCenter {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            default_duration,
        }
    }

    /// Registers the callback run whenever a message is dismissed (not when it is replaced).
    pub fn with_listener<F>(mut self, listener: F) -> Self
        where F: Fn(&Notification) + Send + Sync + 'static
    {
        let slot = std::mem::take(&mut *self.shared.slot.lock());
        self.shared = Arc::new(Shared {
            slot: Mutex::new(slot),
            on_dismiss: Some(Box::new(listener)),
        });
        self
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.show(Notification::new(NotificationKind::Success, message).with_duration(self.default_duration))
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.show(Notification::new(NotificationKind::Error, message).with_duration(self.default_duration))
    }

    /// Displays `notification` in place of any current one. Inside a tokio
    /// runtime it closes itself once its duration has elapsed.
    pub fn show(&self, notification: Notification) -> NotificationId {
        let duration = notification.duration;
        let id = {
            let mut slot = self.shared.slot.lock();
            slot.next_id += 1;
            let id = NotificationId(slot.next_id);
            debug!("Showing {} notification: {}", notification.kind, notification.message);
            slot.active = Some(Active {
                id,
                notification,
                shown_at: Instant::now(),
            });
            id
        };

        if let Ok(handle) = Handle::try_current() {
            let shared = self.shared.clone();
            handle.spawn(async move {
                tokio::time::sleep(duration).await;
                if shared.take_if(|active| active.id == id).is_some() {
                    debug!("Notification closed after {:?}", duration);
                }
            });
        }
        id
    }

    pub fn current(&self) -> Option<Notification> {
        self.shared.slot.lock().active.as_ref().map(|active| active.notification.clone())
    }

    pub fn current_id(&self) -> Option<NotificationId> {
        self.shared.slot.lock().active.as_ref().map(|active| active.id)
    }

    /// Explicit close.
    pub fn dismiss(&self) -> Option<Notification> {
        self.shared.take_if(|_| true)
    }

    /// Dismisses only if `id` is still the message on display.
    pub fn dismiss_if(&self, id: NotificationId) -> bool {
        self.shared.take_if(|active| active.id == id).is_some()
    }

    /// Dismisses the current message if its duration has run out by `now`.
    pub fn dismiss_expired(&self, now: Instant) -> bool {
        self.shared
            .take_if(|active| {
                now.saturating_duration_since(active.shown_at) >= active.notification.duration
            })
            .is_some()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}
