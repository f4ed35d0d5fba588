//! User-visible notifications and their persisted preferences.
//!
//! Every error and informational message the engine surfaces goes through
//! [`NotificationCenter`]. A UI subscribes and renders notices as transient
//! toasts; nothing here blocks.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::audio;
use crate::storage::Storage;
use crate::stores::{Listeners, SubscriptionId};

pub const ACTIVE_KEY: &str = "notifications-active";
pub const SOUND_KEY: &str = "notifications-sound";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
    /// A message arrived for a conversation that is not on screen.
    NewMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Notification preferences, both on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPrefs {
    pub active: bool,
    pub sound: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            active: true,
            sound: true,
        }
    }
}

struct Inner {
    prefs: RwLock<NotificationPrefs>,
    storage: Storage,
    listeners: Listeners<Notice>,
}

#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    /// Create a center, reading preferences from `storage` once.
    pub fn new(storage: Storage) -> Self {
        let defaults = NotificationPrefs::default();
        let prefs = NotificationPrefs {
            active: storage.load::<bool>(ACTIVE_KEY).unwrap_or(defaults.active),
            sound: storage.load::<bool>(SOUND_KEY).unwrap_or(defaults.sound),
        };
        Self {
            inner: Arc::new(Inner {
                prefs: RwLock::new(prefs),
                storage,
                listeners: Listeners::default(),
            }),
        }
    }

    pub fn prefs(&self) -> NotificationPrefs {
        *self.inner.prefs.read()
    }

    /// Update preferences; each provided value is persisted immediately.
    pub fn set_values(&self, active: Option<bool>, sound: Option<bool>) {
        {
            let mut prefs = self.inner.prefs.write();
            if let Some(active) = active {
                prefs.active = active;
            }
            if let Some(sound) = sound {
                prefs.sound = sound;
            }
        }
        if let Some(active) = active {
            if !self.inner.storage.save(ACTIVE_KEY, &active) {
                crate::log_warn!("Failed to persist {}", ACTIVE_KEY);
            }
        }
        if let Some(sound) = sound {
            if !self.inner.storage.save(SOUND_KEY, &sound) {
                crate::log_warn!("Failed to persist {}", SOUND_KEY);
            }
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Info, text));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Success, text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Warning, text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Error, text));
    }

    /// Announce a message for a conversation that is not on screen. Shown
    /// only when notifications are active; plays a sound when enabled.
    pub fn notify(&self, text: impl Into<String>) {
        let prefs = self.prefs();
        if prefs.active {
            self.emit(Notice::new(NoticeLevel::NewMessage, text));
        }
        if prefs.sound {
            audio::play_notification();
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&Notice) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    fn emit(&self, notice: Notice) {
        crate::log_debug!("notice [{:?}] {}", notice.level, notice.text);
        self.inner.listeners.notify(&notice);
    }
}
