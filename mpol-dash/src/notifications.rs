//! Transient user notifications
//!
//! Messages queue in arrival order. At most `max_visible` are shown at once;
//! each shown message dismisses itself after its lifetime, which promotes the
//! next pending one.

use chrono::Utc;
use mpol_common::config::TuningConfig;
use mpol_common::events::{DashEvent, EventBus, NotificationLevel};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One user-visible message
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub message: String,
    pub lifetime: Duration,
}

/// Display limits and lifetimes
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub max_visible: usize,
    pub lifetime: Duration,
    pub error_lifetime: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self::from(&TuningConfig::default())
    }
}

impl From<&TuningConfig> for NotificationConfig {
    fn from(tuning: &TuningConfig) -> Self {
        Self {
            max_visible: tuning.max_visible_notifications.max(1),
            lifetime: tuning.notification_lifetime(),
            error_lifetime: tuning.error_notification_lifetime(),
        }
    }
}

#[derive(Debug, Default)]
struct CenterInner {
    visible: Vec<Notification>,
    pending: VecDeque<Notification>,
}

/// Queued, auto-dismissing notifications
///
/// Cheap to clone; all clones share the same queue.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Mutex<CenterInner>>,
    events: EventBus,
    config: NotificationConfig,
}

impl NotificationCenter {
    pub fn new(events: EventBus, config: NotificationConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CenterInner::default())),
            events,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CenterInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a message; returns its id
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) -> Uuid {
        let message = message.into();
        match level {
            NotificationLevel::Error => error!(%message, "notification"),
            NotificationLevel::Warning => warn!(%message, "notification"),
            _ => info!(%message, "notification"),
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            level,
            lifetime: match level {
                NotificationLevel::Error => self.config.error_lifetime,
                _ => self.config.lifetime,
            },
            message,
        };
        let id = notification.id;

        let shown = {
            let mut inner = self.lock();
            if inner.visible.len() < self.config.max_visible {
                inner.visible.push(notification.clone());
                Some(notification)
            } else {
                inner.pending.push_back(notification);
                None
            }
        };

        if let Some(notification) = shown {
            self.show(notification);
        }
        id
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.notify(NotificationLevel::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.notify(NotificationLevel::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.notify(NotificationLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.notify(NotificationLevel::Error, message)
    }

    /// Remove a message early; returns false if it was already gone
    pub fn dismiss(&self, id: Uuid) -> bool {
        let (removed, promoted) = {
            let mut inner = self.lock();
            if let Some(pos) = inner.visible.iter().position(|n| n.id == id) {
                inner.visible.remove(pos);
                let promoted = inner.pending.pop_front();
                if let Some(next) = &promoted {
                    inner.visible.push(next.clone());
                }
                (true, promoted)
            } else if let Some(pos) = inner.pending.iter().position(|n| n.id == id) {
                inner.pending.remove(pos);
                return true;
            } else {
                (false, None)
            }
        };

        if removed {
            self.events.emit_lossy(DashEvent::NotificationDismissed {
                id,
                timestamp: Utc::now(),
            });
        }
        if let Some(next) = promoted {
            self.show(next);
        }
        removed
    }

    /// Messages currently shown, oldest first
    pub fn visible(&self) -> Vec<Notification> {
        self.lock().visible.clone()
    }

    /// Messages waiting for a free slot, in arrival order
    pub fn pending(&self) -> Vec<Notification> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Number of messages waiting for a free slot
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    fn show(&self, notification: Notification) {
        self.events.emit_lossy(DashEvent::NotificationShown {
            id: notification.id,
            level: notification.level,
            message: notification.message.clone(),
            timestamp: Utc::now(),
        });
        self.schedule_dismiss(notification.id, notification.lifetime);
    }

    fn schedule_dismiss(&self, id: Uuid, lifetime: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(%id, "No runtime; notification stays until dismissed");
            return;
        };
        let center = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(lifetime).await;
            center.dismiss(id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center(max_visible: usize) -> (NotificationCenter, EventBus) {
        let bus = EventBus::new(100);
        let config = NotificationConfig {
            max_visible,
            lifetime: Duration::from_secs(3),
            error_lifetime: Duration::from_secs(5),
        };
        (NotificationCenter::new(bus.clone(), config), bus)
    }

    #[test]
    fn test_queues_beyond_visible_limit() {
        let (center, _bus) = center(2);
        let first = center.info("one");
        center.info("two");
        center.info("three");

        assert_eq!(center.visible().len(), 2);
        assert_eq!(center.pending_count(), 1);

        assert!(center.dismiss(first));
        let messages: Vec<_> = center.visible().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
        assert_eq!(center.pending_count(), 0);
    }

    #[test]
    fn test_dismiss_unknown_is_false() {
        let (center, _bus) = center(3);
        assert!(!center.dismiss(Uuid::new_v4()));
    }

    #[test]
    fn test_error_lifetime_longer() {
        let (center, _bus) = center(3);
        center.error("boom");
        center.success("ok");
        let visible = center.visible();
        assert_eq!(visible[0].lifetime, Duration::from_secs(5));
        assert_eq!(visible[1].lifetime, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_promotes_pending() {
        let (center, bus) = center(1);
        let mut rx = bus.subscribe();

        center.info("first");
        center.info("second");
        assert_eq!(center.visible()[0].message, "first");

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(center.visible().len(), 1);
        assert_eq!(center.visible()[0].message, "second");

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(center.visible().is_empty());

        let mut shown = 0;
        let mut dismissed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                DashEvent::NotificationShown { .. } => shown += 1,
                DashEvent::NotificationDismissed { .. } => dismissed += 1,
                _ => {}
            }
        }
        assert_eq!(shown, 2);
        assert_eq!(dismissed, 2);
    }
}
