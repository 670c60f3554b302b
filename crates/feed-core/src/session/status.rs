//! Connection lifecycle state and the coarse status renderers see.

use parking_lot::RwLock;
use serde::Serialize;

/// Internal lifecycle: `Disabled -> Connecting -> Connected -> Disconnected -> Connecting ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Disabled,
    Connecting,
    Connected,
    Disconnected,
}

/// Status exposed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Error,
}

#[derive(Debug)]
struct StatusInner {
    state: LifecycleState,
    last_error: Option<String>,
}

/// Shared, lock-protected lifecycle state of one session.
#[derive(Debug)]
pub struct StatusCell {
    inner: RwLock<StatusInner>,
}

impl Default for StatusCell {
    fn default() -> Self {
        let inner = StatusInner { state: LifecycleState::Disabled, last_error: None };
        Self { inner: RwLock::new(inner) }
    }
}

impl StatusCell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.inner.read().state
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }

    /// Renderer view: connected, or an error if the last attempt failed.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let inner = self.inner.read();
        match inner.state {
            LifecycleState::Connected => ConnectionStatus::Connected,
            LifecycleState::Disabled => ConnectionStatus::Disconnected,
            LifecycleState::Connecting | LifecycleState::Disconnected => {
                if inner.last_error.is_some() {
                    ConnectionStatus::Error
                } else {
                    ConnectionStatus::Disconnected
                }
            }
        }
    }

    /// Starts (or retries) a connection. A live connection is not downgraded.
    pub fn mark_connecting(&self) {
        let mut inner = self.inner.write();
        if matches!(inner.state, LifecycleState::Disabled | LifecycleState::Disconnected) {
            inner.state = LifecycleState::Connecting;
        }
    }

    pub fn mark_connected(&self) {
        let mut inner = self.inner.write();
        if inner.state == LifecycleState::Disabled {
            return;
        }
        inner.state = LifecycleState::Connected;
        inner.last_error = None;
    }

    pub fn mark_failed(&self, error: impl Into<String>) {
        let mut inner = self.inner.write();
        if inner.state == LifecycleState::Disabled {
            return;
        }
        inner.state = LifecycleState::Disconnected;
        inner.last_error = Some(error.into());
    }

    /// Clean close from the remote end.
    pub fn mark_closed(&self) {
        let mut inner = self.inner.write();
        if inner.state != LifecycleState::Disabled {
            inner.state = LifecycleState::Disconnected;
        }
    }

    pub fn mark_disabled(&self) {
        let mut inner = self.inner.write();
        inner.state = LifecycleState::Disabled;
        inner.last_error = None;
    }
}
