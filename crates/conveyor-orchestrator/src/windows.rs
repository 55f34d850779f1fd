//! Registry of live top-level windows and the daemon flag.

use std::fmt;

use tokio::sync::watch;

/// Identity of a registered window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// What kind of window was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// A regular browser window.
    Browser,
    /// The shared progress surface.
    Progress,
    /// A transient dialog.
    Dialog,
}

/// Advice returned when a window goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Continue,
    /// The last window closed and daemon mode is off.
    Terminate,
}

#[derive(Debug)]
pub struct WindowRegistry {
    next_id: u64,
    windows: Vec<(WindowId, WindowKind)>,
    daemon: watch::Sender<bool>,
}

impl WindowRegistry {
    pub fn new(daemon: bool) -> Self {
        let (daemon, _) = watch::channel(daemon);
        Self {
            next_id: 1,
            windows: Vec::new(),
            daemon,
        }
    }

    pub fn register(&mut self, kind: WindowKind) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.windows.push((id, kind));
        tracing::debug!(target: "conveyor::windows", %id, ?kind, "window registered");
        id
    }

    /// Forget a window. Unknown ids are ignored.
    pub fn unregister(&mut self, id: WindowId) -> Lifecycle {
        let before = self.windows.len();
        self.windows.retain(|(window, _)| *window != id);

        if before != self.windows.len() && self.windows.is_empty() && !self.daemon() {
            tracing::debug!(target: "conveyor::windows", %id, "last window closed");
            Lifecycle::Terminate
        } else {
            Lifecycle::Continue
        }
    }

    pub fn has_windows(&self) -> bool {
        !self.windows.is_empty()
    }

    /// Regular browser windows, in registration order.
    pub fn windows(&self) -> Vec<WindowId> {
        self.windows
            .iter()
            .filter(|(_, kind)| *kind == WindowKind::Browser)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn daemon(&self) -> bool {
        *self.daemon.borrow()
    }

    pub fn set_daemon(&mut self, daemon: bool) {
        self.daemon.send_if_modified(|current| {
            let changed = *current != daemon;
            *current = daemon;
            changed
        });
    }

    /// Observe changes of the daemon flag.
    pub fn subscribe_daemon(&self) -> watch::Receiver<bool> {
        self.daemon.subscribe()
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}
