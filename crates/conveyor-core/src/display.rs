use serde::{Deserialize, Serialize};

/// Where user-visible effects of a request should appear.
///
/// Carries the X11/Wayland display name the request came from so spawned
/// processes and opened files end up on the same screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayContext {
    /// Display name, e.g. `:0` or `wayland-1`.
    pub display: Option<String>,
}

impl DisplayContext {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
        }
    }

    /// Take the display from the current environment.
    pub fn from_env() -> Self {
        let display = std::env::var("WAYLAND_DISPLAY")
            .ok()
            .or_else(|| std::env::var("DISPLAY").ok())
            .filter(|d| !d.is_empty());
        Self { display }
    }

    /// Environment variables to set on a child process.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        match &self.display {
            Some(d) if d.starts_with("wayland") => vec![("WAYLAND_DISPLAY", d.clone())],
            Some(d) => vec![("DISPLAY", d.clone())],
            None => Vec::new(),
        }
    }
}
