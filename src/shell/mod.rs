pub mod autostart;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Could not find config directory")]
    NoConfigDir,
    #[error("Failed to locate the island executable: {0}")]
    ExecutableError(std::io::Error),
    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Host capabilities the presenter depends on. Probed fresh on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// A Wayland or X11 display is reachable, so the pill can be drawn.
    pub overlay_permission: bool,
    /// The session bus answers, so players can be observed.
    pub listener_enabled: bool,
    /// The daemon is launched with the session.
    pub background_exempt: bool,
}

impl Readiness {
    pub fn probe() -> Self {
        Self {
            overlay_permission: has_display(|key| std::env::var(key).ok()),
            listener_enabled: zbus::blocking::Connection::session().is_ok(),
            background_exempt: autostart::is_installed(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.overlay_permission && self.listener_enabled && self.background_exempt
    }
}

fn has_display(lookup: impl Fn(&str) -> Option<String>) -> bool {
    ["WAYLAND_DISPLAY", "DISPLAY"]
        .iter()
        .any(|key| lookup(key).map(|value| !value.is_empty()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_detected_from_either_variable() {
        assert!(has_display(|key| (key == "WAYLAND_DISPLAY").then(|| "wayland-0".to_string())));
        assert!(has_display(|key| (key == "DISPLAY").then(|| ":0".to_string())));
    }

    #[test]
    fn empty_display_variables_do_not_count() {
        assert!(!has_display(|_| Some(String::new())));
        assert!(!has_display(|_| None));
    }

    #[test]
    fn ready_only_when_everything_granted() {
        let mut readiness = Readiness {
            overlay_permission: true,
            listener_enabled: true,
            background_exempt: true,
        };
        assert!(readiness.is_ready());

        readiness.background_exempt = false;
        assert!(!readiness.is_ready());
    }
}
