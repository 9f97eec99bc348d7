pub mod gtk_window;
pub mod headless;
pub mod layer_shell;
pub mod notification;

use crate::config::{OverlayBackend, OverlayConfig};
use crate::presenter::service::ServiceInput;
use crate::presenter::{PillMode, PillUiState};
use crate::relay::ControlAction;
use std::sync::mpsc;
use thiserror::Error;

/// User interaction reported by an overlay backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    TapPill,
    TapControl(ControlAction),
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("GTK error: {0}")]
    GtkError(String),
    #[error("No display available")]
    NoDisplay,
    #[error("Overlay disabled in config")]
    Disabled,
    #[error("Failed to initialize overlay")]
    InitError,
}

pub trait Overlay: Send {
    fn render(&self, state: &PillUiState);
    fn show(&self);
    fn hide(&self);
}

pub fn create_overlay(
    config: &OverlayConfig,
    events: mpsc::Sender<ServiceInput>,
) -> Result<Box<dyn Overlay>, OverlayError> {
    if !config.enabled {
        return Err(OverlayError::Disabled);
    }

    match config.backend {
        OverlayBackend::Gtk => {
            gtk_window::GtkOverlay::new(config.clone(), events).map(|o| Box::new(o) as Box<dyn Overlay>)
        }
        OverlayBackend::Headless => Ok(Box::new(headless::HeadlessOverlay::new())),
    }
}

/// Pill geometry for a given mode, shared by drawing and hit testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PillLayout {
    pub width: f64,
    pub height: f64,
}

pub const BUTTON_RADIUS: f64 = 22.0;
const BUTTON_ROW_INSET: f64 = 36.0;

impl PillLayout {
    pub fn for_mode(config: &OverlayConfig, mode: PillMode) -> Self {
        let (width, height) = match mode {
            PillMode::Expanded => (config.expanded_width, config.expanded_height),
            _ => (config.compact_width, config.compact_height),
        };
        Self {
            width: width as f64,
            height: height as f64,
        }
    }

    /// Centres of the PREV, PLAY_PAUSE and NEXT buttons in the expanded layout.
    pub fn buttons(&self) -> [(ControlAction, f64, f64); 3] {
        let y = self.height - BUTTON_ROW_INSET;
        [
            (ControlAction::Prev, self.width * 0.25, y),
            (ControlAction::PlayPause, self.width * 0.5, y),
            (ControlAction::Next, self.width * 0.75, y),
        ]
    }

    pub fn hit_test(&self, mode: PillMode, x: f64, y: f64) -> OverlayEvent {
        if mode == PillMode::Expanded {
            for (action, cx, cy) in self.buttons() {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= BUTTON_RADIUS * BUTTON_RADIUS {
                    return OverlayEvent::TapControl(action);
                }
            }
        }
        OverlayEvent::TapPill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanded_buttons_are_hit() {
        let config = OverlayConfig::default();
        let layout = PillLayout::for_mode(&config, PillMode::Expanded);

        for (action, x, y) in layout.buttons() {
            assert_eq!(layout.hit_test(PillMode::Expanded, x, y), OverlayEvent::TapControl(action));
        }
        assert_eq!(layout.hit_test(PillMode::Expanded, 10.0, 10.0), OverlayEvent::TapPill);
    }

    #[test]
    fn compact_pill_has_no_buttons() {
        let config = OverlayConfig::default();
        let layout = PillLayout::for_mode(&config, PillMode::Compact);

        assert_eq!(layout.width, 200.0);
        assert_eq!(layout.height, 45.0);
        // Same coordinates as the expanded PLAY_PAUSE button.
        assert_eq!(layout.hit_test(PillMode::Compact, 175.0, 144.0), OverlayEvent::TapPill);
        assert_eq!(layout.hit_test(PillMode::Compact, 100.0, 9.0), OverlayEvent::TapPill);
    }

    #[test]
    fn disabled_overlay_is_an_explicit_error() {
        let config = OverlayConfig {
            enabled: false,
            ..OverlayConfig::default()
        };
        let (tx, _rx) = mpsc::channel();

        assert!(matches!(create_overlay(&config, tx), Err(OverlayError::Disabled)));
    }

    #[test]
    fn headless_backend_always_succeeds() {
        let config = OverlayConfig {
            backend: OverlayBackend::Headless,
            ..OverlayConfig::default()
        };
        let (tx, _rx) = mpsc::channel();

        assert!(create_overlay(&config, tx).is_ok());
    }
}
