use crate::overlay::Overlay;
use crate::presenter::PillUiState;

/// Backend for sessions without a display; the pill only exists in the logs.
pub struct HeadlessOverlay;

impl HeadlessOverlay {
    pub fn new() -> Self {
        Self
    }
}

impl Overlay for HeadlessOverlay {
    fn render(&self, state: &PillUiState) {
        tracing::debug!(
            "Pill [{:?}] {} / {} (playing: {}, artwork: {})",
            state.mode,
            state.text,
            state.sub_text,
            state.is_playing,
            state.artwork.is_some()
        );
    }

    fn show(&self) {
        tracing::debug!("Pill shown");
    }

    fn hide(&self) {
        tracing::debug!("Pill hidden");
    }
}
