pub mod service;

use crate::relay::{Artwork, ControlAction, ControlCommand, Delivery, IslandUpdate, RelaySender};

pub const WAITING_TEXT: &str = "Waiting for music...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PillMode {
    #[default]
    Compact,
    Expanded,
    Hidden,
    Notification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PillUiState {
    pub mode: PillMode,
    pub text: String,
    pub sub_text: String,
    pub is_playing: bool,
    pub artwork: Option<Artwork>,
}

impl PillUiState {
    pub fn waiting(mode: PillMode) -> Self {
        Self {
            mode,
            text: WAITING_TEXT.to_string(),
            sub_text: String::new(),
            is_playing: false,
            artwork: None,
        }
    }
}

impl Default for PillUiState {
    fn default() -> Self {
        Self::waiting(PillMode::Compact)
    }
}

/// Holds the single pill state and turns taps into control commands.
pub struct IslandPresenter {
    state: PillUiState,
    commands: RelaySender<ControlCommand>,
    mode_before_hide: PillMode,
}

impl IslandPresenter {
    pub fn new(commands: RelaySender<ControlCommand>, initial_mode: PillMode) -> Self {
        Self {
            state: PillUiState::waiting(initial_mode),
            commands,
            mode_before_hide: PillMode::Compact,
        }
    }

    pub fn state(&self) -> &PillUiState {
        &self.state
    }

    /// Fields are replaced verbatim; the mode is left alone.
    pub fn apply_update(&mut self, update: IslandUpdate) {
        self.state.text = update.title;
        self.state.sub_text = update.text;
        self.state.is_playing = update.is_playing;
        self.state.artwork = update.artwork;
    }

    /// Returns whether the mode changed.
    pub fn tap_pill(&mut self) -> bool {
        let next = match self.state.mode {
            PillMode::Compact | PillMode::Notification => PillMode::Expanded,
            PillMode::Expanded => PillMode::Compact,
            PillMode::Hidden => return false,
        };
        self.state.mode = next;
        true
    }

    /// Transport buttons only exist in the expanded layout.
    pub fn controls(&mut self) -> Option<TransportControls<'_>> {
        if self.state.mode == PillMode::Expanded {
            Some(TransportControls { presenter: self })
        } else {
            None
        }
    }

    pub fn hide(&mut self) {
        if self.state.mode != PillMode::Hidden {
            self.mode_before_hide = self.state.mode;
            self.state.mode = PillMode::Hidden;
        }
    }

    pub fn reveal(&mut self) {
        if self.state.mode == PillMode::Hidden {
            self.state.mode = self.mode_before_hide;
        }
    }

    fn emit(&self, action: ControlAction) {
        match self.commands.send(ControlCommand::new(action)) {
            Ok(Delivery::Sent) => {}
            Ok(Delivery::Dropped) => tracing::debug!("Observer is not listening, {} dropped", action),
            Err(rejected) => tracing::warn!("{} not sent: {}", action, rejected.error),
        }
    }
}

pub struct TransportControls<'a> {
    presenter: &'a mut IslandPresenter,
}

impl TransportControls<'_> {
    pub fn press(self, action: ControlAction) {
        let presenter = self.presenter;
        if action == ControlAction::PlayPause {
            presenter.state.is_playing = !presenter.state.is_playing;
        }
        presenter.emit(action);
    }
}
