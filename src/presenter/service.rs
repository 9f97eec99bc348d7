use crate::overlay::notification::StatusNotice;
use crate::overlay::{Overlay, OverlayError, OverlayEvent};
use crate::presenter::{IslandPresenter, PillMode};
use crate::relay::IslandUpdate;
use std::fmt;
use std::sync::mpsc;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};

pub type OverlayFactory = Box<dyn FnMut() -> Result<Box<dyn Overlay>, OverlayError>>;

#[derive(Debug)]
pub enum ServiceInput {
    Update(IslandUpdate),
    Start(Option<oneshot::Sender<StartOutcome>>),
    Stop,
    Overlay(OverlayEvent),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Shown,
    AlreadyShown,
    /// Running, but the pill could not be created.
    Headless(String),
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::Shown => write!(f, "shown"),
            StartOutcome::AlreadyShown => write!(f, "already-shown"),
            StartOutcome::Headless(reason) => write!(f, "headless: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub overlay_shown: bool,
    pub mode: PillMode,
    pub title: String,
    pub is_playing: bool,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            running: false,
            overlay_shown: false,
            mode: PillMode::Compact,
            title: String::new(),
            is_playing: false,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} overlay={} mode={:?} playing={} title={:?}",
            if self.running { "running" } else { "stopped" },
            if self.overlay_shown { "shown" } else { "none" },
            self.mode,
            self.is_playing,
            self.title
        )
    }
}

/// Owns the presenter, its overlay and the status notice. Runs on one thread.
pub struct IslandService {
    presenter: IslandPresenter,
    overlay: Option<Box<dyn Overlay>>,
    factory: OverlayFactory,
    notice: Option<StatusNotice>,
    running: bool,
    status_tx: Option<tokio_mpsc::Sender<ServiceStatus>>,
}

impl IslandService {
    pub fn new(presenter: IslandPresenter, factory: OverlayFactory, notice: Option<StatusNotice>) -> Self {
        Self {
            presenter,
            overlay: None,
            factory,
            notice,
            running: false,
            status_tx: None,
        }
    }

    pub fn set_status_sender(&mut self, status_tx: tokio_mpsc::Sender<ServiceStatus>) {
        self.status_tx = Some(status_tx);
    }

    #[cfg(test)]
    pub fn presenter(&self) -> &IslandPresenter {
        &self.presenter
    }

    pub fn status(&self) -> ServiceStatus {
        let state = self.presenter.state();
        ServiceStatus {
            running: self.running,
            overlay_shown: self.overlay.is_some(),
            mode: state.mode,
            title: state.text.clone(),
            is_playing: state.is_playing,
        }
    }

    pub fn start(&mut self) -> StartOutcome {
        if !self.running {
            tracing::info!("Starting island presenter");
            if let Some(notice) = &self.notice {
                notice.post();
            }
        }
        self.running = true;
        self.presenter.reveal();

        let outcome = match &self.overlay {
            Some(_) => StartOutcome::AlreadyShown,
            None => match (self.factory)() {
                Ok(overlay) => {
                    self.overlay = Some(overlay);
                    StartOutcome::Shown
                }
                Err(e) => {
                    tracing::warn!("Failed to create overlay: {} (pill not shown)", e);
                    StartOutcome::Headless(e.to_string())
                }
            },
        };

        if let Some(overlay) = &self.overlay {
            overlay.render(self.presenter.state());
            overlay.show();
        }
        outcome
    }

    pub fn stop(&mut self) {
        if !self.running && self.overlay.is_none() {
            return;
        }
        tracing::info!("Stopping island presenter");

        if let Some(overlay) = self.overlay.take() {
            overlay.hide();
        }
        if let Some(notice) = &self.notice {
            notice.close();
        }
        self.presenter.hide();
        self.running = false;
    }

    pub fn handle_input(&mut self, input: ServiceInput) -> bool {
        match input {
            ServiceInput::Update(update) => {
                tracing::debug!("Island update: {} ({})", update.title, update.package_name);
                self.presenter.apply_update(update);
                self.redraw();
            }
            ServiceInput::Start(reply) => {
                let outcome = self.start();
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            ServiceInput::Stop => self.stop(),
            ServiceInput::Overlay(OverlayEvent::TapPill) => {
                if self.presenter.tap_pill() {
                    self.redraw();
                }
            }
            ServiceInput::Overlay(OverlayEvent::TapControl(action)) => {
                if let Some(controls) = self.presenter.controls() {
                    controls.press(action);
                } else {
                    tracing::debug!("Ignoring {} tap outside the expanded pill", action);
                }
                self.redraw();
            }
            ServiceInput::Shutdown => return false,
        }

        self.publish_status();
        true
    }

    /// Blocks until shutdown or until every input sender is gone.
    pub fn run(mut self, inputs: mpsc::Receiver<ServiceInput>) {
        while let Ok(input) = inputs.recv() {
            if !self.handle_input(input) {
                break;
            }
        }
        self.stop();
        tracing::info!("Island presenter exited");
    }

    fn redraw(&self) {
        if let Some(overlay) = &self.overlay {
            overlay.render(self.presenter.state());
        }
    }

    fn publish_status(&self) {
        if let Some(ref status_tx) = self.status_tx {
            let _ = status_tx.try_send(self.status());
        }
    }
}
