pub mod artwork;

use crate::relay::{ControlAction, ControlCommand, Delivery, IslandUpdate, RelaySender};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("D-Bus error: {0}")]
    BusError(#[from] zbus::Error),
    #[error("Unknown playback status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Opaque reference to another application's media session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote transport controls for one media session.
pub trait MediaHandle: Send {
    fn package(&self) -> &str;
    fn playback_state(&self) -> Result<PlaybackState, MediaError>;
    fn play(&self) -> Result<(), MediaError>;
    fn pause(&self) -> Result<(), MediaError>;
    fn next(&self) -> Result<(), MediaError>;
    fn previous(&self) -> Result<(), MediaError>;
}

/// Turns a session token into a live handle.
pub trait MediaSessions {
    type Handle: MediaHandle;

    fn connect(&self, token: &SessionToken) -> Result<Self::Handle, MediaError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconRef {
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedNotification {
    pub package: String,
    pub title: String,
    pub text: String,
    pub session: Option<SessionToken>,
    pub large_icon: Option<IconRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Posted(PostedNotification),
    Removed { package: String },
}

#[derive(Debug)]
pub enum ObserverInput {
    Notification(NotificationEvent),
    Command(ControlCommand),
}

/// Owns the captured media handle. Every method runs on the observer thread.
pub struct NotificationObserver<S: MediaSessions> {
    sessions: S,
    handle: Option<S::Handle>,
    updates: RelaySender<IslandUpdate>,
    app_id: String,
    artwork_size: u32,
}

impl<S: MediaSessions> NotificationObserver<S> {
    pub fn new(sessions: S, updates: RelaySender<IslandUpdate>, app_id: String, artwork_size: u32) -> Self {
        Self {
            sessions,
            handle: None,
            updates,
            app_id,
            artwork_size,
        }
    }

    #[cfg(test)]
    pub fn handle(&self) -> Option<&S::Handle> {
        self.handle.as_ref()
    }

    pub fn on_posted(&mut self, notification: PostedNotification) {
        if notification.package == self.app_id {
            return;
        }

        if let Some(token) = &notification.session {
            match self.sessions.connect(token) {
                Ok(handle) => {
                    tracing::debug!("Captured media session {} ({})", token, handle.package());
                    self.handle = Some(handle);
                }
                Err(e) => tracing::warn!("Failed to attach to media session {}: {}", token, e),
            }
        }

        if notification.title.is_empty() {
            return;
        }

        let is_playing = self.is_playing();
        let artwork = artwork::load_artwork(notification.large_icon.as_ref(), self.artwork_size);

        let update = IslandUpdate {
            title: notification.title,
            text: notification.text,
            is_playing,
            artwork,
            package_name: notification.package,
        };
        self.forward(update);
    }

    pub fn on_removed(&mut self, package: &str) {
        let matches = self.handle.as_ref().map(|h| h.package() == package).unwrap_or(false);
        if matches {
            tracing::debug!("Media session for {} expired", package);
            self.handle = None;
        }
    }

    pub fn on_command(&mut self, command: ControlCommand) {
        tracing::debug!("Control command received: {}", command.action);

        let Some(handle) = self.handle.as_ref() else {
            tracing::debug!("No active media session, ignoring {}", command.action);
            return;
        };

        let result = match command.action {
            ControlAction::PlayPause => match handle.playback_state() {
                Ok(PlaybackState::Playing) => handle.pause(),
                Ok(_) => handle.play(),
                Err(e) => {
                    tracing::debug!("Playback state of {} unreadable ({}), sending play", handle.package(), e);
                    handle.play()
                }
            },
            ControlAction::Next => handle.next(),
            ControlAction::Prev => handle.previous(),
        };

        if let Err(e) = result {
            tracing::warn!("{} failed for {}: {}", command.action, handle.package(), e);
        }
    }

    pub fn handle_input(&mut self, input: ObserverInput) {
        match input {
            ObserverInput::Notification(NotificationEvent::Posted(notification)) => self.on_posted(notification),
            ObserverInput::Notification(NotificationEvent::Removed { package }) => self.on_removed(&package),
            ObserverInput::Command(command) => self.on_command(command),
        }
    }

    /// Blocks until every sender of `inputs` is gone.
    pub fn run(mut self, inputs: mpsc::Receiver<ObserverInput>) {
        tracing::info!("Notification observer started");
        while let Ok(input) = inputs.recv() {
            self.handle_input(input);
        }
        tracing::info!("Notification observer stopped");
    }

    fn is_playing(&self) -> bool {
        match self.handle.as_ref().map(|h| h.playback_state()) {
            Some(Ok(state)) => state == PlaybackState::Playing,
            Some(Err(e)) => {
                tracing::debug!("Could not read playback state: {}", e);
                false
            }
            None => false,
        }
    }

    fn forward(&self, update: IslandUpdate) {
        let delivery = match self.updates.send(update) {
            Ok(delivery) => delivery,
            Err(rejected) => {
                tracing::warn!("{}; resending without artwork", rejected.error);
                match self.updates.send(rejected.message.without_artwork()) {
                    Ok(delivery) => delivery,
                    Err(rejected) => {
                        tracing::warn!("Update dropped: {}", rejected.error);
                        return;
                    }
                }
            }
        };

        if delivery == Delivery::Dropped {
            tracing::debug!("Presenter is not listening, update dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Remote {
        state: Arc<Mutex<Option<PlaybackState>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    struct FakeHandle {
        package: String,
        remote: Remote,
    }

    impl FakeHandle {
        fn record(&self, call: &str) -> Result<(), MediaError> {
            self.remote.calls.lock().unwrap().push(format!("{}:{}", self.package, call));
            Ok(())
        }
    }

    impl MediaHandle for FakeHandle {
        fn package(&self) -> &str {
            &self.package
        }

        fn playback_state(&self) -> Result<PlaybackState, MediaError> {
            self.remote
                .state
                .lock()
                .unwrap()
                .ok_or_else(|| MediaError::UnknownStatus("gone".to_string()))
        }

        fn play(&self) -> Result<(), MediaError> {
            self.record("play")
        }

        fn pause(&self) -> Result<(), MediaError> {
            self.record("pause")
        }

        fn next(&self) -> Result<(), MediaError> {
            self.record("next")
        }

        fn previous(&self) -> Result<(), MediaError> {
            self.record("previous")
        }
    }

    struct FakeSessions {
        remote: Remote,
    }

    impl MediaSessions for FakeSessions {
        type Handle = FakeHandle;

        fn connect(&self, token: &SessionToken) -> Result<FakeHandle, MediaError> {
            let package = token
                .as_str()
                .strip_prefix("org.mpris.MediaPlayer2.")
                .unwrap_or(token.as_str())
                .to_string();
            Ok(FakeHandle {
                package,
                remote: self.remote.clone(),
            })
        }
    }

    fn observer(limit: usize) -> (NotificationObserver<FakeSessions>, mpsc::Receiver<IslandUpdate>, Remote) {
        let remote = Remote::default();
        let (updates, rx) = relay::channel(limit);
        let sessions = FakeSessions { remote: remote.clone() };
        (NotificationObserver::new(sessions, updates, "island".to_string(), 150), rx, remote)
    }

    fn posted(package: &str, title: &str, text: &str) -> PostedNotification {
        PostedNotification {
            package: package.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            session: Some(SessionToken::new(format!("org.mpris.MediaPlayer2.{}", package))),
            large_icon: None,
        }
    }

    fn png_icon(size: u32) -> IconRef {
        let image = image::RgbaImage::from_pixel(size, size, image::Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        IconRef::Bytes(bytes)
    }

    #[test]
    fn forwards_title_text_and_remote_playing_state() {
        let (mut observer, rx, remote) = observer(1_000_000);
        *remote.state.lock().unwrap() = Some(PlaybackState::Playing);

        observer.on_posted(posted("spotify", "Song A", "Artist A"));

        let update = rx.try_recv().unwrap();
        assert_eq!(update.title, "Song A");
        assert_eq!(update.text, "Artist A");
        assert!(update.is_playing);
        assert_eq!(update.package_name, "spotify");
        assert!(update.artwork.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ignores_own_and_untitled_notifications() {
        let (mut observer, rx, _remote) = observer(1_000_000);

        observer.on_posted(posted("island", "Island active", ""));
        observer.on_posted(posted("spotify", "", "Artist"));

        assert!(rx.try_recv().is_err());
        assert_eq!(observer.handle().map(|h| h.package()), Some("spotify"));
    }

    #[test]
    fn forwards_without_handle_using_defaults() {
        let (mut observer, rx, _remote) = observer(1_000_000);
        let mut notification = posted("browser", "Video", "");
        notification.session = None;

        observer.on_posted(notification);

        let update = rx.try_recv().unwrap();
        assert!(!update.is_playing);
        assert!(observer.handle().is_none());
    }

    #[test]
    fn last_notification_wins_the_handle() {
        let (mut observer, _rx, _remote) = observer(1_000_000);

        observer.on_posted(posted("spotify", "Song A", ""));
        observer.on_posted(posted("vlc", "Movie", ""));

        assert_eq!(observer.handle().map(|h| h.package()), Some("vlc"));
    }

    #[test]
    fn removal_clears_only_matching_handle() {
        let (mut observer, rx, _remote) = observer(1_000_000);
        observer.on_posted(posted("spotify", "Song A", ""));
        rx.try_recv().unwrap();

        observer.on_removed("vlc");
        assert!(observer.handle().is_some());

        observer.on_removed("spotify");
        assert!(observer.handle().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn play_pause_follows_remote_state() {
        let (mut observer, _rx, remote) = observer(1_000_000);
        observer.on_posted(posted("spotify", "Song A", ""));

        *remote.state.lock().unwrap() = Some(PlaybackState::Playing);
        observer.on_command(ControlCommand::new(ControlAction::PlayPause));
        *remote.state.lock().unwrap() = Some(PlaybackState::Paused);
        observer.on_command(ControlCommand::new(ControlAction::PlayPause));
        observer.on_command(ControlCommand::new(ControlAction::Next));
        observer.on_command(ControlCommand::new(ControlAction::Prev));

        assert_eq!(
            *remote.calls.lock().unwrap(),
            vec!["spotify:pause", "spotify:play", "spotify:next", "spotify:previous"]
        );
    }

    #[test]
    fn play_pause_plays_when_state_is_unreadable() {
        let (mut observer, _rx, remote) = observer(1_000_000);
        observer.on_posted(posted("spotify", "Song A", ""));
        *remote.state.lock().unwrap() = None;

        observer.on_command(ControlCommand::new(ControlAction::PlayPause));

        assert_eq!(*remote.calls.lock().unwrap(), vec!["spotify:play"]);
    }

    #[test]
    fn command_after_removal_is_a_silent_no_op() {
        let (mut observer, _rx, remote) = observer(1_000_000);
        observer.on_posted(posted("spotify", "Song A", ""));
        observer.on_removed("spotify");

        observer.on_command(ControlCommand::new(ControlAction::PlayPause));

        assert!(remote.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn artwork_is_scaled_before_relay() {
        let (mut observer, rx, _remote) = observer(1_000_000);
        let mut notification = posted("spotify", "Song A", "");
        notification.large_icon = Some(png_icon(512));

        observer.on_posted(notification);

        let artwork = rx.try_recv().unwrap().artwork.unwrap();
        assert_eq!((artwork.width, artwork.height), (150, 150));
    }

    #[test]
    fn oversized_update_is_resent_without_artwork() {
        let (mut observer, rx, _remote) = observer(1024);
        let mut notification = posted("spotify", "Song A", "Artist A");
        notification.large_icon = Some(png_icon(512));

        observer.on_posted(notification);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.title, "Song A");
        assert!(update.artwork.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broken_icon_is_dropped_but_update_sent() {
        let (mut observer, rx, _remote) = observer(1_000_000);
        let mut notification = posted("spotify", "Song A", "");
        notification.large_icon = Some(IconRef::Bytes(vec![0, 1, 2, 3]));

        observer.on_posted(notification);

        let update = rx.try_recv().unwrap();
        assert!(update.artwork.is_none());
    }

    #[test]
    fn run_drains_mixed_inputs_until_senders_close() {
        let (observer, updates, remote) = observer(1_000_000);
        let (tx, rx) = mpsc::channel();
        *remote.state.lock().unwrap() = Some(PlaybackState::Paused);

        tx.send(ObserverInput::Notification(NotificationEvent::Posted(posted("spotify", "Song A", ""))))
            .unwrap();
        tx.send(ObserverInput::Command(ControlCommand::new(ControlAction::PlayPause)))
            .unwrap();
        tx.send(ObserverInput::Notification(NotificationEvent::Removed {
            package: "spotify".to_string(),
        }))
        .unwrap();
        tx.send(ObserverInput::Command(ControlCommand::new(ControlAction::Next)))
            .unwrap();
        drop(tx);

        observer.run(rx);

        assert_eq!(updates.try_recv().unwrap().title, "Song A");
        assert_eq!(*remote.calls.lock().unwrap(), vec!["spotify:play"]);
    }
}
