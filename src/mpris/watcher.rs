use crate::config::Config;
use crate::mpris::{metadata_string, player_id, PlayerProxy, MPRIS_PREFIX};
use crate::observer::{IconRef, NotificationEvent, ObserverInput, PostedNotification, SessionToken};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;
use zbus::Connection;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("D-Bus connection error: {0}")]
    ConnectionError(#[from] zbus::Error),
    #[error("D-Bus call failed: {0}")]
    CallError(#[from] zbus::fdo::Error),
    #[error("Observer is gone")]
    ObserverGone,
}

/// What a player last advertised. A change counts as a fresh post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub title: String,
    pub artist: String,
    pub art_url: Option<String>,
    pub status: String,
}

struct TrackedPlayer<P> {
    proxy: P,
    last: Option<PlayerSnapshot>,
}

/// Players currently on the bus and what each last advertised.
struct PlayerTable<P> {
    players: HashMap<String, TrackedPlayer<P>>,
}

impl<P> PlayerTable<P> {
    fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    fn contains(&self, bus_name: &str) -> bool {
        self.players.contains_key(bus_name)
    }

    fn insert(&mut self, bus_name: String, proxy: P) {
        self.players.insert(bus_name, TrackedPlayer { proxy, last: None });
    }

    fn proxy(&self, bus_name: &str) -> Option<&P> {
        self.players.get(bus_name).map(|player| &player.proxy)
    }

    /// Forgets and returns every tracked player missing from `present`.
    fn prune(&mut self, present: &[String]) -> Vec<String> {
        let mut gone: Vec<String> = self
            .players
            .keys()
            .filter(|name| !present.contains(name))
            .cloned()
            .collect();
        gone.sort();
        for name in &gone {
            self.players.remove(name);
        }
        gone
    }

    /// Stores `snapshot`; true when it differs from what the player last advertised.
    fn record(&mut self, bus_name: &str, snapshot: &PlayerSnapshot) -> bool {
        match self.players.get_mut(bus_name) {
            Some(player) if player.last.as_ref() != Some(snapshot) => {
                player.last = Some(snapshot.clone());
                true
            }
            _ => false,
        }
    }
}

/// Where an `mpris:artUrl` points, if it is worth loading.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtLocation {
    File(PathBuf),
    Remote(String),
}

fn locate_art(url: &str, fetch_remote: bool) -> Option<ArtLocation> {
    if url.starts_with("file://") {
        return match gtk4::glib::filename_from_uri(url) {
            Ok((path, _)) => Some(ArtLocation::File(path)),
            Err(e) => {
                tracing::debug!("Unusable artwork URI {}: {}", url, e);
                None
            }
        };
    }

    if fetch_remote && (url.starts_with("http://") || url.starts_with("https://")) {
        Some(ArtLocation::Remote(url.to_string()))
    } else {
        None
    }
}

fn posted(bus_name: &str, snapshot: PlayerSnapshot, large_icon: Option<IconRef>) -> NotificationEvent {
    NotificationEvent::Posted(PostedNotification {
        package: player_id(bus_name).to_string(),
        title: snapshot.title,
        text: snapshot.artist,
        session: Some(SessionToken::new(bus_name)),
        large_icon,
    })
}

fn removed(bus_name: &str) -> NotificationEvent {
    NotificationEvent::Removed {
        package: player_id(bus_name).to_string(),
    }
}

/// Polls the session bus and reports player changes to the observer.
pub struct MprisWatcher {
    connection: Connection,
    events: mpsc::Sender<ObserverInput>,
    poll_interval: Duration,
    fetch_remote_artwork: bool,
    http: reqwest::Client,
    players: PlayerTable<PlayerProxy<'static>>,
}

impl MprisWatcher {
    pub async fn new(config: &Config, events: mpsc::Sender<ObserverInput>) -> Result<Self, WatcherError> {
        let connection = Connection::session().await?;

        Ok(Self {
            connection,
            events,
            poll_interval: Duration::from_millis(config.observer.poll_interval_ms),
            fetch_remote_artwork: config.observer.fetch_remote_artwork,
            http: reqwest::Client::new(),
            players: PlayerTable::new(),
        })
    }

    pub async fn watch(&mut self) -> Result<(), WatcherError> {
        let dbus = zbus::fdo::DBusProxy::new(&self.connection).await?;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once(&dbus).await?;
        }
    }

    async fn poll_once(&mut self, dbus: &zbus::fdo::DBusProxy<'_>) -> Result<(), WatcherError> {
        let names: Vec<String> = dbus
            .list_names()
            .await?
            .into_iter()
            .map(|name| name.as_str().to_string())
            .filter(|name| name.starts_with(MPRIS_PREFIX))
            .collect();

        for bus_name in self.players.prune(&names) {
            tracing::debug!("MPRIS player disappeared: {}", bus_name);
            self.emit(removed(&bus_name))?;
        }

        for bus_name in names {
            if !self.players.contains(&bus_name) {
                match PlayerProxy::builder(&self.connection)
                    .destination(bus_name.clone())?
                    .build()
                    .await
                {
                    Ok(proxy) => {
                        tracing::debug!("MPRIS player appeared: {}", bus_name);
                        self.players.insert(bus_name.clone(), proxy);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to create MPRIS proxy for {}: {}", bus_name, e);
                        continue;
                    }
                }
            }

            let Some(proxy) = self.players.proxy(&bus_name) else {
                continue;
            };
            let snapshot = match read_snapshot(proxy).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", bus_name, e);
                    continue;
                }
            };
            if !self.players.record(&bus_name, &snapshot) {
                continue;
            }

            let large_icon = match snapshot.art_url.as_deref() {
                Some(url) => self.resolve_icon(url).await,
                None => None,
            };
            self.emit(posted(&bus_name, snapshot, large_icon))?;
        }

        Ok(())
    }

    async fn resolve_icon(&self, url: &str) -> Option<IconRef> {
        match locate_art(url, self.fetch_remote_artwork)? {
            ArtLocation::File(path) => Some(IconRef::File(path)),
            ArtLocation::Remote(url) => match self.fetch(&url).await {
                Ok(bytes) => Some(IconRef::Bytes(bytes)),
                Err(e) => {
                    tracing::debug!("Failed to fetch artwork {}: {}", url, e);
                    None
                }
            },
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn emit(&self, event: NotificationEvent) -> Result<(), WatcherError> {
        self.events
            .send(ObserverInput::Notification(event))
            .map_err(|_| WatcherError::ObserverGone)
    }
}

async fn read_snapshot(proxy: &PlayerProxy<'_>) -> zbus::Result<PlayerSnapshot> {
    let metadata = proxy.metadata().await?;
    let status = proxy.playback_status().await?;

    Ok(PlayerSnapshot {
        title: metadata_string(&metadata, "xesam:title").unwrap_or_default(),
        artist: metadata_string(&metadata, "xesam:artist").unwrap_or_default(),
        art_url: metadata_string(&metadata, "mpris:artUrl"),
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(title: &str, status: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            title: title.to_string(),
            artist: "Artist A".to_string(),
            art_url: None,
            status: status.to_string(),
        }
    }

    const SPOTIFY: &str = "org.mpris.MediaPlayer2.spotify";
    const VLC: &str = "org.mpris.MediaPlayer2.vlc";

    #[test]
    fn only_changed_snapshots_are_posted() {
        let mut table = PlayerTable::new();
        table.insert(SPOTIFY.to_string(), ());

        assert!(table.record(SPOTIFY, &snapshot("Song A", "Playing")));
        assert!(!table.record(SPOTIFY, &snapshot("Song A", "Playing")));
        assert!(table.record(SPOTIFY, &snapshot("Song A", "Paused")));
        assert!(table.record(SPOTIFY, &snapshot("Song B", "Paused")));
    }

    #[test]
    fn untracked_player_is_never_posted() {
        let mut table: PlayerTable<()> = PlayerTable::new();
        assert!(!table.record(VLC, &snapshot("Song A", "Playing")));
    }

    #[test]
    fn prune_removes_players_gone_from_the_bus() {
        let mut table = PlayerTable::new();
        table.insert(SPOTIFY.to_string(), ());
        table.insert(VLC.to_string(), ());

        let gone = table.prune(&[VLC.to_string()]);

        assert_eq!(gone, vec![SPOTIFY.to_string()]);
        assert!(!table.contains(SPOTIFY));
        assert!(table.contains(VLC));
        assert!(table.prune(&[VLC.to_string()]).is_empty());
    }

    #[test]
    fn returning_player_posts_again() {
        let mut table = PlayerTable::new();
        table.insert(SPOTIFY.to_string(), ());
        table.record(SPOTIFY, &snapshot("Song A", "Playing"));

        table.prune(&[]);
        table.insert(SPOTIFY.to_string(), ());

        assert!(table.record(SPOTIFY, &snapshot("Song A", "Playing")));
    }

    #[test]
    fn events_carry_player_id_and_session() {
        match posted(SPOTIFY, snapshot("Song A", "Playing"), None) {
            NotificationEvent::Posted(notification) => {
                assert_eq!(notification.package, "spotify");
                assert_eq!(notification.title, "Song A");
                assert_eq!(notification.text, "Artist A");
                assert_eq!(notification.session.unwrap().as_str(), SPOTIFY);
            }
            other => panic!("unexpected event {:?}", other),
        }

        match removed(VLC) {
            NotificationEvent::Removed { package } => assert_eq!(package, "vlc"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn file_art_is_a_local_path() {
        assert_eq!(
            locate_art("file:///tmp/cover.png", false),
            Some(ArtLocation::File(PathBuf::from("/tmp/cover.png")))
        );
    }

    #[test]
    fn remote_art_only_when_fetching_is_enabled() {
        let url = "https://i.scdn.co/image/ab67616d";
        assert_eq!(locate_art(url, true), Some(ArtLocation::Remote(url.to_string())));
        assert_eq!(locate_art(url, false), None);
        assert_eq!(
            locate_art("http://localhost/cover.jpg", true),
            Some(ArtLocation::Remote("http://localhost/cover.jpg".to_string()))
        );
    }

    #[test]
    fn other_schemes_have_no_art() {
        assert_eq!(locate_art("data:image/png;base64,AAAA", true), None);
        assert_eq!(locate_art("", true), None);
    }
}
