//! MPRIS players on the session bus, presented as media notifications.
//!
//! Players live at `org.mpris.MediaPlayer2.<id>` on `/org/mpris/MediaPlayer2`.
//! The bus name doubles as the session token and `<id>` as the package name.

pub mod watcher;

use crate::observer::{MediaError, MediaHandle, MediaSessions, PlaybackState, SessionToken};
use std::collections::HashMap;
use zbus::dbus_proxy;
use zbus::zvariant::{OwnedValue, Value};

pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

#[dbus_proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait Player {
    fn play(&self) -> zbus::Result<()>;

    fn pause(&self) -> zbus::Result<()>;

    fn next(&self) -> zbus::Result<()>;

    fn previous(&self) -> zbus::Result<()>;

    #[dbus_proxy(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    #[dbus_proxy(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;
}

/// "org.mpris.MediaPlayer2.spotify" -> "spotify"
pub fn player_id(bus_name: &str) -> &str {
    bus_name.strip_prefix(MPRIS_PREFIX).unwrap_or(bus_name)
}

pub fn parse_playback_status(status: &str) -> Result<PlaybackState, MediaError> {
    match status {
        "Playing" => Ok(PlaybackState::Playing),
        "Paused" => Ok(PlaybackState::Paused),
        "Stopped" => Ok(PlaybackState::Stopped),
        other => Err(MediaError::UnknownStatus(other.to_string())),
    }
}

/// String-valued metadata entry; list values (e.g. `xesam:artist`) are joined.
pub fn metadata_string(metadata: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    let value: &Value<'_> = metadata.get(key)?;
    let text = match value {
        Value::Str(s) => s.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Str(s) => Some(s.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub struct MprisHandle {
    package: String,
    proxy: PlayerProxyBlocking<'static>,
}

impl MediaHandle for MprisHandle {
    fn package(&self) -> &str {
        &self.package
    }

    fn playback_state(&self) -> Result<PlaybackState, MediaError> {
        let status = self.proxy.playback_status()?;
        parse_playback_status(&status)
    }

    fn play(&self) -> Result<(), MediaError> {
        Ok(self.proxy.play()?)
    }

    fn pause(&self) -> Result<(), MediaError> {
        Ok(self.proxy.pause()?)
    }

    fn next(&self) -> Result<(), MediaError> {
        Ok(self.proxy.next()?)
    }

    fn previous(&self) -> Result<(), MediaError> {
        Ok(self.proxy.previous()?)
    }
}

/// Connects blocking player proxies for the observer thread.
pub struct MprisSessions {
    connection: zbus::blocking::Connection,
}

impl MprisSessions {
    pub fn new() -> Result<Self, MediaError> {
        Ok(Self {
            connection: zbus::blocking::Connection::session()?,
        })
    }
}

impl MediaSessions for MprisSessions {
    type Handle = MprisHandle;

    fn connect(&self, token: &SessionToken) -> Result<MprisHandle, MediaError> {
        let proxy = PlayerProxyBlocking::builder(&self.connection)
            .destination(token.as_str().to_owned())?
            .build()?;

        Ok(MprisHandle {
            package: player_id(token.as_str()).to_string(),
            proxy,
        })
    }
}
