use crate::relay::Payload;
use std::fmt;
use std::str::FromStr;

pub const UPDATE_ISLAND_NOTIFICATION: &str = "UPDATE_ISLAND_NOTIFICATION";
pub const CONTROL_MUSIC_ACTION: &str = "CONTROL_MUSIC_ACTION";

/// Straight (non-premultiplied) RGBA8 raster.
#[derive(Clone, PartialEq, Eq)]
pub struct Artwork {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Artwork {
    pub fn from_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            rgba: image.into_raw(),
        }
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Artwork({}x{})", self.width, self.height)
    }
}

/// Now-playing snapshot sent from the observer to the presenter.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandUpdate {
    pub title: String,
    pub text: String,
    pub is_playing: bool,
    pub artwork: Option<Artwork>,
    /// Informational only.
    pub package_name: String,
}

impl IslandUpdate {
    pub fn without_artwork(self) -> Self {
        Self {
            artwork: None,
            ..self
        }
    }
}

impl Payload for IslandUpdate {
    const CHANNEL: &'static str = UPDATE_ISLAND_NOTIFICATION;

    fn payload_size(&self) -> usize {
        let artwork = self
            .artwork
            .as_ref()
            .map(|art| art.rgba.len() + 2 * std::mem::size_of::<u32>())
            .unwrap_or(0);
        self.title.len() + self.text.len() + self.package_name.len() + 1 + artwork
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ControlAction {
    Prev,
    PlayPause,
    Next,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Prev => "PREV",
            ControlAction::PlayPause => "PLAY_PAUSE",
            ControlAction::Next => "NEXT",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown control action: {}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for ControlAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PREV" => Ok(ControlAction::Prev),
            "PLAY_PAUSE" => Ok(ControlAction::PlayPause),
            "NEXT" => Ok(ControlAction::Next),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Transport command sent from the presenter back to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCommand {
    pub action: ControlAction,
}

impl ControlCommand {
    pub fn new(action: ControlAction) -> Self {
        Self { action }
    }
}

impl Payload for ControlCommand {
    const CHANNEL: &'static str = CONTROL_MUSIC_ACTION;

    fn payload_size(&self) -> usize {
        self.action.as_str().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_wire_strings() {
        for action in [ControlAction::Prev, ControlAction::PlayPause, ControlAction::Next] {
            assert_eq!(action.as_str().parse::<ControlAction>().unwrap(), action);
        }
        assert_eq!(ControlAction::PlayPause.to_string(), "PLAY_PAUSE");
        assert!("STOP".parse::<ControlAction>().is_err());
    }

    #[test]
    fn artwork_dominates_update_size() {
        let update = IslandUpdate {
            title: "Song A".to_string(),
            text: "Artist A".to_string(),
            is_playing: true,
            artwork: Some(Artwork::from_image(image::RgbaImage::new(150, 150))),
            package_name: "spotify".to_string(),
        };

        assert!(update.payload_size() > 150 * 150 * 4);
        assert!(update.clone().without_artwork().payload_size() < 64);
    }
}
