use crate::observer::IconRef;
use crate::relay::Artwork;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Failed to read icon file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode icon: {0}")]
    DecodeError(#[from] image::ImageError),
    #[error("Icon has no pixels")]
    Empty,
}

/// Decode an icon reference into a raster image.
pub fn convert_icon(icon: &IconRef) -> Result<DynamicImage, ArtworkError> {
    let image = match icon {
        IconRef::File(path) => {
            let bytes = std::fs::read(path).map_err(|source| ArtworkError::ReadError {
                path: path.clone(),
                source,
            })?;
            image::load_from_memory(&bytes)?
        }
        IconRef::Bytes(bytes) => image::load_from_memory(bytes)?,
    };

    if image.width() == 0 || image.height() == 0 {
        return Err(ArtworkError::Empty);
    }
    Ok(image)
}

/// Scale to exactly `size`×`size`, ignoring aspect ratio.
pub fn scale_for_relay(image: &DynamicImage, size: u32) -> Artwork {
    let scaled = image.resize_exact(size, size, FilterType::Triangle);
    Artwork::from_image(scaled.to_rgba8())
}

/// Any conversion failure yields `None`; the update is still forwarded
/// without artwork.
pub fn load_artwork(icon: Option<&IconRef>, size: u32) -> Option<Artwork> {
    let icon = icon?;
    match convert_icon(icon) {
        Ok(image) => Some(scale_for_relay(&image, size)),
        Err(e) => {
            tracing::warn!("Dropping artwork: {}", e);
            None
        }
    }
}
