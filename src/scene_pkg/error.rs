use std::path::PathBuf;

use super::light::LightKind;
use super::light_registry::LightHandle;
use super::texture::TextureSlot;

#[derive(Debug, thiserror::Error)]
pub enum LightError {
    #[error("light {0:?} does not exist (removed or never issued)")]
    NotFound(LightHandle),

    #[error("no {0:?} light equal to the given value")]
    ValueNotFound(LightKind),

    #[error("light {handle:?} is a {actual:?} light, not a {expected:?} light")]
    KindMismatch {
        handle: LightHandle,
        expected: LightKind,
        actual: LightKind,
    },

    #[error("invalid spot cutoff: inner {inner} deg, outer {outer} deg (need 0 <= inner <= outer <= 90)")]
    InvalidCutoff { inner: f32, outer: f32 },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    #[error("model transform is not invertible")]
    Degenerate,

    #[error("scale factor must be finite and positive, got {0}")]
    InvalidScale(f32),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraError {
    #[error("camera front and world-up vectors must be non-zero and not parallel")]
    DegenerateBasis,
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} has {channels} channels; only 1, 3 or 4 are supported", path.display())]
    UnsupportedChannels { path: PathBuf, channels: u8 },

    #[error("failed to upload {slot:?} texture: {message}")]
    Upload { slot: TextureSlot, message: String },
}
