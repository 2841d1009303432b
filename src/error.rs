use crate::config::settings::ConfigError;
use crate::object_3d_loader::mesh_converters::ModelLoadError;
use crate::scene_pkg::error::{CameraError, LightError, TextureError, TransformError};
use crate::system::error::{ShaderError, UniformError};

/// Every failure the viewer can surface, one variant per subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Light(#[from] LightError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Model(#[from] ModelLoadError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Uniform(#[from] UniformError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
