use std::path::PathBuf;

use cgmath::{Deg, InnerSpace, Matrix4, Vector3};
use log::{debug, error, info};

use super::camera::Camera;
use super::light::{Light, LightKind};
use super::light_registry::{LightHandle, LightRegistry};
use super::mesh::Model;
use super::texture::{TextureBackend, TextureSlot, TextureSlots};
use super::transform::ModelTransform;
use crate::error::ViewerError;
use crate::object_3d_loader::mesh_converters::load_model;

/// Perspective projection with a fixed fov/near/far. The matrix is only
/// rebuilt when the viewport aspect ratio changes.
#[derive(Clone, Debug)]
pub struct Projection {
    fov: Deg<f32>,
    near: f32,
    far: f32,
    aspect: f32,
    matrix: Matrix4<f32>,
}

impl Projection {
    pub fn new(fov: Deg<f32>, near: f32, far: f32, viewport_dimensions: [u32; 2]) -> Projection {
        let aspect = aspect_ratio(viewport_dimensions).unwrap_or(1.0);
        Projection {
            fov,
            near,
            far,
            aspect,
            matrix: cgmath::perspective(fov, aspect, near, far),
        }
    }

    /// Returns whether the matrix was rebuilt. A zero-sized viewport
    /// (minimized window) keeps the previous aspect.
    pub fn resize(&mut self, viewport_dimensions: [u32; 2]) -> bool {
        match aspect_ratio(viewport_dimensions) {
            Some(aspect) if aspect != self.aspect => {
                self.aspect = aspect;
                self.matrix = cgmath::perspective(self.fov, aspect, self.near, self.far);
                true
            }
            _ => false,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }
}

fn aspect_ratio(viewport_dimensions: [u32; 2]) -> Option<f32> {
    if viewport_dimensions[0] == 0 || viewport_dimensions[1] == 0 {
        return None;
    }
    Some(viewport_dimensions[0] as f32 / viewport_dimensions[1] as f32)
}

/// Discrete edits coming from the input layer.
#[derive(Clone, Debug)]
pub enum SceneCommand {
    AddLight(Light),
    DeleteSelectedLight,
    SelectNextLight,
    ClearLights,
    ReplaceTexture(TextureSlot, PathBuf),
    ReplaceModel(PathBuf),
    ResetTransform,
}

/// All mutable viewer state. Owned by the frame loop and read once per
/// frame by the uniform synchronization.
pub struct Scene<B: TextureBackend> {
    pub transform: ModelTransform,
    pub camera: Camera,
    pub textures: TextureSlots<B>,
    pub lights: LightRegistry,
    pub model: Model,
    pub projection: Projection,
    selected_light: Option<LightHandle>,
    diagnostic: Option<String>,
}

impl<B: TextureBackend> Scene<B> {
    pub fn new(camera: Camera, projection: Projection, backend: B) -> Scene<B> {
        Scene {
            transform: ModelTransform::new(),
            camera,
            textures: TextureSlots::new(backend),
            lights: LightRegistry::new(),
            model: Model::default(),
            projection,
            selected_light: None,
            diagnostic: None,
        }
    }

    pub fn selected_light(&self) -> Option<LightHandle> {
        self.selected_light
    }

    /// Message of the last failed command, cleared by the next success.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Applies one command. A failure leaves the scene as it was and is
    /// kept as the current diagnostic.
    pub fn apply(&mut self, command: SceneCommand) -> Result<(), ViewerError> {
        debug!("scene command {:?}", command);
        let result = self.execute(command);
        match &result {
            Ok(()) => self.diagnostic = None,
            Err(e) => {
                error!("{}", e);
                self.diagnostic = Some(e.to_string());
            }
        }
        result
    }

    fn execute(&mut self, command: SceneCommand) -> Result<(), ViewerError> {
        match command {
            SceneCommand::AddLight(light) => {
                self.selected_light = Some(self.lights.add(light));
            }
            SceneCommand::DeleteSelectedLight => {
                if let Some(handle) = self.selected_light {
                    let order = self.lights.handles();
                    let position = order.iter().position(|h| *h == handle);
                    self.lights.remove(handle)?;
                    let remaining = self.lights.handles();
                    self.selected_light = match position {
                        _ if self.lights.is_empty() => None,
                        Some(index) => Some(remaining[index.min(remaining.len() - 1)]),
                        None => Some(remaining[0]),
                    };
                }
            }
            SceneCommand::SelectNextLight => {
                let order = self.lights.handles();
                self.selected_light = match self.selected_light {
                    _ if order.is_empty() => None,
                    Some(handle) => match order.iter().position(|h| *h == handle) {
                        Some(index) => Some(order[(index + 1) % order.len()]),
                        None => Some(order[0]),
                    },
                    None => Some(order[0]),
                };
                debug!("selected light {:?}", self.selected_light);
            }
            SceneCommand::ClearLights => {
                info!("removed all {} lights", self.lights.len());
                self.lights.clear();
                self.selected_light = None;
            }
            SceneCommand::ReplaceTexture(slot, path) => {
                self.textures.load(slot, &path)?;
            }
            SceneCommand::ReplaceModel(path) => {
                let model = load_model(&path)?;
                self.model.replace(model);
            }
            SceneCommand::ResetTransform => {
                self.transform.reset();
                info!("model transform reset");
            }
        }
        Ok(())
    }

    /// Moves the selected point or spot light; a directional light has its
    /// direction tilted by the same offset instead.
    pub fn nudge_selected_light(&mut self, offset: Vector3<f32>) -> Result<(), ViewerError> {
        let handle = match self.selected_light {
            Some(handle) => handle,
            None => return Ok(()),
        };
        match handle.kind() {
            LightKind::Point => self.lights.point_mut(handle)?.position += offset,
            LightKind::Spot => self.lights.spot_mut(handle)?.position += offset,
            LightKind::Directional => {
                let light = self.lights.directional_mut(handle)?;
                let direction = light.direction + offset;
                if direction.magnitude2() > 0.0 {
                    light.direction = direction.normalize();
                }
            }
        }
        Ok(())
    }

    /// Widens the selected spot light's cone by `delta` (narrows when negative).
    /// Both cutoffs stay inside [0, 90] degrees with inner <= outer.
    pub fn widen_selected_spot(&mut self, delta: Deg<f32>) -> Result<(), ViewerError> {
        let handle = match self.selected_light {
            Some(handle) if handle.kind() == LightKind::Spot && delta.0 != 0.0 => handle,
            _ => return Ok(()),
        };
        let spot = self.lights.spot_mut(handle)?;
        let outer = (spot.outer_angle().0 + delta.0).clamp(0.0, 90.0);
        let inner = (spot.inner_angle().0 + delta.0).clamp(0.0, outer);
        spot.set_cutoff_angles(Deg(inner), Deg(outer))?;
        Ok(())
    }
}
