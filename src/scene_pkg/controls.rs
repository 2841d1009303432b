use cgmath::{Deg, Vector3};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::event::VirtualKeyCode;

use super::camera::CameraMovement;
use super::error::TransformError;
use super::light::{DirectionalLight, Light, PointLight, SpotLight};
use super::scene::{Scene, SceneCommand};
use super::texture::{TextureBackend, TextureSlot};
use super::transform::LocalAxis;
use crate::config::input::FrameInput;
use crate::config::settings::ControlsConfig;
use crate::object_3d_loader::mesh_converters::is_model_file;

/// What the held movement keys act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    Camera,
    Model,
    Light,
}

impl ControlMode {
    pub fn next(self) -> ControlMode {
        match self {
            ControlMode::Camera => ControlMode::Model,
            ControlMode::Model => ControlMode::Light,
            ControlMode::Light => ControlMode::Camera,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlOutcome {
    pub exit: bool,
    /// A command failed this frame; the scene diagnostic has the message.
    pub failed: bool,
}

/// Turns one frame of input into scene edits: key presses become
/// `SceneCommand`s, held keys drive the active mode scaled by frame time.
pub struct Controls {
    pub mode: ControlMode,
    rates: ControlsConfig,
    texture_target: TextureSlot,
    rng: StdRng,
}

impl Controls {
    pub fn new(rates: ControlsConfig) -> Controls {
        Controls {
            mode: ControlMode::Camera,
            rates,
            texture_target: TextureSlot::Albedo,
            rng: StdRng::from_entropy(),
        }
    }

    /// Slot a dropped image file will replace.
    pub fn texture_target(&self) -> TextureSlot {
        self.texture_target
    }

    pub fn process<B: TextureBackend>(
        &mut self,
        frame: &FrameInput,
        scene: &mut Scene<B>,
        delta_time: f32,
    ) -> ControlOutcome {
        let mut outcome = ControlOutcome::default();

        let (commands, exit) = self.commands(frame, scene);
        outcome.exit = exit;
        for command in commands {
            if scene.apply(command).is_err() {
                outcome.failed = true;
            }
        }

        if frame.look_started {
            scene.camera.reset_cursor();
        }
        for (x, y) in &frame.cursor_positions {
            scene.camera.process_cursor_position(*x, *y);
        }

        match self.mode {
            ControlMode::Camera => self.move_camera(frame, scene, delta_time),
            ControlMode::Model => {
                if !self.move_model(frame, scene, delta_time) {
                    outcome.failed = true;
                }
            }
            ControlMode::Light => {
                if let Err(e) = scene.nudge_selected_light(self.light_offset(frame, delta_time)) {
                    warn!("light edit skipped: {}", e);
                    outcome.failed = true;
                }
                if let Err(e) = scene.widen_selected_spot(self.cone_delta(frame, delta_time)) {
                    warn!("spot cone edit skipped: {}", e);
                    outcome.failed = true;
                }
            }
        }
        outcome
    }

    /// Discrete commands for the keys pressed and files dropped this frame.
    pub fn commands<B: TextureBackend>(
        &mut self,
        frame: &FrameInput,
        scene: &Scene<B>,
    ) -> (Vec<SceneCommand>, bool) {
        let mut commands = vec![];
        let mut exit = false;

        for key in &frame.pressed {
            match key {
                VirtualKeyCode::Escape => exit = true,
                VirtualKeyCode::M => {
                    self.mode = self.mode.next();
                    info!("control mode: {:?}", self.mode);
                }
                VirtualKeyCode::Key1 | VirtualKeyCode::Key2 | VirtualKeyCode::Key3 => {
                    commands.push(SceneCommand::AddLight(self.new_light(*key, scene)));
                }
                VirtualKeyCode::Tab => commands.push(SceneCommand::SelectNextLight),
                VirtualKeyCode::Delete => commands.push(SceneCommand::DeleteSelectedLight),
                VirtualKeyCode::C if self.mode == ControlMode::Light => {
                    commands.push(SceneCommand::ClearLights)
                }
                VirtualKeyCode::Back => commands.push(SceneCommand::ResetTransform),
                VirtualKeyCode::F1 => self.set_texture_target(TextureSlot::Albedo),
                VirtualKeyCode::F2 => self.set_texture_target(TextureSlot::Normal),
                VirtualKeyCode::F3 => self.set_texture_target(TextureSlot::Metallic),
                VirtualKeyCode::F4 => self.set_texture_target(TextureSlot::Roughness),
                VirtualKeyCode::F5 => self.set_texture_target(TextureSlot::AmbientOcclusion),
                _ => {}
            }
        }

        for path in &frame.dropped_files {
            let command = if is_model_file(path) {
                SceneCommand::ReplaceModel(path.clone())
            } else {
                SceneCommand::ReplaceTexture(self.texture_target, path.clone())
            };
            commands.push(command);
        }
        (commands, exit)
    }

    fn set_texture_target(&mut self, slot: TextureSlot) {
        self.texture_target = slot;
        info!("dropped images will replace the {:?} texture", slot);
    }

    fn new_light<B: TextureBackend>(&mut self, key: VirtualKeyCode, scene: &Scene<B>) -> Light {
        let color = Vector3::new(
            self.rng.gen_range(0.2..=1.0),
            self.rng.gen_range(0.2..=1.0),
            self.rng.gen_range(0.2..=1.0),
        );
        let position = scene.camera.position();
        let direction = scene.camera.front();
        match key {
            VirtualKeyCode::Key1 => PointLight::new(position, color).into(),
            VirtualKeyCode::Key2 => DirectionalLight::new(direction, color).into(),
            _ => {
                let mut spot = SpotLight::default();
                spot.position = position;
                spot.direction = direction;
                spot.color = color;
                spot.into()
            }
        }
    }

    fn move_camera<B: TextureBackend>(&self, frame: &FrameInput, scene: &mut Scene<B>, delta_time: f32) {
        let bindings = [
            (VirtualKeyCode::W, CameraMovement::Forward),
            (VirtualKeyCode::S, CameraMovement::Backward),
            (VirtualKeyCode::A, CameraMovement::Left),
            (VirtualKeyCode::D, CameraMovement::Right),
        ];
        for (key, movement) in bindings {
            if frame.key_held(key) {
                scene.camera.process_keyboard(movement, delta_time);
            }
        }
    }

    /// Applies every held transform key; a rejected step is logged and the
    /// remaining ones still run. Returns false if any step was rejected.
    fn move_model<B: TextureBackend>(&self, frame: &FrameInput, scene: &mut Scene<B>, delta_time: f32) -> bool {
        let angle = self.rates.rotate_speed * delta_time;
        let distance = self.rates.translate_speed * delta_time;
        let transform = &mut scene.transform;
        let mut applied = true;
        let mut check = |step: &str, result: Result<(), TransformError>| {
            if let Err(e) = result {
                warn!("model {} skipped: {}", step, e);
                applied = false;
            }
        };

        let rotations = [
            (VirtualKeyCode::W, LocalAxis::X, -angle),
            (VirtualKeyCode::S, LocalAxis::X, angle),
            (VirtualKeyCode::A, LocalAxis::Y, -angle),
            (VirtualKeyCode::D, LocalAxis::Y, angle),
            (VirtualKeyCode::Q, LocalAxis::Z, angle),
            (VirtualKeyCode::E, LocalAxis::Z, -angle),
        ];
        for (key, axis, angle) in rotations {
            if frame.key_held(key) {
                check("rotation", transform.rotate(axis, Deg(angle)));
            }
        }

        let translations = [
            (VirtualKeyCode::Left, LocalAxis::X, -distance),
            (VirtualKeyCode::Right, LocalAxis::X, distance),
            (VirtualKeyCode::Up, LocalAxis::Y, distance),
            (VirtualKeyCode::Down, LocalAxis::Y, -distance),
            (VirtualKeyCode::PageUp, LocalAxis::Z, -distance),
            (VirtualKeyCode::PageDown, LocalAxis::Z, distance),
        ];
        for (key, axis, distance) in translations {
            if frame.key_held(key) {
                check("translation", transform.translate(axis, distance));
            }
        }

        let zoom = self.rates.zoom_rate * delta_time;
        if frame.key_held(VirtualKeyCode::Equals) {
            check("zoom", transform.zoom_in(zoom));
        }
        if frame.key_held(VirtualKeyCode::Minus) {
            check("zoom", transform.zoom_out(zoom));
        }
        applied
    }

    fn light_offset(&self, frame: &FrameInput, delta_time: f32) -> Vector3<f32> {
        let step = self.rates.light_speed * delta_time;
        let bindings = [
            (VirtualKeyCode::A, Vector3::new(-step, 0.0, 0.0)),
            (VirtualKeyCode::D, Vector3::new(step, 0.0, 0.0)),
            (VirtualKeyCode::E, Vector3::new(0.0, step, 0.0)),
            (VirtualKeyCode::Q, Vector3::new(0.0, -step, 0.0)),
            (VirtualKeyCode::W, Vector3::new(0.0, 0.0, -step)),
            (VirtualKeyCode::S, Vector3::new(0.0, 0.0, step)),
        ];
        let offset = bindings
            .iter()
            .filter(|(key, _)| frame.key_held(*key))
            .fold(Vector3::new(0.0, 0.0, 0.0), |sum, (_, offset)| sum + *offset);
        if offset != Vector3::new(0.0, 0.0, 0.0) {
            debug!("light offset {:?}", offset);
        }
        offset
    }

    fn cone_delta(&self, frame: &FrameInput, delta_time: f32) -> Deg<f32> {
        let step = self.rates.cone_speed * delta_time;
        let mut delta = 0.0;
        if frame.key_held(VirtualKeyCode::RBracket) {
            delta += step;
        }
        if frame.key_held(VirtualKeyCode::LBracket) {
            delta -= step;
        }
        Deg(delta)
    }
}
