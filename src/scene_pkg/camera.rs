use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix3, Matrix4, Point3, Vector3};

use super::error::CameraError;

// Smallest |cross(front, world_up)| accepted before the basis is considered degenerate.
const MIN_RIGHT_LENGTH: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// First-person camera. `front`, `up` and `right` form an orthonormal basis
/// after every update; `up` and `right` are always derived from `front`.
#[derive(Clone, Debug)]
pub struct Camera {
    position: Point3<f32>,
    front: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    world_up: Vector3<f32>,
    last_cursor: Option<(f32, f32)>,
    pub mouse_sensitivity: f32,
    pub movement_speed: f32,
}

impl Camera {
    pub fn new(
        position: Point3<f32>,
        front: Vector3<f32>,
        world_up: Vector3<f32>,
    ) -> Result<Camera, CameraError> {
        if front.magnitude2() == 0.0 || world_up.magnitude2() == 0.0 {
            return Err(CameraError::DegenerateBasis);
        }
        let world_up = world_up.normalize();
        let (front, up, right) =
            orthonormal_basis(front.normalize(), world_up).ok_or(CameraError::DegenerateBasis)?;

        Ok(Camera {
            position,
            front,
            up,
            right,
            world_up,
            last_cursor: None,
            mouse_sensitivity: 0.1,
            movement_speed: 2.5,
        })
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn get_view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Feeds an absolute cursor position. The first sample only primes the
    /// tracker so the view does not jump from an unknown previous position.
    pub fn process_cursor_position(&mut self, x: f32, y: f32) {
        let (last_x, last_y) = *self.last_cursor.get_or_insert((x, y));
        self.last_cursor = Some((x, y));
        self.process_mouse_movement(x - last_x, y - last_y);
    }

    /// Forgets the last cursor sample, e.g. after the cursor was released.
    pub fn reset_cursor(&mut self) {
        self.last_cursor = None;
    }

    /// Pitches about `right`, then yaws about `up`, by `delta * sensitivity` degrees.
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32) {
        if x_offset == 0.0 && y_offset == 0.0 {
            return;
        }

        let pitch = Matrix3::from_axis_angle(self.right, Deg(-y_offset * self.mouse_sensitivity));
        let pitched = (pitch * self.front).normalize();
        // a pitch that reaches or crosses world-up would flip or zero `right`
        if let Some((front, up, right)) = orthonormal_basis(pitched, self.world_up) {
            if right.dot(self.right) > 0.0 {
                self.front = front;
                self.up = up;
                self.right = right;
            }
        }

        let yaw = Matrix3::from_axis_angle(self.up, Deg(-x_offset * self.mouse_sensitivity));
        let yawed = (yaw * self.front).normalize();
        if let Some((front, up, right)) = orthonormal_basis(yawed, self.world_up) {
            self.front = front;
            self.up = up;
            self.right = right;
        }
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        let side = self.front.cross(self.up).normalize();
        let offset = match direction {
            CameraMovement::Forward => self.front * velocity,
            CameraMovement::Backward => -self.front * velocity,
            CameraMovement::Left => -side * velocity,
            CameraMovement::Right => side * velocity,
        };
        self.position = Point3::from_vec(self.position.to_vec() + offset);
    }
}

fn orthonormal_basis(
    front: Vector3<f32>,
    world_up: Vector3<f32>,
) -> Option<(Vector3<f32>, Vector3<f32>, Vector3<f32>)> {
    let right = front.cross(world_up);
    if right.magnitude() < MIN_RIGHT_LENGTH {
        return None;
    }
    let right = right.normalize();
    let up = right.cross(front).normalize();
    Some((front, up, right))
}
