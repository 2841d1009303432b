use cgmath::{Deg, InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};

use super::error::TransformError;

/// Default zoom step: zoom in scales by `1 + ZOOM_STEP`, zoom out by `1 - ZOOM_STEP`.
pub const ZOOM_STEP: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalAxis {
    X,
    Y,
    Z,
}

impl LocalAxis {
    fn unit(self) -> Vector3<f32> {
        match self {
            LocalAxis::X => Vector3::unit_x(),
            LocalAxis::Y => Vector3::unit_y(),
            LocalAxis::Z => Vector3::unit_z(),
        }
    }
}

/// Free model transform: a single accumulated matrix, edited in the model's
/// own axes. Nothing renormalizes it, so long edit sessions drift.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelTransform {
    matrix: Matrix4<f32>,
}

impl Default for ModelTransform {
    fn default() -> Self {
        ModelTransform::new()
    }
}

impl ModelTransform {
    pub fn new() -> ModelTransform {
        ModelTransform {
            matrix: Matrix4::identity(),
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    pub fn reset(&mut self) {
        self.matrix = Matrix4::identity();
    }

    /// Inverse-transpose of the upper 3x3, for transforming normals under
    /// non-uniform scale. Falls back to the plain 3x3 if it is singular.
    pub fn normal_matrix(&self) -> Matrix3<f32> {
        let upper = upper_3x3(&self.matrix);
        upper.invert().map(|inverse| inverse.transpose()).unwrap_or(upper)
    }

    /// Direction of a local axis in world space.
    pub fn world_axis(&self, axis: LocalAxis) -> Vector3<f32> {
        (self.matrix * axis.unit().extend(0.0)).truncate()
    }

    pub fn rotate(&mut self, axis: LocalAxis, angle: Deg<f32>) -> Result<(), TransformError> {
        self.compose_local(Matrix4::from_axis_angle(axis.unit(), angle))
    }

    pub fn translate(&mut self, axis: LocalAxis, distance: f32) -> Result<(), TransformError> {
        self.compose_local(Matrix4::from_translation(axis.unit() * distance))
    }

    pub fn scale(&mut self, factor: f32) -> Result<(), TransformError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(TransformError::InvalidScale(factor));
        }
        self.compose_local(Matrix4::from_scale(factor))
    }

    pub fn zoom_in(&mut self, step: f32) -> Result<(), TransformError> {
        self.scale(1.0 + step)
    }

    /// Not the inverse of `zoom_in`: (1 + f)(1 - f) = 1 - f^2.
    pub fn zoom_out(&mut self, step: f32) -> Result<(), TransformError> {
        self.scale(1.0 - step)
    }

    /// Uniform scale currently carried by the matrix, measured on the local X axis.
    pub fn uniform_scale(&self) -> f32 {
        self.world_axis(LocalAxis::X).magnitude()
    }

    // The local frame is recovered from the inverse of the current matrix and
    // the increment, conjugated into world space, is left-multiplied.
    fn compose_local(&mut self, local: Matrix4<f32>) -> Result<(), TransformError> {
        let inverse = self.matrix.invert().ok_or(TransformError::Degenerate)?;
        let world = self.matrix * local * inverse;
        let next = world * self.matrix;
        if !is_finite(&next) || next.determinant().abs() <= f32::EPSILON {
            return Err(TransformError::Degenerate);
        }
        self.matrix = next;
        Ok(())
    }
}

fn upper_3x3(m: &Matrix4<f32>) -> Matrix3<f32> {
    Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate())
}

fn is_finite(m: &Matrix4<f32>) -> bool {
    let cols: [Vector4<f32>; 4] = [m.x, m.y, m.z, m.w];
    cols.iter()
        .all(|c| c.x.is_finite() && c.y.is_finite() && c.z.is_finite() && c.w.is_finite())
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;
    use cgmath::Transform as _;

    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn zoom_in_then_out_does_not_return_to_identity() {
        let mut transform = ModelTransform::new();
        transform.zoom_in(ZOOM_STEP).unwrap();
        transform.zoom_out(ZOOM_STEP).unwrap();

        let scale = transform.matrix().x.x;
        assert!((scale - 0.9975).abs() < EPSILON);
        assert!(scale != 1.0);
    }

    #[test]
    fn translation_follows_local_axes() {
        let mut transform = ModelTransform::new();
        transform.rotate(LocalAxis::Y, Deg(90.0)).unwrap();
        transform.translate(LocalAxis::X, 2.0).unwrap();

        // local X now points along world -Z
        let origin = transform.matrix().transform_point(Point3::new(0.0, 0.0, 0.0));
        assert!(origin.x.abs() < EPSILON);
        assert!((origin.z + 2.0).abs() < EPSILON);
    }

    #[test]
    fn rotation_is_about_the_model_origin() {
        let mut transform = ModelTransform::new();
        transform.translate(LocalAxis::X, 5.0).unwrap();
        transform.rotate(LocalAxis::Z, Deg(45.0)).unwrap();

        let origin = transform.matrix().transform_point(Point3::new(0.0, 0.0, 0.0));
        assert!((origin.x - 5.0).abs() < EPSILON);
        assert!(origin.y.abs() < EPSILON);
    }

    #[test]
    fn invalid_scale_is_rejected_and_matrix_kept() {
        let mut transform = ModelTransform::new();
        transform.zoom_in(0.5).unwrap();
        let before = transform;

        assert_eq!(transform.scale(0.0), Err(TransformError::InvalidScale(0.0)));
        assert_eq!(transform.zoom_out(1.0), Err(TransformError::InvalidScale(0.0)));
        assert_eq!(transform, before);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose() {
        let mut transform = ModelTransform::new();
        transform.scale(2.0).unwrap();
        let normal = transform.normal_matrix();
        assert!((normal.x.x - 0.5).abs() < EPSILON);
        assert!((normal.y.y - 0.5).abs() < EPSILON);
        assert!((normal.z.z - 0.5).abs() < EPSILON);
    }

    #[test]
    fn reset_restores_identity() {
        let mut transform = ModelTransform::new();
        transform.rotate(LocalAxis::X, Deg(30.0)).unwrap();
        transform.reset();
        assert_eq!(transform.matrix(), Matrix4::identity());
        assert!((transform.uniform_scale() - 1.0).abs() < EPSILON);
    }
}
