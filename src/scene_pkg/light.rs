use cgmath::{Deg, Point3, Vector3};

use super::error::LightError;

/// Attenuation defaults that approximate an inverse-square falloff over ~50 units.
pub const DEFAULT_ATT_CONSTANT: f32 = 1.0;
pub const DEFAULT_ATT_LINEAR: f32 = 0.09;
pub const DEFAULT_ATT_QUADRATIC: f32 = 0.032;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Point3<f32>,
    pub color: Vector3<f32>,
    pub att_constant: f32,
    pub att_linear: f32,
    pub att_quadratic: f32,
}

impl PointLight {
    pub fn new(position: Point3<f32>, color: Vector3<f32>) -> PointLight {
        PointLight {
            position,
            color,
            att_constant: DEFAULT_ATT_CONSTANT,
            att_linear: DEFAULT_ATT_LINEAR,
            att_quadratic: DEFAULT_ATT_QUADRATIC,
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        PointLight::new(Point3::new(0.0, 2.0, 2.0), Vector3::new(1.0, 1.0, 1.0))
    }
}

/// Infinitely distant light: no position, no attenuation.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vector3<f32>,
    pub color: Vector3<f32>,
}

impl DirectionalLight {
    pub fn new(direction: Vector3<f32>, color: Vector3<f32>) -> DirectionalLight {
        DirectionalLight { direction, color }
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        DirectionalLight::new(Vector3::new(-0.2, -1.0, -0.3), Vector3::new(0.8, 0.8, 0.8))
    }
}

/// Cone light. Cutoffs are kept as cosines of the half-angles so the fragment
/// stage compares cosines directly; `cos_outer <= cos_inner` always holds.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub position: Point3<f32>,
    pub direction: Vector3<f32>,
    pub color: Vector3<f32>,
    cos_inner: f32,
    cos_outer: f32,
}

impl SpotLight {
    pub fn new(
        position: Point3<f32>,
        direction: Vector3<f32>,
        color: Vector3<f32>,
        inner: Deg<f32>,
        outer: Deg<f32>,
    ) -> Result<SpotLight, LightError> {
        let (cos_inner, cos_outer) = cutoff_cosines(inner, outer)?;
        Ok(SpotLight {
            position,
            direction,
            color,
            cos_inner,
            cos_outer,
        })
    }

    pub fn cosine_inner_cutoff(&self) -> f32 {
        self.cos_inner
    }

    pub fn cosine_outer_cutoff(&self) -> f32 {
        self.cos_outer
    }

    pub fn inner_angle(&self) -> Deg<f32> {
        Deg(self.cos_inner.acos().to_degrees())
    }

    pub fn outer_angle(&self) -> Deg<f32> {
        Deg(self.cos_outer.acos().to_degrees())
    }

    /// Replaces both cutoffs at once. Leaves the light untouched on error.
    pub fn set_cutoff_angles(&mut self, inner: Deg<f32>, outer: Deg<f32>) -> Result<(), LightError> {
        let (cos_inner, cos_outer) = cutoff_cosines(inner, outer)?;
        self.cos_inner = cos_inner;
        self.cos_outer = cos_outer;
        Ok(())
    }
}

impl Default for SpotLight {
    fn default() -> Self {
        SpotLight {
            position: Point3::new(0.0, 0.0, 3.0),
            direction: Vector3::new(0.0, 0.0, -1.0),
            color: Vector3::new(1.0, 1.0, 1.0),
            cos_inner: 12.5f32.to_radians().cos(),
            cos_outer: 17.5f32.to_radians().cos(),
        }
    }
}

fn cutoff_cosines(inner: Deg<f32>, outer: Deg<f32>) -> Result<(f32, f32), LightError> {
    let valid = |angle: Deg<f32>| angle.0.is_finite() && angle.0 >= 0.0 && angle.0 <= 90.0;
    if !valid(inner) || !valid(outer) || outer.0 < inner.0 {
        return Err(LightError::InvalidCutoff {
            inner: inner.0,
            outer: outer.0,
        });
    }
    Ok((inner.0.to_radians().cos(), outer.0.to_radians().cos()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Point(PointLight),
    Directional(DirectionalLight),
    Spot(SpotLight),
}

impl Light {
    pub fn kind(&self) -> LightKind {
        match self {
            Light::Point(_) => LightKind::Point,
            Light::Directional(_) => LightKind::Directional,
            Light::Spot(_) => LightKind::Spot,
        }
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Light::Directional(light)
    }
}

impl From<SpotLight> for Light {
    fn from(light: SpotLight) -> Self {
        Light::Spot(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_cutoffs_are_stored_as_cosines() {
        let spot = SpotLight::new(
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Deg(10.0),
            Deg(20.0),
        )
        .unwrap();

        assert!((spot.cosine_inner_cutoff() - 0.9848).abs() < 1e-4);
        assert!((spot.cosine_outer_cutoff() - 0.9397).abs() < 1e-4);
        assert!(spot.cosine_inner_cutoff() > spot.cosine_outer_cutoff());
        assert!((spot.inner_angle().0 - 10.0).abs() < 1e-3);
    }

    #[test]
    fn inverted_cutoffs_are_rejected() {
        let result = SpotLight::new(
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Deg(25.0),
            Deg(15.0),
        );
        assert!(matches!(result, Err(LightError::InvalidCutoff { .. })));
    }

    #[test]
    fn failed_cutoff_edit_keeps_previous_values() {
        let mut spot = SpotLight::default();
        let before = spot;
        assert!(spot.set_cutoff_angles(Deg(30.0), Deg(95.0)).is_err());
        assert_eq!(spot, before);

        spot.set_cutoff_angles(Deg(5.0), Deg(5.0)).unwrap();
        assert_eq!(spot.cosine_inner_cutoff(), spot.cosine_outer_cutoff());
    }

    #[test]
    fn point_light_uses_default_attenuation() {
        let light = PointLight::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(light.att_constant, 1.0);
        assert_eq!(light.att_linear, 0.09);
        assert_eq!(light.att_quadratic, 0.032);
    }
}
