use log::debug;

use super::error::LightError;
use super::light::{DirectionalLight, Light, LightKind, PointLight, SpotLight};

/// Stable identity of one light. Ids are never reused, so a handle to a
/// removed light stays dangling forever instead of aliasing a newer light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightHandle {
    kind: LightKind,
    id: u64,
}

impl LightHandle {
    pub fn kind(&self) -> LightKind {
        self.kind
    }
}

/// One insertion-ordered sequence of a single light variant.
#[derive(Clone, Debug)]
struct LightList<L> {
    entries: Vec<(u64, L)>,
}

impl<L: PartialEq> LightList<L> {
    fn new() -> Self {
        LightList { entries: vec![] }
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.entries.iter().position(|(entry_id, _)| *entry_id == id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut L> {
        self.entries
            .iter_mut()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, light)| light)
    }

    fn remove(&mut self, id: u64) -> Option<L> {
        self.position(id).map(|index| self.entries.remove(index).1)
    }

    fn remove_matching(&mut self, light: &L) -> Option<u64> {
        let index = self.entries.iter().position(|(_, entry)| entry == light)?;
        Some(self.entries.remove(index).0)
    }

    fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    fn values(&self) -> impl Iterator<Item = &L> {
        self.entries.iter().map(|(_, light)| light)
    }
}

/// Owns every light in the scene, one ordered sequence per variant.
/// The position of a light in its sequence is its shader array index.
#[derive(Clone, Debug)]
pub struct LightRegistry {
    next_id: u64,
    points: LightList<PointLight>,
    directionals: LightList<DirectionalLight>,
    spots: LightList<SpotLight>,
}

impl Default for LightRegistry {
    fn default() -> Self {
        LightRegistry::new()
    }
}

impl LightRegistry {
    pub fn new() -> LightRegistry {
        LightRegistry {
            next_id: 0,
            points: LightList::new(),
            directionals: LightList::new(),
            spots: LightList::new(),
        }
    }

    pub fn add(&mut self, light: impl Into<Light>) -> LightHandle {
        let light = light.into();
        let id = self.next_id;
        self.next_id += 1;
        match light {
            Light::Point(point) => self.points.entries.push((id, point)),
            Light::Directional(directional) => self.directionals.entries.push((id, directional)),
            Light::Spot(spot) => self.spots.entries.push((id, spot)),
        }
        let handle = LightHandle {
            kind: light.kind(),
            id,
        };
        debug!("added light {:?}", handle);
        handle
    }

    pub fn remove(&mut self, handle: LightHandle) -> Result<Light, LightError> {
        let removed = match handle.kind {
            LightKind::Point => self.points.remove(handle.id).map(Light::Point),
            LightKind::Directional => self.directionals.remove(handle.id).map(Light::Directional),
            LightKind::Spot => self.spots.remove(handle.id).map(Light::Spot),
        };
        let removed = removed.ok_or(LightError::NotFound(handle))?;
        debug!("removed light {:?}", handle);
        Ok(removed)
    }

    /// Removes the first light that compares equal field-by-field.
    pub fn remove_matching(&mut self, light: &Light) -> Result<LightHandle, LightError> {
        let id = match light {
            Light::Point(point) => self.points.remove_matching(point),
            Light::Directional(directional) => self.directionals.remove_matching(directional),
            Light::Spot(spot) => self.spots.remove_matching(spot),
        };
        let id = id.ok_or(LightError::ValueNotFound(light.kind()))?;
        Ok(LightHandle {
            kind: light.kind(),
            id,
        })
    }

    /// Current position of the light inside its sequence.
    pub fn index_of(&self, handle: LightHandle) -> Option<usize> {
        match handle.kind {
            LightKind::Point => self.points.position(handle.id),
            LightKind::Directional => self.directionals.position(handle.id),
            LightKind::Spot => self.spots.position(handle.id),
        }
    }

    pub fn point_mut(&mut self, handle: LightHandle) -> Result<&mut PointLight, LightError> {
        check_kind(handle, LightKind::Point)?;
        self.points.get_mut(handle.id).ok_or(LightError::NotFound(handle))
    }

    pub fn directional_mut(&mut self, handle: LightHandle) -> Result<&mut DirectionalLight, LightError> {
        check_kind(handle, LightKind::Directional)?;
        self.directionals
            .get_mut(handle.id)
            .ok_or(LightError::NotFound(handle))
    }

    pub fn spot_mut(&mut self, handle: LightHandle) -> Result<&mut SpotLight, LightError> {
        check_kind(handle, LightKind::Spot)?;
        self.spots.get_mut(handle.id).ok_or(LightError::NotFound(handle))
    }

    pub fn point_lights(&self) -> impl Iterator<Item = &PointLight> {
        self.points.values()
    }

    pub fn directional_lights(&self) -> impl Iterator<Item = &DirectionalLight> {
        self.directionals.values()
    }

    pub fn spot_lights(&self) -> impl Iterator<Item = &SpotLight> {
        self.spots.values()
    }

    /// Every handle in the order points, directionals, spots.
    pub fn handles(&self) -> Vec<LightHandle> {
        let points = self.points.ids().map(|id| LightHandle {
            kind: LightKind::Point,
            id,
        });
        let directionals = self.directionals.ids().map(|id| LightHandle {
            kind: LightKind::Directional,
            id,
        });
        let spots = self.spots.ids().map(|id| LightHandle {
            kind: LightKind::Spot,
            id,
        });
        points.chain(directionals).chain(spots).collect()
    }

    pub fn count(&self, kind: LightKind) -> usize {
        match kind {
            LightKind::Point => self.points.entries.len(),
            LightKind::Directional => self.directionals.entries.len(),
            LightKind::Spot => self.spots.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.entries.len() + self.directionals.entries.len() + self.spots.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.points.entries.clear();
        self.directionals.entries.clear();
        self.spots.entries.clear();
    }
}

fn check_kind(handle: LightHandle, expected: LightKind) -> Result<(), LightError> {
    if handle.kind != expected {
        return Err(LightError::KindMismatch {
            handle,
            expected,
            actual: handle.kind,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cgmath::{Point3, Vector3};

    use super::*;

    fn point_at(x: f32) -> PointLight {
        PointLight::new(Point3::new(x, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn add_appends_in_insertion_order() {
        let mut registry = LightRegistry::new();
        for i in 0..5 {
            registry.add(point_at(i as f32));
            assert_eq!(registry.count(LightKind::Point), i + 1);
        }
        let xs: Vec<f32> = registry.point_lights().map(|l| l.position.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn remove_matching_miss_leaves_sequence_unchanged() {
        let mut registry = LightRegistry::new();
        registry.add(point_at(1.0));
        registry.add(point_at(2.0));

        let result = registry.remove_matching(&Light::Point(point_at(7.0)));
        assert!(matches!(result, Err(LightError::ValueNotFound(LightKind::Point))));
        assert_eq!(registry.count(LightKind::Point), 2);
    }

    #[test]
    fn remove_matching_takes_first_equal_value() {
        let mut registry = LightRegistry::new();
        let first = registry.add(point_at(1.0));
        let second = registry.add(point_at(1.0));

        let removed = registry.remove_matching(&Light::Point(point_at(1.0))).unwrap();
        assert_eq!(removed, first);
        assert!(registry.index_of(second).is_some());
        assert_eq!(registry.index_of(second), Some(0));
    }

    #[test]
    fn handles_survive_removal_of_other_lights() {
        let mut registry = LightRegistry::new();
        let a = registry.add(point_at(0.0));
        let b = registry.add(point_at(1.0));
        let c = registry.add(point_at(2.0));

        registry.remove(a).unwrap();
        registry.add(point_at(3.0));

        assert_eq!(registry.index_of(b), Some(0));
        registry.point_mut(c).unwrap().color = Vector3::new(0.0, 1.0, 0.0);
        assert_eq!(registry.point_lights().nth(1).unwrap().color, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut registry = LightRegistry::new();
        let handle = registry.add(point_at(0.0));
        registry.remove(handle).unwrap();
        registry.add(point_at(0.0));

        assert!(matches!(registry.remove(handle), Err(LightError::NotFound(_))));
        assert!(matches!(registry.point_mut(handle), Err(LightError::NotFound(_))));
        assert_eq!(registry.count(LightKind::Point), 1);
    }

    #[test]
    fn typed_access_checks_the_variant() {
        let mut registry = LightRegistry::new();
        let handle = registry.add(DirectionalLight::default());
        assert!(matches!(
            registry.spot_mut(handle),
            Err(LightError::KindMismatch { .. })
        ));
        assert!(registry.directional_mut(handle).is_ok());
    }

    #[test]
    fn handles_are_listed_by_variant() {
        let mut registry = LightRegistry::new();
        let spot = registry.add(SpotLight::default());
        let point = registry.add(point_at(0.0));
        let directional = registry.add(DirectionalLight::default());
        assert_eq!(registry.handles(), vec![point, directional, spot]);
        assert_eq!(registry.len(), 3);
        registry.clear();
        assert!(registry.is_empty());
    }
}
