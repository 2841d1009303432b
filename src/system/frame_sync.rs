use cgmath::{EuclideanSpace, Vector3};
use log::warn;

use super::error::UniformError;
use super::uniform_layout::UniformValue;
use crate::scene_pkg::light::{LightKind, PointLight, SpotLight};
use crate::scene_pkg::scene::Scene;
use crate::scene_pkg::texture::{TextureBackend, TextureSlot};

pub const POINT_LIGHTS: &str = "pointLights";
pub const SPOT_LIGHTS: &str = "spotLights";
pub const DIR_LIGHT: &str = "dirLight";

const POINT_FIELDS: [&str; 5] = ["position", "color", "attConstant", "attLinear", "attQuadratic"];
const SPOT_FIELDS: [&str; 5] = [
    "position",
    "direction",
    "color",
    "cosineInnerCutoff",
    "cosineOuterCutoff",
];
const DIR_FIELDS: [&str; 2] = ["direction", "color"];

/// Anything that accepts name-addressed uniform writes.
pub trait UniformSink {
    /// Called once before the first write of a frame.
    fn begin_frame(&mut self) {}

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError>;

    /// Declared length of an array uniform, if the sink knows it.
    fn array_capacity(&self, _name: &str) -> Option<usize> {
        None
    }
}

/// `arrayName[index].fieldName`
pub fn element_field(array: &str, index: usize, field: &str) -> String {
    format!("{}[{}].{}", array, index, field)
}

/// `structName.fieldName`
pub fn struct_field(name: &str, field: &str) -> String {
    format!("{}.{}", name, field)
}

/// `pointLights` -> `numPointLights`
pub fn count_name(array: &str) -> String {
    let mut chars = array.chars();
    match chars.next() {
        Some(first) => format!("num{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "num".to_string(),
    }
}

/// Every name `sync_frame` may write, with arrays represented by their first
/// element. A program missing any of these is rejected at link time.
pub fn required_uniforms() -> Vec<String> {
    let mut names: Vec<String> = ["model", "normalMatrix", "view", "projection", "cameraPosition"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    names.push(count_name(POINT_LIGHTS));
    names.push(count_name(SPOT_LIGHTS));
    names.extend(POINT_FIELDS.iter().map(|field| element_field(POINT_LIGHTS, 0, field)));
    names.extend(SPOT_FIELDS.iter().map(|field| element_field(SPOT_LIGHTS, 0, field)));
    names.extend(DIR_FIELDS.iter().map(|field| struct_field(DIR_LIGHT, field)));
    names.extend(TextureSlot::ALL.iter().map(|slot| slot.sampler_name().to_string()));
    names
}

/// Pushes the whole scene into `sink`. Nothing is cached between frames:
/// every uniform is rewritten every call.
pub fn sync_frame<B, S>(scene: &mut Scene<B>, sink: &mut S) -> Result<(), UniformError>
where
    B: TextureBackend,
    S: UniformSink + ?Sized,
{
    sink.begin_frame();

    sink.set_uniform("model", scene.transform.matrix().into())?;
    sink.set_uniform("normalMatrix", scene.transform.normal_matrix().into())?;

    sink.set_uniform("view", scene.camera.get_view_matrix().into())?;
    sink.set_uniform("projection", scene.projection.matrix().into())?;

    scene.textures.bind_all();
    for slot in TextureSlot::ALL {
        if scene.textures.is_filled(slot) {
            sink.set_uniform(slot.sampler_name(), UniformValue::Int(slot.unit() as i32))?;
        }
    }

    let point_count = visible_count(
        POINT_LIGHTS,
        scene.lights.count(LightKind::Point),
        sink.array_capacity(POINT_LIGHTS),
    );
    sink.set_uniform(&count_name(POINT_LIGHTS), UniformValue::Int(point_count as i32))?;
    let spot_count = visible_count(
        SPOT_LIGHTS,
        scene.lights.count(LightKind::Spot),
        sink.array_capacity(SPOT_LIGHTS),
    );
    sink.set_uniform(&count_name(SPOT_LIGHTS), UniformValue::Int(spot_count as i32))?;

    for (index, light) in scene.lights.point_lights().take(point_count).enumerate() {
        write_point_light(sink, index, light)?;
    }
    for (index, light) in scene.lights.spot_lights().take(spot_count).enumerate() {
        write_spot_light(sink, index, light)?;
    }

    // dirLight is a single struct
    visible_count(DIR_LIGHT, scene.lights.count(LightKind::Directional), Some(1));
    let (direction, color) = match scene.lights.directional_lights().next() {
        Some(light) => (light.direction, light.color),
        None => (Vector3::new(0.0, -1.0, 0.0), Vector3::new(0.0, 0.0, 0.0)),
    };
    sink.set_uniform(&struct_field(DIR_LIGHT, "direction"), direction.into())?;
    sink.set_uniform(&struct_field(DIR_LIGHT, "color"), color.into())?;

    sink.set_uniform("cameraPosition", scene.camera.position().to_vec().into())?;
    Ok(())
}

fn visible_count(target: &str, len: usize, capacity: Option<usize>) -> usize {
    match capacity {
        Some(capacity) if len > capacity => {
            warn!(
                "{} lights for {} but the shader holds {}; extra lights are ignored",
                len, target, capacity
            );
            capacity
        }
        _ => len,
    }
}

fn write_point_light<S: UniformSink + ?Sized>(
    sink: &mut S,
    index: usize,
    light: &PointLight,
) -> Result<(), UniformError> {
    let name = |field| element_field(POINT_LIGHTS, index, field);
    sink.set_uniform(&name("position"), light.position.to_vec().into())?;
    sink.set_uniform(&name("color"), light.color.into())?;
    sink.set_uniform(&name("attConstant"), UniformValue::Float(light.att_constant))?;
    sink.set_uniform(&name("attLinear"), UniformValue::Float(light.att_linear))?;
    sink.set_uniform(&name("attQuadratic"), UniformValue::Float(light.att_quadratic))
}

fn write_spot_light<S: UniformSink + ?Sized>(
    sink: &mut S,
    index: usize,
    light: &SpotLight,
) -> Result<(), UniformError> {
    let name = |field| element_field(SPOT_LIGHTS, index, field);
    sink.set_uniform(&name("position"), light.position.to_vec().into())?;
    sink.set_uniform(&name("direction"), light.direction.into())?;
    sink.set_uniform(&name("color"), light.color.into())?;
    sink.set_uniform(
        &name("cosineInnerCutoff"),
        UniformValue::Float(light.cosine_inner_cutoff()),
    )?;
    sink.set_uniform(
        &name("cosineOuterCutoff"),
        UniformValue::Float(light.cosine_outer_cutoff()),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::path::Path;

    use cgmath::{Deg, Point3};

    use super::*;
    use crate::scene_pkg::light::DirectionalLight;
    use crate::scene_pkg::scene::tests::scene;
    use crate::scene_pkg::texture::tests::pixel;
    use crate::system::shader_program::ShaderProgram;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<(String, UniformValue)>,
        capacities: HashMap<String, usize>,
        frames: usize,
    }

    impl RecordingSink {
        fn names(&self) -> BTreeSet<String> {
            self.writes.iter().map(|(name, _)| name.clone()).collect()
        }

        fn value(&self, name: &str) -> Option<UniformValue> {
            self.writes
                .iter()
                .rev()
                .find(|(written, _)| written == name)
                .map(|(_, value)| *value)
        }
    }

    impl UniformSink for RecordingSink {
        fn begin_frame(&mut self) {
            self.frames += 1;
        }

        fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
            self.writes.push((name.to_string(), value));
            Ok(())
        }

        fn array_capacity(&self, name: &str) -> Option<usize> {
            self.capacities.get(name).copied()
        }
    }

    #[test]
    fn naming_grammar() {
        assert_eq!(element_field("pointLights", 3, "attLinear"), "pointLights[3].attLinear");
        assert_eq!(struct_field("dirLight", "color"), "dirLight.color");
        assert_eq!(count_name("spotLights"), "numSpotLights");
    }

    #[test]
    fn full_scene_writes_exactly_the_expected_uniforms() {
        let mut scene = scene();
        scene.lights.add(PointLight::default());
        scene.lights.add(PointLight::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(1.0, 0.0, 0.0)));
        scene.lights.add(DirectionalLight::new(Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.5, 0.5, 0.5)));
        scene.lights.add(SpotLight::default());
        for slot in [TextureSlot::Albedo, TextureSlot::Normal, TextureSlot::Metallic] {
            scene.textures.replace(slot, Path::new("t.png"), &pixel()).unwrap();
        }

        let mut sink = RecordingSink::default();
        sync_frame(&mut scene, &mut sink).unwrap();

        let mut expected: BTreeSet<String> = [
            "model",
            "normalMatrix",
            "view",
            "projection",
            "albedoMap",
            "normalMap",
            "metallicMap",
            "numPointLights",
            "numSpotLights",
            "dirLight.direction",
            "dirLight.color",
            "cameraPosition",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();
        for index in 0..2 {
            expected.extend(POINT_FIELDS.iter().map(|f| element_field(POINT_LIGHTS, index, f)));
        }
        expected.extend(SPOT_FIELDS.iter().map(|f| element_field(SPOT_LIGHTS, 0, f)));

        assert_eq!(sink.names(), expected);
        assert_eq!(sink.writes.len(), expected.len());
        assert_eq!(sink.value("numPointLights"), Some(UniformValue::Int(2)));
        assert_eq!(sink.value("numSpotLights"), Some(UniformValue::Int(1)));
        assert_eq!(sink.value("metallicMap"), Some(UniformValue::Int(2)));
        assert_eq!(
            sink.value("pointLights[1].position"),
            Some(UniformValue::Vec3([1.0, 2.0, 3.0]))
        );
        assert_eq!(
            sink.value("dirLight.color"),
            Some(UniformValue::Vec3([0.5, 0.5, 0.5]))
        );
        assert_eq!(
            sink.value("cameraPosition"),
            Some(UniformValue::Vec3([0.0, 0.0, 3.0]))
        );

        let log = scene.textures.backend().log.borrow();
        assert_eq!(log.bound.get(&1), Some(&Some(2)));
        assert_eq!(log.bound.get(&4), Some(&None));
    }

    #[test]
    fn point_count_tracks_sequence_length() {
        let mut scene = scene();
        let mut sink = RecordingSink::default();
        for expected in 0..6 {
            sync_frame(&mut scene, &mut sink).unwrap();
            assert_eq!(sink.value("numPointLights"), Some(UniformValue::Int(expected)));
            scene.lights.add(PointLight::default());
        }
        assert_eq!(sink.frames, 6);
    }

    #[test]
    fn missing_directional_light_writes_neutral_values() {
        let mut scene = scene();
        let mut sink = RecordingSink::default();
        sync_frame(&mut scene, &mut sink).unwrap();
        assert_eq!(sink.value("dirLight.color"), Some(UniformValue::Vec3([0.0, 0.0, 0.0])));
        assert_eq!(
            sink.value("dirLight.direction"),
            Some(UniformValue::Vec3([0.0, -1.0, 0.0]))
        );
        assert!(sink.value("albedoMap").is_none());
    }

    #[test]
    fn only_the_first_directional_light_is_written() {
        let mut scene = scene();
        scene.lights.add(DirectionalLight::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.5, 0.5, 0.5),
        ));
        scene.lights.add(DirectionalLight::new(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
        ));
        let mut sink = RecordingSink::default();
        sync_frame(&mut scene, &mut sink).unwrap();

        assert_eq!(sink.value("dirLight.direction"), Some(UniformValue::Vec3([1.0, 0.0, 0.0])));
        assert_eq!(sink.value("dirLight.color"), Some(UniformValue::Vec3([0.5, 0.5, 0.5])));
        assert_eq!(visible_count(DIR_LIGHT, 2, Some(1)), 1);
        assert_eq!(visible_count(DIR_LIGHT, 1, Some(1)), 1);
        assert_eq!(visible_count(POINT_LIGHTS, 7, None), 7);
    }

    #[test]
    fn lights_beyond_capacity_are_truncated() {
        let mut scene = scene();
        for _ in 0..5 {
            scene.lights.add(PointLight::default());
        }
        let mut sink = RecordingSink::default();
        sink.capacities.insert(POINT_LIGHTS.to_string(), 3);
        sync_frame(&mut scene, &mut sink).unwrap();

        assert_eq!(sink.value("numPointLights"), Some(UniformValue::Int(3)));
        assert!(sink.value("pointLights[2].color").is_some());
        assert!(sink.value("pointLights[3].color").is_none());
    }

    #[test]
    fn spot_cutoffs_are_written_as_cosines() {
        let mut scene = scene();
        let spot = SpotLight::new(
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Deg(10.0),
            Deg(20.0),
        )
        .unwrap();
        scene.lights.add(spot);
        let mut sink = RecordingSink::default();
        sync_frame(&mut scene, &mut sink).unwrap();

        match sink.value("spotLights[0].cosineInnerCutoff") {
            Some(UniformValue::Float(inner)) => assert!((inner - 0.9848).abs() < 1e-4),
            other => panic!("unexpected {:?}", other),
        }
        match sink.value("spotLights[0].cosineOuterCutoff") {
            Some(UniformValue::Float(outer)) => assert!((outer - 0.9397).abs() < 1e-4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bundled_shaders_accept_every_frame_uniform() {
        let mut program = ShaderProgram::link(
            &[
                include_str!("../../shaders/model.vert"),
                include_str!("../../shaders/model.frag"),
            ],
            &required_uniforms(),
        )
        .unwrap();

        let mut scene = scene();
        scene.lights.add(PointLight::default());
        scene.lights.add(SpotLight::default());
        scene.lights.add(DirectionalLight::default());
        scene
            .textures
            .replace(TextureSlot::Roughness, Path::new("r.png"), &pixel())
            .unwrap();
        sync_frame(&mut scene, &mut program).unwrap();

        let roughness_binding = program.interface().samplers["roughnessMap"];
        assert_eq!(program.sampler_units().get(&roughness_binding), Some(&3));
        assert_eq!(program.sampler_units().len(), 1);
    }

    #[test]
    fn program_without_light_uniforms_fails_at_link() {
        let fragment = "
layout(set = 0, binding = 0) uniform FrameUniforms {
    mat4 model;
    mat3 normalMatrix;
    mat4 view;
    mat4 projection;
    vec3 cameraPosition;
};";
        let result = ShaderProgram::link(&[fragment], &required_uniforms());
        assert!(matches!(
            result,
            Err(crate::system::error::ShaderError::MissingUniform(name)) if name == "numPointLights"
        ));
    }
}
