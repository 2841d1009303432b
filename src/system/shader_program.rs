use std::collections::BTreeMap;

use log::{debug, info};

use super::error::{ShaderError, UniformError};
use super::frame_sync::UniformSink;
use super::uniform_layout::{ShaderInterface, UniformType, UniformValue};

/// A linked program seen from the host side: the merged uniform interface
/// of all stages plus the CPU copy of the std140 uniform block.
///
/// Values only flow host -> program; nothing is ever read back.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    interface: ShaderInterface,
    block: Vec<u8>,
    // descriptor binding -> texture unit
    sampler_units: BTreeMap<u32, u32>,
}

impl ShaderProgram {
    /// Links the given stage sources and checks that every name in
    /// `required` is present, failing on the first one that is not.
    pub fn link<S: AsRef<str>>(stages: &[&str], required: &[S]) -> Result<ShaderProgram, ShaderError> {
        let mut interface = ShaderInterface::default();
        for stage in stages {
            interface = interface.merge(ShaderInterface::parse(stage)?)?;
        }

        for name in required {
            if !interface.contains(name.as_ref()) {
                return Err(ShaderError::MissingUniform(name.as_ref().to_string()));
            }
        }

        info!(
            "shader program linked: {} block uniforms ({} bytes), {} samplers",
            interface.members.len(),
            interface.block_size,
            interface.samplers.len()
        );

        Ok(ShaderProgram {
            block: vec![0; interface.block_size],
            interface,
            sampler_units: BTreeMap::new(),
        })
    }

    pub fn interface(&self) -> &ShaderInterface {
        &self.interface
    }

    /// The std140 uniform block as it should be uploaded.
    pub fn block_bytes(&self) -> &[u8] {
        &self.block
    }

    /// Texture unit assigned to each sampler binding this frame.
    pub fn sampler_units(&self) -> &BTreeMap<u32, u32> {
        &self.sampler_units
    }
}

impl UniformSink for ShaderProgram {
    fn begin_frame(&mut self) {
        self.sampler_units.clear();
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        if let Some(&binding) = self.interface.samplers.get(name) {
            return match value {
                UniformValue::Int(unit) if unit >= 0 => {
                    self.sampler_units.insert(binding, unit as u32);
                    Ok(())
                }
                other => Err(UniformError::TypeMismatch {
                    name: name.to_string(),
                    expected: UniformType::Sampler2D,
                    found: other.uniform_type(),
                }),
            };
        }

        let member = self
            .interface
            .members
            .get(name)
            .ok_or_else(|| UniformError::Unknown(name.to_string()))?;
        if member.ty != value.uniform_type() {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: member.ty,
                found: value.uniform_type(),
            });
        }
        debug!("uniform {} @{} = {:?}", name, member.offset, value);
        value.write_std140(&mut self.block, member.offset);
        Ok(())
    }

    fn array_capacity(&self, name: &str) -> Option<usize> {
        self.interface.arrays.get(name).copied()
    }
}
