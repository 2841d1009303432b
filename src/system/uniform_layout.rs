//! GLSL uniform interface introspection.
//!
//! Vulkan has no name-based uniform lookup, so the program reads its own
//! GLSL sources: the single uniform block is flattened into dotted/indexed
//! paths (`pointLights[1].color`) with std140 offsets, and every
//! `sampler2D` is recorded with its binding.

use std::collections::BTreeMap;

use cgmath::{Matrix3, Matrix4, Vector3};
use lazy_static::lazy_static;
use regex::Regex;

use super::error::ShaderError;

lazy_static! {
    static ref DEFINE: Regex = Regex::new(r"(?m)^\s*#\s*define\s+(\w+)\s+(\d+)\s*$").unwrap();
    static ref STRUCT: Regex = Regex::new(r"struct\s+(\w+)\s*\{([^}]*)\}\s*;").unwrap();
    static ref UNIFORM_BLOCK: Regex =
        Regex::new(r"layout\s*\(([^)]*)\)\s*uniform\s+(\w+)\s*\{([^}]*)\}\s*(\w+)?\s*;").unwrap();
    static ref SAMPLER: Regex = Regex::new(r"layout\s*\(([^)]*)\)\s*uniform\s+sampler2D\s+(\w+)\s*;").unwrap();
    static ref DECLARATION: Regex = Regex::new(r"^(?:(?:highp|mediump|lowp)\s+)?(\w+)\s+(.+)$").unwrap();
    static ref DECLARATOR: Regex = Regex::new(r"^(\w+)\s*(?:\[\s*(\w+)\s*\])?$").unwrap();
    static ref BINDING: Regex = Regex::new(r"binding\s*=\s*(\d+)").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    static ref LINE_COMMENT: Regex = Regex::new(r"//[^\n]*").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
}

impl UniformType {
    fn from_glsl(name: &str) -> Option<UniformType> {
        match name {
            "int" => Some(UniformType::Int),
            "float" => Some(UniformType::Float),
            "vec2" => Some(UniformType::Vec2),
            "vec3" => Some(UniformType::Vec3),
            "vec4" => Some(UniformType::Vec4),
            "mat3" => Some(UniformType::Mat3),
            "mat4" => Some(UniformType::Mat4),
            "sampler2D" => Some(UniformType::Sampler2D),
            _ => None,
        }
    }

    /// std140 base alignment and size in bytes.
    fn std140(self) -> Option<(usize, usize)> {
        match self {
            UniformType::Int | UniformType::Float => Some((4, 4)),
            UniformType::Vec2 => Some((8, 8)),
            UniformType::Vec3 => Some((16, 12)),
            UniformType::Vec4 => Some((16, 16)),
            // matrices are arrays of column vectors, each padded to a vec4
            UniformType::Mat3 => Some((16, 48)),
            UniformType::Mat4 => Some((16, 64)),
            UniformType::Sampler2D => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn uniform_type(&self) -> UniformType {
        match self {
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes the value into a std140 block at `offset`.
    pub fn write_std140(&self, buffer: &mut [u8], offset: usize) {
        let mut put = |at: usize, bytes: &[u8]| {
            buffer[offset + at..offset + at + bytes.len()].copy_from_slice(bytes);
        };
        match self {
            UniformValue::Int(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Float(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => put(0, bytemuck::bytes_of(v)),
            UniformValue::Mat3(columns) => {
                for (i, column) in columns.iter().enumerate() {
                    put(16 * i, bytemuck::bytes_of(column));
                }
            }
            UniformValue::Mat4(v) => put(0, bytemuck::bytes_of(v)),
        }
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(m: Matrix3<f32>) -> Self {
        UniformValue::Mat3(m.into())
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(m: Matrix4<f32>) -> Self {
        UniformValue::Mat4(m.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMember {
    pub ty: UniformType,
    pub offset: usize,
}

/// Flattened uniform interface of one shader stage, or of a linked program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderInterface {
    pub members: BTreeMap<String, BlockMember>,
    /// Declared length of every array, keyed by its path (`pointLights`).
    pub arrays: BTreeMap<String, usize>,
    /// `sampler2D` name -> descriptor binding.
    pub samplers: BTreeMap<String, u32>,
    pub block_binding: Option<u32>,
    pub block_size: usize,
}

#[derive(Clone, Debug)]
enum FieldType {
    Basic(UniformType),
    Struct(String),
}

#[derive(Clone, Debug)]
struct Field {
    name: String,
    ty: FieldType,
    array_len: Option<usize>,
}

struct Parser {
    defines: BTreeMap<String, usize>,
    structs: BTreeMap<String, Vec<Field>>,
}

impl ShaderInterface {
    pub fn parse(source: &str) -> Result<ShaderInterface, ShaderError> {
        let source = strip_comments(source);
        let mut parser = Parser {
            defines: BTreeMap::new(),
            structs: BTreeMap::new(),
        };

        for caps in DEFINE.captures_iter(&source) {
            let value = caps[2]
                .parse::<usize>()
                .map_err(|_| ShaderError::Parse(format!("bad #define {}", &caps[1])))?;
            parser.defines.insert(caps[1].to_string(), value);
        }

        for caps in STRUCT.captures_iter(&source) {
            let fields = parser.fields(&caps[2])?;
            parser.structs.insert(caps[1].to_string(), fields);
        }

        let mut interface = ShaderInterface::default();

        let mut blocks = UNIFORM_BLOCK.captures_iter(&source);
        if let Some(caps) = blocks.next() {
            interface.block_binding = Some(binding(&caps[1])?);
            let prefix = caps
                .get(4)
                .map(|instance| format!("{}.", instance.as_str()))
                .unwrap_or_default();

            let mut offset = 0;
            for field in parser.fields(&caps[3])? {
                let (align, size) = parser.member_layout(&field)?;
                offset = round_up(offset, align);
                parser.flatten(&field, offset, &prefix, &mut interface)?;
                offset += size;
            }
            interface.block_size = round_up(offset, 16);
        }
        if blocks.next().is_some() {
            return Err(ShaderError::Parse("only one uniform block is supported".into()));
        }

        for caps in SAMPLER.captures_iter(&source) {
            interface.samplers.insert(caps[2].to_string(), binding(&caps[1])?);
        }

        Ok(interface)
    }

    /// Combines two stages. A name declared by both must agree on type and offset.
    pub fn merge(mut self, other: ShaderInterface) -> Result<ShaderInterface, ShaderError> {
        for (name, member) in other.members {
            match self.members.get(&name) {
                Some(existing) if *existing != member => return Err(ShaderError::Mismatch(name)),
                Some(_) => {}
                None => {
                    self.members.insert(name, member);
                }
            }
        }
        for (name, binding) in other.samplers {
            match self.samplers.get(&name) {
                Some(existing) if *existing != binding => return Err(ShaderError::Mismatch(name)),
                _ => {
                    self.samplers.insert(name, binding);
                }
            }
        }
        for (name, len) in other.arrays {
            let entry = self.arrays.entry(name).or_insert(len);
            *entry = (*entry).max(len);
        }
        match (self.block_binding, other.block_binding) {
            (Some(a), Some(b)) if a != b => {
                return Err(ShaderError::Mismatch("uniform block binding".into()))
            }
            (None, b) => self.block_binding = b,
            _ => {}
        }
        self.block_size = self.block_size.max(other.block_size);
        Ok(self)
    }

    pub fn ty(&self, name: &str) -> Option<UniformType> {
        self.members
            .get(name)
            .map(|member| member.ty)
            .or_else(|| self.samplers.get(name).map(|_| UniformType::Sampler2D))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ty(name).is_some()
    }
}

impl Parser {
    fn fields(&self, body: &str) -> Result<Vec<Field>, ShaderError> {
        let mut fields = vec![];
        for statement in body.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let caps = DECLARATION
                .captures(statement)
                .ok_or_else(|| ShaderError::Parse(format!("bad declaration '{}'", statement)))?;
            let type_name = &caps[1];
            let ty = match UniformType::from_glsl(type_name) {
                Some(basic) => FieldType::Basic(basic),
                None if self.structs.contains_key(type_name) => FieldType::Struct(type_name.to_string()),
                None => return Err(ShaderError::UnknownType(type_name.to_string())),
            };

            for name in caps[2].split(',').map(str::trim) {
                let parts = DECLARATOR
                    .captures(name)
                    .ok_or_else(|| ShaderError::Parse(format!("bad declarator '{}'", name)))?;
                let array_len = parts
                    .get(2)
                    .map(|len| self.array_len(len.as_str()))
                    .transpose()?;
                fields.push(Field {
                    name: parts[1].to_string(),
                    ty: ty.clone(),
                    array_len,
                });
            }
        }
        Ok(fields)
    }

    fn array_len(&self, len: &str) -> Result<usize, ShaderError> {
        len.parse::<usize>()
            .ok()
            .or_else(|| self.defines.get(len).copied())
            .filter(|&n| n > 0)
            .ok_or_else(|| ShaderError::Parse(format!("bad array length '{}'", len)))
    }

    fn type_layout(&self, ty: &FieldType) -> Result<(usize, usize), ShaderError> {
        match ty {
            FieldType::Basic(basic) => basic
                .std140()
                .ok_or_else(|| ShaderError::Parse(format!("{:?} cannot live in a uniform block", basic))),
            FieldType::Struct(name) => {
                let mut offset = 0;
                let mut max_align = 0;
                for member in self.struct_fields(name)? {
                    let (align, size) = self.member_layout(member)?;
                    offset = round_up(offset, align) + size;
                    max_align = max_align.max(align);
                }
                let align = round_up(max_align, 16);
                Ok((align, round_up(offset, align)))
            }
        }
    }

    /// Alignment and total size of a member, arrays included.
    fn member_layout(&self, field: &Field) -> Result<(usize, usize), ShaderError> {
        let (align, size) = self.type_layout(&field.ty)?;
        match field.array_len {
            Some(len) => {
                let align = round_up(align, 16);
                Ok((align, round_up(size, align) * len))
            }
            None => Ok((align, size)),
        }
    }

    fn flatten(
        &self,
        field: &Field,
        offset: usize,
        prefix: &str,
        out: &mut ShaderInterface,
    ) -> Result<(), ShaderError> {
        let path = format!("{}{}", prefix, field.name);
        match field.array_len {
            Some(len) => {
                let (align, size) = self.type_layout(&field.ty)?;
                let stride = round_up(size, round_up(align, 16));
                for i in 0..len {
                    self.flatten_one(&field.ty, offset + i * stride, format!("{}[{}]", path, i), out)?;
                }
                out.arrays.insert(path, len);
                Ok(())
            }
            None => self.flatten_one(&field.ty, offset, path, out),
        }
    }

    fn flatten_one(
        &self,
        ty: &FieldType,
        offset: usize,
        path: String,
        out: &mut ShaderInterface,
    ) -> Result<(), ShaderError> {
        match ty {
            FieldType::Basic(basic) => {
                out.members.insert(path, BlockMember { ty: *basic, offset });
                Ok(())
            }
            FieldType::Struct(name) => {
                let prefix = format!("{}.", path);
                let mut member_offset = 0;
                for member in self.struct_fields(name)? {
                    let (align, size) = self.member_layout(member)?;
                    member_offset = round_up(member_offset, align);
                    self.flatten(member, offset + member_offset, &prefix, out)?;
                    member_offset += size;
                }
                Ok(())
            }
        }
    }

    fn struct_fields(&self, name: &str) -> Result<&Vec<Field>, ShaderError> {
        self.structs
            .get(name)
            .ok_or_else(|| ShaderError::UnknownType(name.to_string()))
    }
}

fn binding(qualifiers: &str) -> Result<u32, ShaderError> {
    BINDING
        .captures(qualifiers)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .ok_or_else(|| ShaderError::Parse(format!("missing binding in layout({})", qualifiers)))
}

fn strip_comments(source: &str) -> String {
    let source = BLOCK_COMMENT.replace_all(source, " ");
    LINE_COMMENT.replace_all(&source, "").into_owned()
}

fn round_up(value: usize, align: usize) -> usize {
    if align == 0 {
        return value;
    }
    (value + align - 1) / align * align
}
