use super::uniform_layout::UniformType;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ShaderError {
    #[error("cannot parse shader interface: {0}")]
    Parse(String),

    #[error("unknown GLSL type '{0}' in uniform interface")]
    UnknownType(String),

    #[error("uniform '{0}' is declared differently by two shader stages")]
    Mismatch(String),

    #[error("linked program has no uniform named '{0}'")]
    MissingUniform(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UniformError {
    #[error("no active uniform named '{0}'")]
    Unknown(String),

    #[error("uniform '{name}' has type {expected:?}, cannot set a {found:?}")]
    TypeMismatch {
        name: String,
        expected: UniformType,
        found: UniformType,
    },
}
