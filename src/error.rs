use thiserror::Error;

use crate::shaders::{ResourceKind, Visibility};

/// failures reading or writing the binary shader asset format
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("buffer too small for header: {len} bytes, need {header_size}")]
    TooSmall { len: usize, header_size: usize },

    #[error("invalid magic number: expected {expected:#x}, got {found:#x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported version {found} (current: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("corrupted asset: header describes {declared} bytes but buffer holds {actual}")]
    Truncated { declared: u64, actual: usize },

    #[error("binding record {index}: invalid {field} value {value}")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: u32,
    },

    #[error("too many bindings for one asset: {count}")]
    TooManyBindings { count: usize },

    #[error("shader code too large for one asset: {size} bytes")]
    CodeTooLarge { size: usize },

    #[error("entry point name '{name}' does not fit in {max} bytes")]
    NameTooLong { name: String, max: usize },
}

/// a binding list that cannot form a valid reflection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReflectionError {
    #[error("binding '{name}' uses set {set}, but only {max} bind groups are supported")]
    SetOutOfRange { name: String, set: u32, max: usize },

    #[error("set {set} slot {slot} is declared twice ('{first}' and '{second}')")]
    DuplicateBinding {
        set: u32,
        slot: u32,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error(
        "binding conflict at set {set} slot {slot}: declared as {first:?} and as {second:?}"
    )]
    BindingConflict {
        set: u32,
        slot: u32,
        first: ResourceKind,
        second: ResourceKind,
    },

    #[error("array size conflict at set {set} slot {slot}: {first} and {second} descriptors")]
    CountConflict {
        set: u32,
        slot: u32,
        first: u32,
        second: u32,
    },

    #[error("cannot merge two shaders that share stages: {0}")]
    StageOverlap(Visibility),

    #[error(transparent)]
    Reflection(#[from] ReflectionError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("layout entries must be sorted by slot: slot {previous} is followed by slot {next}")]
    UnsortedEntries { previous: u32, next: u32 },

    #[error("no shader registered for handle {0}")]
    UnknownShader(usize),

    #[error("render pipeline needs a {0} stage module")]
    MissingStage(&'static str),

    #[error("shader asset has no single entry stage: {0}")]
    UnknownStage(Visibility),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Reflection(#[from] ReflectionError),

    #[error(transparent)]
    Device(#[from] anyhow::Error),
}

/// failures turning slang source into a shader asset
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to create the slang global session")]
    InitFailed,

    #[error("shader source '{path}' does not exist")]
    Io { path: String },

    #[error("entry point '{entry_point}' not found in '{module}'")]
    EntryPointNotFound { entry_point: String, module: String },

    #[error("slang compilation failed:\n{0}")]
    CompilationFailed(String),

    #[error("entry point '{entry_point}' has an unsupported stage: {stage}")]
    UnsupportedStage { entry_point: String, stage: String },

    #[error(transparent)]
    Reflection(#[from] ReflectionError),
}

/// reading, decoding and registering a shader file
#[derive(Debug, Error)]
pub enum ShaderLoadError {
    #[error("failed to read shader asset '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse shader asset '{path}'")]
    Format {
        path: String,
        #[source]
        source: FormatError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}
