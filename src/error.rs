//! Error taxonomy for the RWV1 engine.
//!
//! Every failure is fail-closed: the current operation is aborted and one of
//! the variants below is returned.  Nothing is repaired or defaulted.
//!
//! | Kind        | Raised by                                        |
//! |-------------|--------------------------------------------------|
//! | `Format`    | container framing (header, records, trailing data) |
//! | `Integrity` | digest mismatch, length mismatch, corrupt payload  |
//! | `Config`    | [`RaceConfig::validate`](crate::config::RaceConfig::validate) / capability resolution |
//! | `Codec`     | a branch encoder failing during compression       |

use std::io;
use thiserror::Error;

use crate::codec::{BranchId, CodecError};

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("invalid magic {found:02x?}, expected \"RWV1\"")]
    InvalidMagic { found: [u8; 4] },
    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),
    #[error("reserved flag bits set: {0:#04x}")]
    ReservedFlags(u8),
    #[error("block size 0 in header")]
    ZeroBlockSize,
    #[error("truncated {what}: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        what:      &'static str,
        offset:    usize,
        needed:    usize,
        available: usize,
    },
    #[error("block {index}: branch id {id} unknown")]
    UnknownBranch { index: u32, id: u8 },
    #[error("block {index}: raw length {raw_len} exceeds block size {block_size}")]
    BlockTooLarge { index: u32, raw_len: u32, block_size: u32 },
    #[error("block {index}: raw length {raw_len} is short of block size {block_size} but is not the last block")]
    ShortBlock { index: u32, raw_len: u32, block_size: u32 },
    #[error("{0} trailing bytes after the last block record")]
    TrailingData(usize),
    #[error("{0} blocks exceed the u32 block count field")]
    TooManyBlocks(usize),
}

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("digest mismatch: stored {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("block {index}: decoded {actual} bytes, header declares {expected}")]
    LengthMismatch { index: u32, expected: u32, actual: usize },
    #[error("block {index} ({branch}): payload rejected: {source}")]
    CorruptPayload {
        index:  u32,
        branch: BranchId,
        #[source]
        source: CodecError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("block size {0} out of range (1..={max})", max = crate::config::MAX_BLOCK_SIZE)]
    BlockSize(u32),
    #[error("no enabled branches")]
    NoBranches,
    #[error("no enabled branch is available in this build (requested: {requested})")]
    NoAvailableBranches { requested: String },
    #[error("{name} {value} out of range ({min}..={max})")]
    OutOfRange { name: &'static str, value: u32, min: u32, max: u32 },
    #[error("lzma_preset {0} not supported; only the default preset {def} is available", def = crate::config::DEFAULT_LZMA_PRESET)]
    LzmaPreset(u32),
    #[error("mo_max_entries must be at least 1")]
    MoMaxEntries,
    #[error("unknown branch name '{0}'")]
    UnknownBranchName(String),
    #[error("config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level error returned by every public engine operation.
#[derive(Error, Debug)]
pub enum RwvError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RwvError {
    /// Short kind label used by the CLI (`format`, `integrity`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            RwvError::Format(_)    => "format",
            RwvError::Integrity(_) => "integrity",
            RwvError::Config(_)    => "configuration",
            RwvError::Codec(_)     => "codec",
            RwvError::Io(_)        => "io",
        }
    }

    /// The wrapped error, without the kind prefix.
    pub fn detail(&self) -> &dyn std::fmt::Display {
        match self {
            RwvError::Format(e)    => e,
            RwvError::Integrity(e) => e,
            RwvError::Config(e)    => e,
            RwvError::Codec(e)     => e,
            RwvError::Io(e)        => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, RwvError>;
