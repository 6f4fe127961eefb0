//! Branch codecs: the four closed compression strategies a block can race.
//!
//! # Identity rules
//! Every branch is identified on disk by a single byte.  The mapping is
//! frozen:
//!
//! | id | branch    | backend                                   |
//! |----|-----------|-------------------------------------------|
//! | 0  | `ZLIB`    | zlib stream (flate2)                      |
//! | 1  | `MO_ZLIB` | block-local phrase dictionary + zlib      |
//! | 2  | `BZ2`     | bzip2 (cargo feature `bzip2`)             |
//! | 3  | `LZMA`    | xz stream (cargo feature `lzma`)          |
//!
//! The numeric order doubles as the race precedence: when two payloads tie
//! on size, the lower id wins.  An id outside `0..=3` is never resolved to a
//! codec; the container layer rejects it.

use std::fmt;
use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mo;

/// Number of branches defined by the RWV1 format.
pub const BRANCH_COUNT: usize = 4;

/// Upper bound on speculative output preallocation while decoding.
const PREALLOC_CAP: usize = 4 * 1024 * 1024;

// ── BranchId ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum BranchId {
    Zlib   = 0,
    MoZlib = 1,
    Bz2    = 2,
    Lzma   = 3,
}

impl BranchId {
    /// All branches in precedence order.
    pub const ALL: [BranchId; BRANCH_COUNT] =
        [BranchId::Zlib, BranchId::MoZlib, BranchId::Bz2, BranchId::Lzma];

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Resolve an on-disk id.  Returns `None` for ids this format does not define.
    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(BranchId::Zlib),
            1 => Some(BranchId::MoZlib),
            2 => Some(BranchId::Bz2),
            3 => Some(BranchId::Lzma),
            _ => None,
        }
    }

    /// Canonical name (diagnostics and config files).
    pub fn name(self) -> &'static str {
        match self {
            BranchId::Zlib   => "ZLIB",
            BranchId::MoZlib => "MO_ZLIB",
            BranchId::Bz2    => "BZ2",
            BranchId::Lzma   => "LZMA",
        }
    }

    /// Parse from a CLI string (case-insensitive, a few aliases accepted).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zlib" | "deflate"              => Some(BranchId::Zlib),
            "mo_zlib" | "mo-zlib" | "mo"    => Some(BranchId::MoZlib),
            "bz2" | "bzip2"                 => Some(BranchId::Bz2),
            "lzma" | "xz"                   => Some(BranchId::Lzma),
            _                               => None,
        }
    }

    /// Whether the backend for this branch was compiled into this build.
    pub fn is_compiled_in(self) -> bool {
        match self {
            BranchId::Zlib | BranchId::MoZlib => true,
            BranchId::Bz2  => cfg!(feature = "bzip2"),
            BranchId::Lzma => cfg!(feature = "lzma"),
        }
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{branch} compression failed: {reason}")]
    Compression { branch: BranchId, reason: String },
    #[error("{branch} decompression failed: {reason}")]
    Decompression { branch: BranchId, reason: String },
    /// The backend for this branch is not compiled into this build.
    #[error("branch {0} is not available in this build")]
    UnavailableBranch(BranchId),
    #[error("malformed MO payload: {0}")]
    MoPayload(String),
    #[error("MO token {0} has no dictionary entry")]
    UnknownToken(u8),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// Uniform byte-to-byte adapter over one branch backend.
///
/// `decompress` reads at most `expected_len + 1` bytes of output so a hostile
/// payload cannot inflate without bound; the caller compares the returned
/// length against `expected_len`.
pub trait Codec: Send + Sync {
    fn branch(&self) -> BranchId;
    fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError>;
}

fn read_bounded<R: Read>(reader: R, expected_len: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len.min(PREALLOC_CAP));
    reader.take(expected_len as u64 + 1).read_to_end(&mut out)?;
    Ok(out)
}

// ── Built-in codec implementations ──────────────────────────────────────────

/// zlib-wrapped deflate.  Levels are clamped to 1..=9.
pub struct ZlibCodec;

impl ZlibCodec {
    pub(crate) fn deflate(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
        let mut enc = ZlibEncoder::new(
            Vec::with_capacity(data.len() / 2 + 64),
            Compression::new(level.clamp(1, 9)),
        );
        enc.write_all(data)?;
        enc.finish()
    }

    pub(crate) fn inflate(data: &[u8], bound: usize) -> io::Result<Vec<u8>> {
        read_bounded(ZlibDecoder::new(data), bound)
    }
}

impl Codec for ZlibCodec {
    fn branch(&self) -> BranchId { BranchId::Zlib }
    fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>, CodecError> {
        Self::deflate(data, level).map_err(|e| CodecError::Compression {
            branch: BranchId::Zlib,
            reason: e.to_string(),
        })
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        Self::inflate(data, expected_len).map_err(|e| CodecError::Decompression {
            branch: BranchId::Zlib,
            reason: e.to_string(),
        })
    }
}

/// Middle-Out: block-local phrase dictionary, token rewrite, then zlib.
pub struct MoZlibCodec {
    pub max_entries: usize,
}

impl Default for MoZlibCodec {
    fn default() -> Self {
        Self { max_entries: mo::DEFAULT_MAX_ENTRIES }
    }
}

impl Codec for MoZlibCodec {
    fn branch(&self) -> BranchId { BranchId::MoZlib }
    fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>, CodecError> {
        mo::encode(data, self.max_entries, level)
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        mo::decode(data, expected_len)
    }
}

#[cfg(feature = "bzip2")]
pub struct Bzip2Codec;

#[cfg(feature = "bzip2")]
impl Codec for Bzip2Codec {
    fn branch(&self) -> BranchId { BranchId::Bz2 }
    fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>, CodecError> {
        let err = |e: io::Error| CodecError::Compression {
            branch: BranchId::Bz2,
            reason: e.to_string(),
        };
        let mut enc = bzip2::write::BzEncoder::new(
            Vec::with_capacity(data.len() / 2 + 64),
            bzip2::Compression::new(level.clamp(1, 9)),
        );
        enc.write_all(data).map_err(err)?;
        enc.finish().map_err(err)
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        read_bounded(bzip2::read::BzDecoder::new(data), expected_len).map_err(|e| {
            CodecError::Decompression { branch: BranchId::Bz2, reason: e.to_string() }
        })
    }
}

/// xz stream (LZMA2 with CRC-protected stream and block headers).
///
/// lzma-rs exposes no preset knob; the config layer only accepts the
/// default preset, so `level` carries no information here.
#[cfg(feature = "lzma")]
pub struct LzmaCodec;

#[cfg(feature = "lzma")]
impl Codec for LzmaCodec {
    fn branch(&self) -> BranchId { BranchId::Lzma }
    fn compress(&self, data: &[u8], _: u32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::xz_compress(&mut io::Cursor::new(data), &mut out).map_err(|e| {
            CodecError::Compression { branch: BranchId::Lzma, reason: e.to_string() }
        })?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = BoundedWriter {
            buf:   Vec::with_capacity(expected_len.min(PREALLOC_CAP)),
            limit: expected_len.saturating_add(1),
        };
        lzma_rs::xz_decompress(&mut io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Decompression { branch: BranchId::Lzma, reason: e.to_string() })?;
        Ok(out.buf)
    }
}

/// Write sink that refuses to grow past `limit` bytes.
#[cfg(feature = "lzma")]
struct BoundedWriter {
    buf:   Vec<u8>,
    limit: usize,
}

#[cfg(feature = "lzma")]
impl Write for BoundedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "output exceeds declared length"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a branch to its codec with default parameters.
///
/// Returns `Err(CodecError::UnavailableBranch)` when the backend was not
/// compiled in.  The caller MUST NOT substitute another branch.
pub fn get_codec(id: BranchId) -> Result<Box<dyn Codec>, CodecError> {
    match id {
        BranchId::Zlib   => Ok(Box::new(ZlibCodec)),
        BranchId::MoZlib => Ok(Box::new(MoZlibCodec::default())),
        #[cfg(feature = "bzip2")]
        BranchId::Bz2    => Ok(Box::new(Bzip2Codec)),
        #[cfg(feature = "lzma")]
        BranchId::Lzma   => Ok(Box::new(LzmaCodec)),
        #[allow(unreachable_patterns)]
        other            => Err(CodecError::UnavailableBranch(other)),
    }
}
