//! RWV1 container: header, optional whole-stream digest, block records.
//!
//! Encoding races every block, then serialises header and records in input
//! order with no padding and no trailing data.  Decoding is fail-closed:
//! the framing is validated in full before any payload is touched, every
//! block must decode to exactly its declared length, and the digest (when
//! present) is checked against the reassembled stream last.

use std::io::Write;

use crate::block::{BlockRecord, RecordRef, RECORD_HEADER_LEN};
use crate::config::RacePlan;
use crate::error::{FormatError, Result};
use crate::header::Header;
use crate::integrity::{self, Digest};
use crate::race;
use crate::wire::SliceReader;

// ── Owned container (encode side) ────────────────────────────────────────────

/// A complete container.  Immutable once built; re-compressing produces a
/// new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub block_size: u32,
    pub digest:     Option<Digest>,
    pub blocks:     Vec<BlockRecord>,
}

impl Container {
    /// Race `data` block by block under `plan`.
    pub fn encode(data: &[u8], plan: &RacePlan) -> Result<Self> {
        let digest = plan.config().include_digest.then(|| integrity::digest(data));
        let blocks = race::race_blocks(data, plan)?;
        Ok(Self { block_size: plan.config().block_size, digest, blocks })
    }

    pub fn header(&self) -> Result<Header> {
        let block_count = u32::try_from(self.blocks.len())
            .map_err(|_| FormatError::TooManyBlocks(self.blocks.len()))?;
        Ok(Header { block_size: self.block_size, block_count, digest: self.digest })
    }

    pub fn encoded_len(&self) -> Result<usize> {
        let records: usize = self.blocks.iter().map(BlockRecord::encoded_len).sum();
        Ok(self.header()?.encoded_len() + records)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        self.header()?.write(&mut writer)?;
        for block in &self.blocks {
            block.write(&mut writer)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len()?);
        self.write(&mut out)?;
        Ok(out)
    }
}

// ── Borrowed container (decode side) ─────────────────────────────────────────

/// A parsed container whose payloads borrow from the input buffer.
#[derive(Debug, Clone)]
pub struct ContainerView<'a> {
    pub header: Header,
    pub blocks: Vec<RecordRef<'a>>,
}

impl<'a> ContainerView<'a> {
    /// Validate the framing of `bytes` without decompressing anything.
    pub fn parse(bytes: &'a [u8]) -> std::result::Result<Self, FormatError> {
        let mut reader = SliceReader::new(bytes);
        let header = Header::read(&mut reader)?;
        let count = header.block_count;

        // `block_count` is untrusted; every record needs at least 9 bytes.
        let mut blocks =
            Vec::with_capacity((count as usize).min(reader.remaining() / RECORD_HEADER_LEN));
        for index in 0..count {
            let rec = RecordRef::read(&mut reader, index)?;
            if rec.raw_len > header.block_size {
                return Err(FormatError::BlockTooLarge {
                    index,
                    raw_len:    rec.raw_len,
                    block_size: header.block_size,
                });
            }
            if index + 1 < count && rec.raw_len != header.block_size {
                return Err(FormatError::ShortBlock {
                    index,
                    raw_len:    rec.raw_len,
                    block_size: header.block_size,
                });
            }
            blocks.push(rec);
        }

        if reader.remaining() != 0 {
            return Err(FormatError::TrailingData(reader.remaining()));
        }
        Ok(Self { header, blocks })
    }

    /// Decode every block in order and verify the digest if present.
    pub fn decode(&self) -> Result<Vec<u8>> {
        #[cfg(feature = "parallel")]
        let pieces: Vec<Result<Vec<u8>>> = {
            use rayon::prelude::*;
            self.blocks
                .par_iter()
                .enumerate()
                .map(|(index, rec)| rec.decode(index as u32))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let pieces: Vec<Result<Vec<u8>>> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(index, rec)| rec.decode(index as u32))
            .collect();

        let mut out = Vec::new();
        for piece in pieces {
            out.extend_from_slice(&piece?);
        }

        if let Some(expected) = &self.header.digest {
            integrity::verify(expected, &out)?;
        }
        Ok(out)
    }
}

/// Parse and decode a container in one step.
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>> {
    ContainerView::parse(bytes)?.decode()
}
