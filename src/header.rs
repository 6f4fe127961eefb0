//! RWV1 container header.
//!
//! ```text
//! offset  size  field
//!  0       4    magic "RWV1"
//!  4       1    version = 1
//!  5       1    flags (bit0 = digest present, bits 1-7 reserved = 0)
//!  6       4    block_size  u32 BE
//! 10       4    block_count u32 BE
//! 14      32    SHA-256 of the uncompressed stream, only if flags bit0
//! ```

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::error::FormatError;
use crate::integrity::{Digest, DIGEST_LEN};
use crate::wire::{SliceReader, Truncated};

pub const MAGIC: &[u8; 4] = b"RWV1";
pub const VERSION: u8 = 1;
/// Fixed part of the header, before the optional digest.
pub const HEADER_LEN: usize = 14;

pub const FLAG_DIGEST: u8 = 0x01;
const FLAGS_RESERVED: u8 = !FLAG_DIGEST;

pub(crate) fn truncated(what: &'static str) -> impl Fn(Truncated) -> FormatError {
    move |t| FormatError::Truncated {
        what,
        offset:    t.offset,
        needed:    t.needed,
        available: t.available,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub block_size:  u32,
    pub block_count: u32,
    pub digest:      Option<Digest>,
}

impl Header {
    pub fn flags(&self) -> u8 {
        if self.digest.is_some() { FLAG_DIGEST } else { 0 }
    }

    /// Encoded length including the optional digest.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + if self.digest.is_some() { DIGEST_LEN } else { 0 }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u8(VERSION)?;
        writer.write_u8(self.flags())?;
        writer.write_u32::<BigEndian>(self.block_size)?;
        writer.write_u32::<BigEndian>(self.block_count)?;
        if let Some(digest) = &self.digest {
            writer.write_all(digest)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut SliceReader<'_>) -> Result<Self, FormatError> {
        let magic: [u8; 4] = reader.read_array().map_err(truncated("magic"))?;
        if &magic != MAGIC {
            return Err(FormatError::InvalidMagic { found: magic });
        }
        let version = reader.read_u8().map_err(truncated("version"))?;
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let flags = reader.read_u8().map_err(truncated("flags"))?;
        if flags & FLAGS_RESERVED != 0 {
            return Err(FormatError::ReservedFlags(flags));
        }
        let block_size = reader.read_u32().map_err(truncated("block size"))?;
        if block_size == 0 {
            return Err(FormatError::ZeroBlockSize);
        }
        let block_count = reader.read_u32().map_err(truncated("block count"))?;
        let digest = if flags & FLAG_DIGEST != 0 {
            Some(reader.read_array::<DIGEST_LEN>().map_err(truncated("digest"))?)
        } else {
            None
        };
        Ok(Self { block_size, block_count, digest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(h: &Header) -> Vec<u8> {
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn layout_without_digest() {
        let h = Header { block_size: 0x0010_0000, block_count: 3, digest: None };
        let bytes = encode(&h);
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], b"RWV1");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 0);
        assert_eq!(&bytes[6..10], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(&bytes[10..14], &[0, 0, 0, 3]);
        let back = Header::read(&mut SliceReader::new(&bytes)).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn digest_follows_fixed_header() {
        let h = Header { block_size: 1024, block_count: 0, digest: Some([0xab; 32]) };
        let bytes = encode(&h);
        assert_eq!(bytes.len(), h.encoded_len());
        assert_eq!(bytes[5], FLAG_DIGEST);
        assert_eq!(&bytes[14..], &[0xab; 32]);
        assert_eq!(Header::read(&mut SliceReader::new(&bytes)).unwrap(), h);
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = encode(&Header { block_size: 1, block_count: 0, digest: None });
        bytes[4] = 2;
        assert!(matches!(
            Header::read(&mut SliceReader::new(&bytes)),
            Err(FormatError::UnsupportedVersion(2))
        ));
        bytes[0] = b'X';
        assert!(matches!(
            Header::read(&mut SliceReader::new(&bytes)),
            Err(FormatError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn rejects_reserved_flags() {
        let mut bytes = encode(&Header { block_size: 1, block_count: 0, digest: None });
        bytes[5] = 0x02;
        assert!(matches!(
            Header::read(&mut SliceReader::new(&bytes)),
            Err(FormatError::ReservedFlags(0x02))
        ));
    }

    #[test]
    fn truncated_digest_is_a_format_error() {
        let bytes = encode(&Header { block_size: 8, block_count: 0, digest: Some([1; 32]) });
        let err = Header::read(&mut SliceReader::new(&bytes[..30])).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { what: "digest", .. }));
    }
}
