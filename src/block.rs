//! Block records: one compressed unit of the stream.
//!
//! ```text
//! branch_id    u8      0=ZLIB 1=MO_ZLIB 2=BZ2 3=LZMA
//! raw_len      u32 BE  uncompressed length
//! payload_len  u32 BE
//! payload      payload_len bytes, opaque to the container
//! ```

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::codec::{get_codec, BranchId};
use crate::error::{FormatError, IntegrityError, RwvError};
use crate::header::truncated;
use crate::wire::SliceReader;

pub const RECORD_HEADER_LEN: usize = 9;

/// Owned block record, as produced by the race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub branch:  BranchId,
    pub raw_len: u32,
    pub payload: Vec<u8>,
}

impl BlockRecord {
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + self.payload.len()
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "block payload exceeds u32 length")
        })?;
        writer.write_u8(self.branch.as_u8())?;
        writer.write_u32::<BigEndian>(self.raw_len)?;
        writer.write_u32::<BigEndian>(payload_len)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    pub fn view(&self) -> RecordRef<'_> {
        RecordRef { branch: self.branch, raw_len: self.raw_len, payload: &self.payload }
    }
}

/// Borrowed view of a record inside a container buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef<'a> {
    pub branch:  BranchId,
    pub raw_len: u32,
    pub payload: &'a [u8],
}

impl<'a> RecordRef<'a> {
    /// Read one record.  `index` is used only for error reporting.
    pub fn read(reader: &mut SliceReader<'a>, index: u32) -> Result<Self, FormatError> {
        let id = reader.read_u8().map_err(truncated("block record header"))?;
        let branch = BranchId::from_u8(id).ok_or(FormatError::UnknownBranch { index, id })?;
        let raw_len = reader.read_u32().map_err(truncated("block record header"))?;
        let payload_len = reader.read_u32().map_err(truncated("block record header"))?;
        let payload = reader
            .take(payload_len as usize)
            .map_err(truncated("block payload"))?;
        Ok(Self { branch, raw_len, payload })
    }

    /// Dispatch the payload to its branch decoder and enforce `raw_len`.
    pub fn decode(&self, index: u32) -> Result<Vec<u8>, RwvError> {
        let codec = get_codec(self.branch)?;
        let data = codec
            .decompress(self.payload, self.raw_len as usize)
            .map_err(|source| IntegrityError::CorruptPayload {
                index,
                branch: self.branch,
                source,
            })?;
        if data.len() != self.raw_len as usize {
            return Err(IntegrityError::LengthMismatch {
                index,
                expected: self.raw_len,
                actual:   data.len(),
            }
            .into());
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ZlibCodec;
    use crate::codec::Codec;

    #[test]
    fn record_layout() {
        let rec = BlockRecord { branch: BranchId::Bz2, raw_len: 258, payload: vec![9, 8, 7] };
        let mut buf = Vec::new();
        rec.write(&mut buf).unwrap();
        assert_eq!(buf, vec![2, 0, 0, 1, 2, 0, 0, 0, 3, 9, 8, 7]);
        assert_eq!(buf.len(), rec.encoded_len());

        let mut r = SliceReader::new(&buf);
        assert_eq!(RecordRef::read(&mut r, 0).unwrap(), rec.view());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn unknown_branch_is_rejected() {
        let buf = [9u8, 0, 0, 0, 1, 0, 0, 0, 1, 0xaa];
        let err = RecordRef::read(&mut SliceReader::new(&buf), 4).unwrap_err();
        assert!(matches!(err, FormatError::UnknownBranch { index: 4, id: 9 }));
    }

    #[test]
    fn short_payload_is_rejected() {
        let buf = [0u8, 0, 0, 0, 5, 0, 0, 0, 10, 1, 2, 3];
        let err = RecordRef::read(&mut SliceReader::new(&buf), 0).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { what: "block payload", needed: 10, available: 3, .. }));
    }

    #[test]
    fn decoded_length_must_match() {
        let payload = ZlibCodec.compress(b"twelve bytes", 6).unwrap();
        let rec = RecordRef { branch: BranchId::Zlib, raw_len: 11, payload: &payload };
        assert!(matches!(
            rec.decode(0),
            Err(RwvError::Integrity(IntegrityError::LengthMismatch { expected: 11, actual: 12, .. }))
        ));
        let rec = RecordRef { raw_len: 12, ..rec };
        assert_eq!(rec.decode(0).unwrap(), b"twelve bytes");
    }
}
