//! Middle-Out (`MO_ZLIB`) branch: block-local phrase dictionary, token
//! rewrite, then zlib.
//!
//! # Payload layout (big-endian)
//! ```text
//! entry_count  u16
//! entries      entry_count × [ token u8 | phrase_len u16 | phrase ]
//! comp_len     u32
//! comp         zlib(token_stream), comp_len bytes
//! ```
//!
//! Only entries the token stream actually references are written.  Token
//! numbers keep their rank-order assignment, so the emitted tokens may have
//! gaps.  Nothing is shared between blocks: the dictionary is built, used
//! and dropped inside one [`encode`] call.

pub mod dictionary;
pub mod tokens;

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use crate::codec::{BranchId, CodecError, ZlibCodec};
use crate::wire::{SliceReader, Truncated};
use dictionary::{Dictionary, DictionaryEntry, MAX_TOKENS, TOKEN_LITERAL};

pub use dictionary::{find_candidates, Candidate, MAX_PHRASE_LEN, MIN_PHRASE_LEN};

/// Default bound on dictionary entries per block.
pub const DEFAULT_MAX_ENTRIES: usize = 200;

fn truncated(what: &'static str) -> impl Fn(Truncated) -> CodecError {
    move |t| {
        CodecError::MoPayload(format!(
            "truncated {what}: need {} bytes at offset {}, {} available",
            t.needed, t.offset, t.available
        ))
    }
}

/// Encode one block as an MO_ZLIB payload.
pub fn encode(block: &[u8], max_entries: usize, level: u32) -> Result<Vec<u8>, CodecError> {
    let mut dict = Dictionary::build(block, max_entries);
    let stream = tokens::tokenize(block, &dict);
    dict.retain_used(&stream.used);

    let compressed = ZlibCodec::deflate(&stream.bytes, level).map_err(|e| {
        CodecError::Compression { branch: BranchId::MoZlib, reason: e.to_string() }
    })?;
    let comp_len = u32::try_from(compressed.len()).map_err(|_| CodecError::Compression {
        branch: BranchId::MoZlib,
        reason: format!("token stream compressed to {} bytes", compressed.len()),
    })?;

    let dict_bytes: usize = dict.entries().iter().map(|e| 3 + e.phrase.len()).sum();
    let mut out = Vec::with_capacity(2 + dict_bytes + 4 + compressed.len());
    out.write_u16::<BigEndian>(dict.len() as u16)?;
    for entry in dict.entries() {
        out.write_u8(entry.token)?;
        out.write_u16::<BigEndian>(entry.phrase.len() as u16)?;
        out.write_all(entry.phrase)?;
    }
    out.write_u32::<BigEndian>(comp_len)?;
    out.write_all(&compressed)?;
    Ok(out)
}

/// Parse the dictionary section of a payload and return it with the
/// remaining compressed token stream.
fn parse(payload: &[u8]) -> Result<(Dictionary<'_>, &[u8]), CodecError> {
    let mut r = SliceReader::new(payload);

    let count = r.read_u16().map_err(truncated("entry count"))? as usize;
    if count > MAX_TOKENS {
        return Err(CodecError::MoPayload(format!(
            "entry count {count} exceeds token space {MAX_TOKENS}"
        )));
    }

    let mut seen = [false; 256];
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let token = r.read_u8().map_err(truncated("entry token"))?;
        if token == TOKEN_LITERAL {
            return Err(CodecError::MoPayload("entry uses the literal escape token 0".into()));
        }
        if std::mem::replace(&mut seen[token as usize], true) {
            return Err(CodecError::MoPayload(format!("token {token} defined twice")));
        }
        let len = r.read_u16().map_err(truncated("phrase length"))? as usize;
        if len == 0 {
            return Err(CodecError::MoPayload(format!("token {token} has an empty phrase")));
        }
        let phrase = r.take(len).map_err(truncated("phrase"))?;
        entries.push(DictionaryEntry { token, phrase });
    }

    let comp_len = r.read_u32().map_err(truncated("compressed length"))? as usize;
    let comp = r.take(comp_len).map_err(truncated("compressed token stream"))?;
    if r.remaining() != 0 {
        return Err(CodecError::MoPayload(format!(
            "{} trailing bytes after token stream",
            r.remaining()
        )));
    }

    Ok((Dictionary::from_entries(entries), comp))
}

/// Decode an MO_ZLIB payload.  Output is capped just above `expected_len`.
pub fn decode(payload: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    let (dict, comp) = parse(payload)?;
    // Worst case every byte is an escaped literal.
    let stream_bound = expected_len.saturating_mul(2);
    let stream = ZlibCodec::inflate(comp, stream_bound).map_err(|e| {
        CodecError::Decompression { branch: BranchId::MoZlib, reason: e.to_string() }
    })?;
    tokens::expand(&stream, &dict.phrase_table(), expected_len)
}
