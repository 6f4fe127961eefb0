//! Token-stream rewrite for the Middle-Out branch.
//!
//! Stream grammar, one item at a time:
//! ```text
//! 0x00 <byte>   literal byte
//! 0x01..=0xff   dictionary token, expands to its phrase
//! ```

use std::collections::HashMap;

use super::dictionary::{Dictionary, TOKEN_LITERAL};
use crate::codec::CodecError;

/// Output of [`tokenize`]: the stream plus which tokens it references.
#[derive(Debug, Clone)]
pub struct TokenStream {
    pub bytes: Vec<u8>,
    pub used:  [bool; 256],
}

/// Greedy longest-match rewrite of `block` against `dict`.
pub fn tokenize(block: &[u8], dict: &Dictionary<'_>) -> TokenStream {
    let mut used = [false; 256];

    if dict.is_empty() {
        let mut bytes = Vec::with_capacity(block.len() * 2);
        for &b in block {
            bytes.push(TOKEN_LITERAL);
            bytes.push(b);
        }
        return TokenStream { bytes, used };
    }

    let mut by_phrase: HashMap<&[u8], u8> = HashMap::with_capacity(dict.len());
    let mut lengths: Vec<usize> = Vec::new();
    let mut first_byte = [false; 256];
    for e in dict.entries() {
        by_phrase.insert(e.phrase, e.token);
        lengths.push(e.phrase.len());
        first_byte[e.phrase[0] as usize] = true;
    }
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    lengths.dedup();

    let mut bytes = Vec::with_capacity(block.len());
    let mut pos = 0usize;
    while pos < block.len() {
        let hit = if first_byte[block[pos] as usize] {
            lengths
                .iter()
                .filter(|&&len| pos + len <= block.len())
                .find_map(|&len| by_phrase.get(&block[pos..pos + len]).map(|&t| (t, len)))
        } else {
            None
        };

        match hit {
            Some((token, len)) => {
                bytes.push(token);
                used[token as usize] = true;
                pos += len;
            }
            None => {
                bytes.push(TOKEN_LITERAL);
                bytes.push(block[pos]);
                pos += 1;
            }
        }
    }

    TokenStream { bytes, used }
}

/// Expand a token stream back to raw bytes.
///
/// Expansion stops once the output exceeds `bound` bytes; the caller treats
/// any length other than the declared one as corruption.
pub fn expand(
    stream: &[u8],
    table:  &[Option<&[u8]>; 256],
    bound:  usize,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(bound.min(stream.len().saturating_mul(4)));
    let mut pos = 0usize;

    while pos < stream.len() && out.len() <= bound {
        let token = stream[pos];
        pos += 1;
        if token == TOKEN_LITERAL {
            let b = *stream
                .get(pos)
                .ok_or_else(|| CodecError::MoPayload("literal escape at end of token stream".into()))?;
            out.push(b);
            pos += 1;
        } else {
            let phrase = table[token as usize].ok_or(CodecError::UnknownToken(token))?;
            out.extend_from_slice(phrase);
        }
    }

    Ok(out)
}
