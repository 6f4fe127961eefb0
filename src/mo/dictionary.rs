//! Phrase discovery and scoring for the Middle-Out branch.
//!
//! A candidate is any substring of `MIN_PHRASE_LEN..=MAX_PHRASE_LEN` bytes
//! that occurs at least twice in the block (overlapping occurrences count).
//! Its score is `count × (len − 1)`: the bytes saved by replacing each
//! occurrence with a one-byte token.
//!
//! Ranking is total: score descending, then phrase bytes ascending.  Tokens
//! `1, 2, …` are handed out in rank order, so the dictionary depends only
//! on the block contents and `max_entries`.
//!
//! # Search
//! Lengths are scanned shortest first.  A substring of length `L + 1` can
//! only repeat if its length-`L` prefix repeats, so after each length only
//! the start positions whose current n-gram repeated stay active, and the
//! scan stops as soon as a length produces no repeats.  Because the ranking
//! is total, the global top-`k` is contained in the union of the per-length
//! top-`k` lists; only those are kept between lengths.

use std::cmp::Ordering;
use std::collections::HashMap;

pub const MIN_PHRASE_LEN: usize = 3;
pub const MAX_PHRASE_LEN: usize = 64;

/// Token byte that introduces a literal in the token stream.
pub const TOKEN_LITERAL: u8 = 0;
/// Size of the token space (tokens `1..=255`).
pub const MAX_TOKENS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub phrase: &'a [u8],
    pub count:  u32,
}

impl Candidate<'_> {
    #[inline]
    pub fn score(&self) -> u64 {
        self.count as u64 * (self.phrase.len() as u64 - 1)
    }
}

fn rank(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| a.phrase.cmp(b.phrase))
}

/// The `limit` best-ranked repeated phrases of `block`, in rank order.
pub fn find_candidates(block: &[u8], limit: usize) -> Vec<Candidate<'_>> {
    if limit == 0 || block.len() < MIN_PHRASE_LEN + 1 {
        return Vec::new();
    }

    let mut active: Vec<usize> = (0..=block.len() - MIN_PHRASE_LEN).collect();
    let mut best: Vec<Candidate<'_>> = Vec::new();

    for len in MIN_PHRASE_LEN..=MAX_PHRASE_LEN {
        active.retain(|&i| i + len <= block.len());
        if active.len() < 2 {
            break;
        }

        let mut counts: HashMap<&[u8], u32> = HashMap::with_capacity(active.len());
        for &i in &active {
            *counts.entry(&block[i..i + len]).or_insert(0) += 1;
        }

        let mut repeated: Vec<Candidate<'_>> = counts
            .iter()
            .filter(|&(_, &count)| count >= 2)
            .map(|(&phrase, &count)| Candidate { phrase, count })
            .collect();
        if repeated.is_empty() {
            break;
        }
        repeated.sort_unstable_by(rank);
        repeated.truncate(limit);
        best.extend(repeated);

        active.retain(|&i| counts.get(&block[i..i + len]).copied().unwrap_or(0) >= 2);
    }

    best.sort_unstable_by(rank);
    best.truncate(limit);
    best
}

// ── Dictionary ───────────────────────────────────────────────────────────────

/// One phrase bound to a non-zero token byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntry<'a> {
    pub token:  u8,
    pub phrase: &'a [u8],
}

/// Block-scoped phrase dictionary.  Entries are kept in ascending token
/// order; phrases borrow from the block (encode) or the payload (decode).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary<'a> {
    entries: Vec<DictionaryEntry<'a>>,
}

impl<'a> Dictionary<'a> {
    /// Discover, rank and tokenise the phrases of `block`.
    ///
    /// At most `min(max_entries, 255)` entries are produced.
    pub fn build(block: &'a [u8], max_entries: usize) -> Self {
        let limit = max_entries.min(MAX_TOKENS);
        let entries = find_candidates(block, limit)
            .into_iter()
            .zip(1..=u8::MAX)
            .map(|(c, token)| DictionaryEntry { token, phrase: c.phrase })
            .collect();
        Self { entries }
    }

    pub fn from_entries(mut entries: Vec<DictionaryEntry<'a>>) -> Self {
        entries.sort_by_key(|e| e.token);
        Self { entries }
    }

    pub fn entries(&self) -> &[DictionaryEntry<'a>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose token is not marked in `used`.
    pub fn retain_used(&mut self, used: &[bool; 256]) {
        self.entries.retain(|e| used[e.token as usize]);
    }

    /// Token-indexed lookup table for expansion.
    pub fn phrase_table(&self) -> [Option<&'a [u8]>; 256] {
        let mut table = [None; 256];
        for e in &self.entries {
            table[e.token as usize] = Some(e.phrase);
        }
        table
    }
}
