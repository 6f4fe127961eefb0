//! Race compressor: every contending branch encodes the block, the smallest
//! payload wins.
//!
//! # Determinism
//! Branch attempts may run concurrently (Rayon, feature `parallel`), and so
//! may blocks.  Neither is observable in the output:
//! - attempt results land in a [`RaceResult`] slot indexed by branch id and
//!   the winner is chosen only after every attempt has returned;
//! - ties on payload length go to the lowest branch id
//!   (`ZLIB < MO_ZLIB < BZ2 < LZMA`);
//! - blocks are collected by index, never appended on completion.
//!
//! # Probe gating
//! With `probe` enabled, a block is classified by its printable-ASCII ratio
//! and only `MO_ZLIB` and `ZLIB` contend; `BZ2`/`LZMA` are skipped even if
//! enabled.  This trades optimality for speed: a skipped branch that would
//! have produced a smaller payload does not get the chance.  If none of the
//! gated branches is enabled, the full enabled set races instead.

use tracing::{debug, warn};

use crate::block::BlockRecord;
use crate::codec::{BranchId, CodecError, BRANCH_COUNT};
use crate::config::RacePlan;

/// Printable-ASCII share above which a block is treated as text.
pub const TEXT_RATIO_THRESHOLD: f64 = 0.7;

// ── Probe ────────────────────────────────────────────────────────────────────

pub fn looks_like_text(block: &[u8]) -> bool {
    if block.is_empty() {
        return false;
    }
    let printable = block.iter().filter(|&&b| (32..=126).contains(&b)).count();
    printable as f64 / block.len() as f64 > TEXT_RATIO_THRESHOLD
}

/// Branches worth trying for this block's content shape, in attempt order.
pub fn probe_candidates(block: &[u8]) -> Vec<BranchId> {
    if block.is_empty() {
        vec![BranchId::Zlib]
    } else if looks_like_text(block) {
        vec![BranchId::MoZlib, BranchId::Zlib]
    } else {
        vec![BranchId::Zlib, BranchId::MoZlib]
    }
}

/// The branches that will encode `block` under `plan`.
pub fn contenders(block: &[u8], plan: &RacePlan) -> Vec<BranchId> {
    if plan.config().probe && plan.branches().len() > 1 {
        let gated: Vec<BranchId> = probe_candidates(block)
            .into_iter()
            .filter(|b| plan.branches().contains(*b))
            .collect();
        if !gated.is_empty() {
            return gated;
        }
    }
    plan.branches().iter().collect()
}

// ── RaceResult ───────────────────────────────────────────────────────────────

/// Candidate payloads for one block, one slot per branch id.
#[derive(Debug, Default)]
pub struct RaceResult {
    slots: [Option<Vec<u8>>; BRANCH_COUNT],
}

impl RaceResult {
    pub fn insert(&mut self, branch: BranchId, payload: Vec<u8>) {
        self.slots[branch.index()] = Some(payload);
    }

    pub fn sizes(&self) -> [Option<usize>; BRANCH_COUNT] {
        let mut out = [None; BRANCH_COUNT];
        for (dst, slot) in out.iter_mut().zip(&self.slots) {
            *dst = slot.as_ref().map(Vec::len);
        }
        out
    }

    /// Smallest payload; on equal length the lowest branch id.
    pub fn into_winner(self) -> Option<(BranchId, Vec<u8>)> {
        let mut best: Option<(BranchId, Vec<u8>)> = None;
        for (branch, slot) in BranchId::ALL.into_iter().zip(self.slots) {
            let Some(payload) = slot else { continue };
            let replace = match &best {
                Some((_, held)) => payload.len() < held.len(),
                None => true,
            };
            if replace {
                best = Some((branch, payload));
            }
        }
        best
    }
}

// ── Racing ───────────────────────────────────────────────────────────────────

fn encode_with(block: &[u8], branch: BranchId, plan: &RacePlan) -> Result<Vec<u8>, CodecError> {
    plan.encoder(branch)?.compress(block, plan.config().level_for(branch))
}

/// Race one block and return its record.
///
/// A branch whose encoder fails is dropped from this block's race with a
/// warning; the block fails only if every contender fails.
pub fn race_block(block: &[u8], plan: &RacePlan) -> Result<BlockRecord, CodecError> {
    let contenders = contenders(block, plan);

    #[cfg(feature = "parallel")]
    let attempts: Vec<(BranchId, Result<Vec<u8>, CodecError>)> = {
        use rayon::prelude::*;
        contenders
            .par_iter()
            .map(|&branch| (branch, encode_with(block, branch, plan)))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let attempts: Vec<(BranchId, Result<Vec<u8>, CodecError>)> = contenders
        .iter()
        .map(|&branch| (branch, encode_with(block, branch, plan)))
        .collect();

    let mut result = RaceResult::default();
    let mut first_err = None;
    for (branch, attempt) in attempts {
        match attempt {
            Ok(payload) => result.insert(branch, payload),
            Err(e) => {
                warn!(branch = %branch, error = %e, "branch encoder failed; dropped for this block");
                first_err.get_or_insert(e);
            }
        }
    }

    let sizes = result.sizes();
    let (branch, payload) = match (result.into_winner(), first_err) {
        (Some(winner), _) => winner,
        (None, Some(e))   => return Err(e),
        (None, None)      => return Err(CodecError::Compression {
            branch: BranchId::Zlib,
            reason: "no branch contended for the block".into(),
        }),
    };
    debug!(
        raw_len = block.len(),
        winner = %branch,
        payload_len = payload.len(),
        sizes = ?sizes,
        "block raced"
    );

    Ok(BlockRecord {
        branch,
        // Blocks never exceed `block_size`, which is a u32.
        raw_len: block.len() as u32,
        payload,
    })
}

/// Split `data` into `block_size` blocks and race each one.
///
/// Records come back in input order.  The first failing block aborts the
/// whole run; no partial result is returned.
pub fn race_blocks(data: &[u8], plan: &RacePlan) -> Result<Vec<BlockRecord>, CodecError> {
    let block_size = plan.config().block_size as usize;

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        data.par_chunks(block_size)
            .enumerate()
            .map(|(index, block)| {
                let _span = tracing::debug_span!("block", index).entered();
                race_block(block, plan)
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        data.chunks(block_size)
            .enumerate()
            .map(|(index, block)| {
                let _span = tracing::debug_span!("block", index).entered();
                race_block(block, plan)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::get_codec;
    use crate::config::{Capabilities, RaceConfig};

    fn plan(cfg: RaceConfig) -> RacePlan {
        cfg.resolve(Capabilities::detect()).unwrap()
    }

    #[test]
    fn tie_goes_to_lowest_branch_id() {
        // Insert in reverse completion order; selection must not care.
        let mut r = RaceResult::default();
        r.insert(BranchId::MoZlib, vec![1; 12]);
        r.insert(BranchId::Zlib, vec![2; 12]);
        assert_eq!(r.into_winner().unwrap().0, BranchId::Zlib);

        let mut r = RaceResult::default();
        r.insert(BranchId::Lzma, vec![0; 5]);
        r.insert(BranchId::Bz2, vec![0; 5]);
        r.insert(BranchId::MoZlib, vec![0; 6]);
        assert_eq!(r.into_winner().unwrap().0, BranchId::Bz2);
    }

    #[test]
    fn strictly_smaller_payload_wins() {
        let mut r = RaceResult::default();
        r.insert(BranchId::Zlib, vec![0; 10]);
        r.insert(BranchId::MoZlib, vec![0; 9]);
        r.insert(BranchId::Lzma, vec![0; 30]);
        let (branch, payload) = r.into_winner().unwrap();
        assert_eq!(branch, BranchId::MoZlib);
        assert_eq!(payload.len(), 9);
    }

    #[test]
    fn empty_result_has_no_winner() {
        assert!(RaceResult::default().into_winner().is_none());
    }

    #[test]
    fn probe_classifies_content() {
        assert!(looks_like_text(b"plain old text, nothing fancy"));
        assert!(!looks_like_text(&[0u8, 1, 2, 3, 200, 201, 202, b'a']));
        assert_eq!(probe_candidates(b"hello world"), vec![BranchId::MoZlib, BranchId::Zlib]);
        assert_eq!(probe_candidates(&[0u8; 32]), vec![BranchId::Zlib, BranchId::MoZlib]);
        assert_eq!(probe_candidates(b""), vec![BranchId::Zlib]);
    }

    #[test]
    fn probe_skips_heavy_branches() {
        let p = plan(
            RaceConfig::default()
                .with_branches(&[BranchId::Zlib, BranchId::MoZlib, BranchId::Bz2, BranchId::Lzma])
                .with_probe(true),
        );
        let got = contenders(b"some text", &p);
        assert!(got.iter().all(|b| matches!(b, BranchId::Zlib | BranchId::MoZlib)));
    }

    #[test]
    fn probe_falls_back_to_enabled_set() {
        let p = plan(
            RaceConfig::default()
                .with_branches(&[BranchId::Zlib, BranchId::Bz2])
                .with_probe(true),
        );
        assert_eq!(contenders(b"some text", &p), vec![BranchId::Zlib]);

        let caps_all = RaceConfig::default().with_branches(&[BranchId::Bz2, BranchId::Lzma]).with_probe(true);
        if let Ok(p) = caps_all.resolve(Capabilities::detect()) {
            let got = contenders(b"some text", &p);
            assert_eq!(got, p.branches().iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn run_of_ten_picks_zlib() {
        // MO ranks seven phrases but only the 9-byte one is used; the payload
        // still carries a 12-byte dictionary section and a 4-byte length
        // ahead of its own zlib stream, so plain zlib is smaller.
        let p = plan(RaceConfig::default());
        let rec = race_block(b"AAAAAAAAAA", &p).unwrap();
        assert_eq!(rec.branch, BranchId::Zlib);
        assert_eq!(rec.raw_len, 10);
    }

    #[test]
    fn winner_is_the_minimum_over_branches() {
        let block = b"header: value\nheader: other value\nfooter: value\n".repeat(30);
        let p = plan(RaceConfig::default());
        let rec = race_block(&block, &p).unwrap();
        for branch in p.branches().iter() {
            let size = encode_with(&block, branch, &p).unwrap().len();
            assert!(rec.payload.len() <= size, "{branch} beat the winner");
        }
        let back = get_codec(rec.branch).unwrap().decompress(&rec.payload, block.len()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn blocks_keep_input_order() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let p = plan(RaceConfig::default().with_block_size(1024));
        let recs = race_blocks(&data, &p).unwrap();
        assert_eq!(recs.len(), 10);
        assert!(recs[..9].iter().all(|r| r.raw_len == 1024));
        assert_eq!(recs[9].raw_len, 10_000 - 9 * 1024);
        assert!(race_blocks(&[], &p).unwrap().is_empty());
    }
}
