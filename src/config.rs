//! Race configuration and build capabilities.
//!
//! [`RaceConfig`] is the immutable, caller-facing option set.  Before any
//! block is touched it is resolved against the [`Capabilities`] of this build
//! into a [`RacePlan`]; branch availability is decided once, there, and never
//! re-checked per block.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::{BranchId, Codec, MoZlibCodec, get_codec, CodecError, BRANCH_COUNT};
use crate::error::ConfigError;
use crate::mo::DEFAULT_MAX_ENTRIES;

/// Default block size: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 1 << 20;
/// Largest accepted block size: 64 MiB.
pub const MAX_BLOCK_SIZE: u32 = 64 << 20;

pub const DEFAULT_ZLIB_LEVEL:  u32 = 9;
pub const DEFAULT_BZ2_LEVEL:   u32 = 9;
pub const DEFAULT_LZMA_PRESET: u32 = 6;

// ── BranchSet ────────────────────────────────────────────────────────────────

/// Small bitset over the four branches.  Iterates in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchSet(u8);

impl BranchSet {
    pub const EMPTY: BranchSet = BranchSet(0);
    pub const ALL:   BranchSet = BranchSet((1 << BRANCH_COUNT) - 1);

    pub fn of(branches: &[BranchId]) -> Self {
        branches.iter().copied().collect()
    }

    #[inline]
    pub fn contains(self, id: BranchId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    #[inline]
    pub fn insert(&mut self, id: BranchId) {
        self.0 |= 1 << id.index();
    }

    #[inline]
    pub fn intersect(self, other: BranchSet) -> BranchSet {
        BranchSet(self.0 & other.0)
    }

    #[inline]
    pub fn difference(self, other: BranchSet) -> BranchSet {
        BranchSet(self.0 & !other.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = BranchId> {
        BranchId::ALL.into_iter().filter(move |id| self.contains(*id))
    }
}

impl FromIterator<BranchId> for BranchSet {
    fn from_iter<I: IntoIterator<Item = BranchId>>(iter: I) -> Self {
        let mut set = BranchSet::EMPTY;
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl fmt::Display for BranchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(BranchId::name).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

// ── Capabilities ─────────────────────────────────────────────────────────────

/// Branches whose backends are present in this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(BranchSet);

impl Capabilities {
    /// Probe the compiled-in backends.
    pub fn detect() -> Self {
        Capabilities(BranchId::ALL.into_iter().filter(|b| b.is_compiled_in()).collect())
    }

    /// Restrict to an explicit set (used to simulate reduced builds).
    pub fn only(set: BranchSet) -> Self {
        Capabilities(set)
    }

    pub fn branches(self) -> BranchSet {
        self.0
    }
}

// ── RaceConfig ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub block_size:       u32,
    pub enabled_branches: Vec<BranchId>,
    pub zlib_level:       u32,
    pub bz2_level:        u32,
    pub lzma_preset:      u32,
    pub mo_max_entries:   usize,
    /// Skip branches unlikely to win for the block's content shape.
    pub probe:            bool,
    pub include_digest:   bool,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            block_size:       DEFAULT_BLOCK_SIZE,
            enabled_branches: vec![BranchId::Zlib, BranchId::MoZlib],
            zlib_level:       DEFAULT_ZLIB_LEVEL,
            bz2_level:        DEFAULT_BZ2_LEVEL,
            lzma_preset:      DEFAULT_LZMA_PRESET,
            mo_max_entries:   DEFAULT_MAX_ENTRIES,
            probe:            false,
            include_digest:   false,
        }
    }
}

fn check_range(name: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value, min, max })
    }
}

impl RaceConfig {
    /// Load a JSON config file.  Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_branches(mut self, branches: &[BranchId]) -> Self {
        self.enabled_branches = branches.to_vec();
        self
    }

    /// Add a branch to the enabled set if it is not already there.
    pub fn allow(mut self, branch: BranchId) -> Self {
        if !self.enabled_branches.contains(&branch) {
            self.enabled_branches.push(branch);
        }
        self
    }

    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_digest(mut self, include_digest: bool) -> Self {
        self.include_digest = include_digest;
        self
    }

    /// Parse a comma-separated branch list such as `zlib,mo_zlib,bz2`.
    pub fn parse_branches(list: &str) -> Result<Vec<BranchId>, ConfigError> {
        let mut out = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let id = BranchId::from_name(name)
                .ok_or_else(|| ConfigError::UnknownBranchName(name.to_owned()))?;
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Ok(out)
    }

    pub fn with_mo_max_entries(mut self, mo_max_entries: usize) -> Self {
        self.mo_max_entries = mo_max_entries;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::BlockSize(self.block_size));
        }
        if self.enabled_branches.is_empty() {
            return Err(ConfigError::NoBranches);
        }
        check_range("zlib_level", self.zlib_level, 1, 9)?;
        check_range("bz2_level", self.bz2_level, 1, 9)?;
        // lzma-rs has a single fixed encoder setting.
        if self.lzma_preset != DEFAULT_LZMA_PRESET {
            return Err(ConfigError::LzmaPreset(self.lzma_preset));
        }
        if self.mo_max_entries == 0 {
            return Err(ConfigError::MoMaxEntries);
        }
        Ok(())
    }

    /// Compression level handed to `branch`'s encoder.
    pub fn level_for(&self, branch: BranchId) -> u32 {
        match branch {
            BranchId::Zlib | BranchId::MoZlib => self.zlib_level,
            BranchId::Bz2                     => self.bz2_level,
            BranchId::Lzma                    => self.lzma_preset,
        }
    }

    /// Validate and intersect the enabled set with `caps`.
    ///
    /// Requested branches missing from this build are excluded and reported
    /// (logged and kept in [`RacePlan::excluded`]); it is an error only when
    /// nothing remains.
    pub fn resolve(&self, caps: Capabilities) -> Result<RacePlan, ConfigError> {
        self.validate()?;
        let requested = BranchSet::of(&self.enabled_branches);
        let branches  = requested.intersect(caps.branches());
        let excluded  = requested.difference(caps.branches());

        for id in excluded.iter() {
            warn!(branch = %id, "branch not available in this build; excluded from race");
        }
        if branches.is_empty() {
            return Err(ConfigError::NoAvailableBranches { requested: requested.to_string() });
        }

        Ok(RacePlan { config: self.clone(), branches, excluded })
    }
}

// ── RacePlan ─────────────────────────────────────────────────────────────────

/// A validated config bound to the branches that will actually race.
/// Only [`RaceConfig::resolve`] builds one.
#[derive(Debug, Clone)]
pub struct RacePlan {
    config:   RaceConfig,
    branches: BranchSet,
    excluded: BranchSet,
}

impl RacePlan {
    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Branches that race.
    pub fn branches(&self) -> BranchSet {
        self.branches
    }

    /// Requested branches missing from this build.
    pub fn excluded(&self) -> BranchSet {
        self.excluded
    }

    /// Encoder for `branch`, parameterised by this plan.
    pub fn encoder(&self, branch: BranchId) -> Result<Box<dyn Codec>, CodecError> {
        match branch {
            BranchId::MoZlib => Ok(Box::new(MoZlibCodec { max_entries: self.config.mo_max_entries })),
            other            => get_codec(other),
        }
    }
}
