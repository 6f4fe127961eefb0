//! Container inspection without decompression.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::codec::BranchId;
use crate::container::ContainerView;
use crate::error::Result;
use crate::header::VERSION;

/// One block record as seen by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockInfo {
    pub index:       u32,
    pub branch:      BranchId,
    pub raw_len:     u32,
    pub payload_len: usize,
    /// Payload over raw length; 0 for an empty block.
    pub ratio:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub version:       u8,
    pub flags:         u8,
    pub block_size:    u32,
    pub block_count:   u32,
    pub digest:        Option<String>,
    pub container_len: usize,
    pub total_raw:     u64,
    pub total_payload: u64,
    pub blocks:        Vec<BlockInfo>,
}

pub(crate) fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ContainerInfo {
    /// Parse `bytes` and describe it.  Framing is checked exactly as for
    /// decode; payloads are not decompressed.
    pub fn inspect(bytes: &[u8]) -> Result<Self> {
        let view = ContainerView::parse(bytes)?;
        Ok(Self::from_view(&view, bytes.len()))
    }

    pub fn from_view(view: &ContainerView<'_>, container_len: usize) -> Self {
        let blocks: Vec<BlockInfo> = view
            .blocks
            .iter()
            .enumerate()
            .map(|(index, rec)| BlockInfo {
                index:       index as u32,
                branch:      rec.branch,
                raw_len:     rec.raw_len,
                payload_len: rec.payload.len(),
                ratio:       ratio(rec.payload.len() as u64, rec.raw_len as u64),
            })
            .collect();

        Self {
            version:       VERSION,
            flags:         view.header.flags(),
            block_size:    view.header.block_size,
            block_count:   view.header.block_count,
            digest:        view.header.digest.map(hex::encode),
            container_len,
            total_raw:     blocks.iter().map(|b| b.raw_len as u64).sum(),
            total_payload: blocks.iter().map(|b| b.payload_len as u64).sum(),
            blocks,
        }
    }

    /// Whole container size over original size.
    pub fn overall_ratio(&self) -> f64 {
        ratio(self.container_len as u64, self.total_raw)
    }

    /// How many blocks each branch won.
    pub fn branch_usage(&self) -> BTreeMap<BranchId, usize> {
        let mut usage = BTreeMap::new();
        for block in &self.blocks {
            *usage.entry(block.branch).or_insert(0) += 1;
        }
        usage
    }
}
