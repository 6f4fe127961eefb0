//! High-level API: the primary embedding surface.
//!
//! ```no_run
//! use rwv::{compress, decompress, RaceConfig};
//!
//! let cfg = RaceConfig::default().with_digest(true);
//! let packed = compress(b"Hello, World! Hello, World!", &cfg)?;
//! assert_eq!(decompress(&packed)?, b"Hello, World! Hello, World!");
//! # Ok::<(), rwv::RwvError>(())
//! ```

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::{Capabilities, RaceConfig, RacePlan};
use crate::container::{self, Container};
use crate::error::Result;
use crate::info::ContainerInfo;

/// Compress `data` with `cfg`, resolved against this build's backends.
pub fn compress(data: &[u8], cfg: &RaceConfig) -> Result<Vec<u8>> {
    let plan = cfg.resolve(Capabilities::detect())?;
    compress_with_plan(data, &plan)
}

/// Compress under an already-resolved plan.
pub fn compress_with_plan(data: &[u8], plan: &RacePlan) -> Result<Vec<u8>> {
    let container = Container::encode(data, plan)?;
    let bytes = container.to_bytes()?;
    info!(
        raw_len = data.len(),
        container_len = bytes.len(),
        blocks = container.blocks.len(),
        branches = %plan.branches(),
        digest = plan.config().include_digest,
        "compressed"
    );
    Ok(bytes)
}

/// Decode a container, verifying lengths and (if present) the digest.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let data = container::decode(bytes)?;
    info!(container_len = bytes.len(), raw_len = data.len(), "decompressed");
    Ok(data)
}

pub fn inspect(bytes: &[u8]) -> Result<ContainerInfo> {
    ContainerInfo::inspect(bytes)
}

/// Compress `input` into `output`.  Nothing is written unless the whole
/// container was produced.
pub fn compress_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    cfg: &RaceConfig,
) -> Result<ContainerInfo> {
    let data = fs::read(input)?;
    let bytes = compress(&data, cfg)?;
    let info = ContainerInfo::inspect(&bytes)?;
    fs::write(output, &bytes)?;
    Ok(info)
}

/// Decompress `input` into `output`; returns bytes written.
pub fn decompress_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<u64> {
    let bytes = fs::read(input)?;
    let data = decompress(&bytes)?;
    fs::write(output, &data)?;
    Ok(data.len() as u64)
}
