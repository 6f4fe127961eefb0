pub mod bench;
pub mod block;
pub mod codec;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod header;
pub mod info;
pub mod integrity;
pub mod mo;
pub mod race;
pub mod selftest;
pub mod wire;

pub use bench::{bench, BenchReport};
pub use codec::{get_codec, BranchId, Codec, CodecError};
pub use config::{BranchSet, Capabilities, RaceConfig, RacePlan};
pub use container::{Container, ContainerView};
pub use engine::{compress, compress_file, compress_with_plan, decompress, decompress_file, inspect};
pub use error::{ConfigError, FormatError, IntegrityError, Result, RwvError};
pub use info::{BlockInfo, ContainerInfo};
pub use selftest::{selftest, SelftestReport};
