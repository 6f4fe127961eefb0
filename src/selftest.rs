//! Built-in round-trip checks run by `rwv selftest`.

use serde::Serialize;
use tracing::warn;

use crate::codec::BranchId;
use crate::config::RaceConfig;
use crate::engine::{compress, decompress};
use crate::info::ContainerInfo;

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub name:   &'static str,
    pub passed: bool,
    /// Failure detail; empty when the case passed.
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelftestReport {
    pub cases: Vec<CaseResult>,
}

impl SelftestReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.passed)
    }
}

type Check = fn(&ContainerInfo) -> Option<String>;

struct Case {
    name:  &'static str,
    data:  Vec<u8>,
    cfg:   RaceConfig,
    check: Option<Check>,
}

fn no_blocks(info: &ContainerInfo) -> Option<String> {
    (info.block_count != 0).then(|| format!("{} blocks, want 0", info.block_count))
}

fn has_digest(info: &ContainerInfo) -> Option<String> {
    info.digest.is_none().then(|| "no digest in header".to_owned())
}

fn ten_blocks(info: &ContainerInfo) -> Option<String> {
    (info.block_count != 10).then(|| format!("{} blocks, want 10", info.block_count))
}

fn all_mo(info: &ContainerInfo) -> Option<String> {
    let mo = info.branch_usage().get(&BranchId::MoZlib).copied().unwrap_or(0);
    (mo != info.blocks.len()).then(|| "MO_ZLIB did not carry every block".to_owned())
}

fn cases() -> Vec<Case> {
    let js = "function add(a, b) { return a + b; }\n\
              const result = add(1, 2);\n\
              console.log('result', result);\n";
    vec![
        Case {
            name:  "empty",
            data:  Vec::new(),
            cfg:   RaceConfig::default(),
            check: Some(no_blocks),
        },
        Case {
            name:  "repetitive text",
            data:  b"Hello, World! ".repeat(100),
            cfg:   RaceConfig::default(),
            check: None,
        },
        Case {
            name:  "binary ramp",
            data:  (0..=255u8).collect::<Vec<_>>().repeat(100),
            cfg:   RaceConfig::default(),
            check: None,
        },
        Case {
            name:  "digest",
            data:  b"integrity matters ".repeat(50),
            cfg:   RaceConfig::default().with_digest(true),
            check: Some(has_digest),
        },
        Case {
            name:  "multi-block",
            data:  b"x".repeat(10_000),
            cfg:   RaceConfig::default().with_block_size(1024),
            check: Some(ten_blocks),
        },
        Case {
            name:  "source text",
            data:  js.repeat(200).into_bytes(),
            cfg:   RaceConfig::default().with_branches(&[BranchId::MoZlib]),
            check: Some(all_mo),
        },
    ]
}

fn run_case(case: &Case) -> Result<(), String> {
    let packed = compress(&case.data, &case.cfg).map_err(|e| e.to_string())?;
    let back = decompress(&packed).map_err(|e| e.to_string())?;
    if back != case.data {
        return Err(format!("round-trip returned {} bytes, want {}", back.len(), case.data.len()));
    }
    if let Some(check) = case.check {
        let info = ContainerInfo::inspect(&packed).map_err(|e| e.to_string())?;
        if let Some(detail) = check(&info) {
            return Err(detail);
        }
    }
    Ok(())
}

pub fn selftest() -> SelftestReport {
    let cases = cases()
        .iter()
        .map(|case| {
            let (passed, detail) = match run_case(case) {
                Ok(())      => (true, String::new()),
                Err(detail) => {
                    warn!(case = case.name, %detail, "selftest case failed");
                    (false, detail)
                }
            };
            CaseResult { name: case.name, passed, detail }
        })
        .collect();
    SelftestReport { cases }
}
