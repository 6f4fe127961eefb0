//! Size/time comparison of RWV1 against a single-shot zlib baseline.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::codec::ZlibCodec;
use crate::config::RaceConfig;
use crate::engine::{compress, decompress};
use crate::error::{IntegrityError, Result};
use crate::info::ratio;
use crate::integrity;

/// One measured configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BenchRun {
    pub label:   &'static str,
    pub size:    usize,
    pub ratio:   f64,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub input_len: usize,
    pub runs:      Vec<BenchRun>,
}

impl BenchReport {
    pub fn run(&self, label: &str) -> Option<&BenchRun> {
        self.runs.iter().find(|r| r.label == label)
    }
}

fn timed<T>(f: impl FnOnce() -> Result<T>) -> Result<(T, Duration)> {
    let start = Instant::now();
    let out = f()?;
    Ok((out, start.elapsed()))
}

/// `back` must reproduce `original`; a mismatch is reported by digest.
fn check_roundtrip(original: &[u8], back: &[u8]) -> std::result::Result<(), IntegrityError> {
    integrity::verify(&integrity::digest(original), back)
}

fn rwv_run(label: &'static str, data: &[u8], cfg: &RaceConfig) -> Result<BenchRun> {
    let (packed, elapsed) = timed(|| compress(data, cfg))?;
    check_roundtrip(data, &decompress(&packed)?)?;
    Ok(BenchRun { label, size: packed.len(), ratio: ratio(packed.len() as u64, data.len() as u64), elapsed })
}

/// Compare zlib-9 over the whole input with RWV1 default and RWV1 + probe.
/// Every RWV1 run is decoded and checked against `data`.
pub fn bench(data: &[u8]) -> Result<BenchReport> {
    let len = data.len() as u64;

    let (baseline, elapsed) = timed(|| Ok(ZlibCodec::deflate(data, 9)?))?;
    let mut runs = vec![BenchRun {
        label: "zlib-9",
        size: baseline.len(),
        ratio: ratio(baseline.len() as u64, len),
        elapsed,
    }];
    runs.push(rwv_run("rwv1", data, &RaceConfig::default())?);
    runs.push(rwv_run("rwv1+probe", data, &RaceConfig::default().with_probe(true))?);

    for r in &runs {
        info!(label = r.label, size = r.size, ratio = r.ratio, ms = r.elapsed.as_millis() as u64, "bench");
    }
    Ok(BenchReport { input_len: data.len(), runs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_three_runs() {
        let data = b"function f(x) { return x + 1; }\n".repeat(64);
        let report = bench(&data).unwrap();
        assert_eq!(report.input_len, data.len());
        assert_eq!(report.runs.len(), 3);
        let base = report.run("zlib-9").unwrap();
        assert!(base.size < data.len());
        assert!(report.run("rwv1").unwrap().ratio < 1.0);
        assert!(report.run("rwv1+probe").is_some());
        assert!(serde_json::to_string(&report).unwrap().contains("\"elapsed\""));
    }

    #[test]
    fn content_mismatch_is_a_digest_mismatch() {
        check_roundtrip(b"same bytes", b"same bytes").unwrap();
        // Equal length, different content.
        assert!(matches!(
            check_roundtrip(b"same bytes", b"same bytez"),
            Err(IntegrityError::DigestMismatch { .. })
        ));
        assert!(matches!(
            check_roundtrip(b"same bytes", b"same"),
            Err(IntegrityError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn empty_input() {
        let report = bench(b"").unwrap();
        assert!(report.runs.iter().all(|r| r.ratio == 0.0));
    }
}
