use clap::{Args, Parser, Subcommand};
use rwv::codec::BranchId;
use rwv::config::RaceConfig;
use rwv::info::ContainerInfo;
use rwv::RwvError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rwv", version, about = "RWV1 block-race compressor")]
struct Cli {
    /// Log progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into an RWV1 container
    Compress {
        input:  PathBuf,
        output: PathBuf,
        #[command(flatten)]
        opts: CompressOpts,
    },
    /// Decompress an RWV1 container
    Decompress {
        input:  PathBuf,
        output: PathBuf,
    },
    /// Compare against a single-shot zlib-9 baseline
    Bench {
        input: PathBuf,
    },
    /// Show container metadata without decompressing
    Info {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run the built-in round-trip cases
    Selftest,
}

#[derive(Args)]
struct CompressOpts {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Store a SHA-256 of the input in the header
    #[arg(long)]
    sha256: bool,
    #[arg(long)]
    block_size: Option<u32>,
    /// Race only the branches likely to win for each block's content
    #[arg(long)]
    probe: bool,
    /// Comma-separated branch list, e.g. `zlib,mo_zlib,lzma`
    #[arg(long)]
    branches: Option<String>,
    #[arg(long)]
    allow_bz2: bool,
    #[arg(long)]
    allow_lzma: bool,
    /// 1-9
    #[arg(long)]
    zlib_level: Option<u32>,
    /// 1-9
    #[arg(long)]
    bz2_level: Option<u32>,
    #[arg(long)]
    mo_max_entries: Option<usize>,
}

impl CompressOpts {
    fn into_config(self) -> rwv::Result<RaceConfig> {
        let mut cfg = match &self.config {
            Some(path) => RaceConfig::from_json_file(path)?,
            None       => RaceConfig::default(),
        };
        if self.sha256 { cfg.include_digest = true; }
        if self.probe  { cfg.probe = true; }
        if let Some(list) = &self.branches {
            cfg = cfg.with_branches(&RaceConfig::parse_branches(list)?);
        }
        if self.allow_bz2  { cfg = cfg.allow(BranchId::Bz2); }
        if self.allow_lzma { cfg = cfg.allow(BranchId::Lzma); }
        if let Some(v) = self.block_size     { cfg.block_size = v; }
        if let Some(v) = self.zlib_level     { cfg.zlib_level = v; }
        if let Some(v) = self.bz2_level      { cfg.bz2_level = v; }
        if let Some(v) = self.mo_max_entries { cfg.mo_max_entries = v; }
        Ok(cfg)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rwv=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}: {}", e.kind(), e.detail());
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode, RwvError> {
    match command {

        // ── Compress ─────────────────────────────────────────────────────────
        Commands::Compress { input, output, opts } => {
            let cfg = opts.into_config()?;
            let info = rwv::compress_file(&input, &output, &cfg)?;
            println!(
                "{} -> {}: {} -> {} bytes ({:.3}), {} block(s)",
                input.display(), output.display(),
                info.total_raw, info.container_len, info.overall_ratio(), info.block_count,
            );
        }

        // ── Decompress ───────────────────────────────────────────────────────
        Commands::Decompress { input, output } => {
            let written = rwv::decompress_file(&input, &output)?;
            println!("{} -> {}: {} bytes", input.display(), output.display(), written);
        }

        // ── Bench ────────────────────────────────────────────────────────────
        Commands::Bench { input } => {
            let data = std::fs::read(&input)?;
            let report = rwv::bench(&data)?;
            println!("input {} bytes", report.input_len);
            println!("{:<12} {:>12} {:>8} {:>10}", "Run", "Size", "Ratio", "ms");
            for r in &report.runs {
                println!("{:<12} {:>12} {:>8.4} {:>10.1}",
                    r.label, r.size, r.ratio, r.elapsed.as_secs_f64() * 1000.0);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let bytes = std::fs::read(&input)?;
            let info = ContainerInfo::inspect(&bytes)?;
            if json {
                let text = serde_json::to_string_pretty(&info)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                println!("{text}");
            } else {
                print_info(&input, &info);
            }
        }

        // ── Selftest ─────────────────────────────────────────────────────────
        Commands::Selftest => {
            let report = rwv::selftest();
            for case in &report.cases {
                if case.passed {
                    println!("  ok    {}", case.name);
                } else {
                    println!("  FAIL  {}: {}", case.name, case.detail);
                }
            }
            if !report.passed() {
                return Ok(ExitCode::FAILURE);
            }
            println!("all {} cases passed", report.cases.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_info(path: &Path, info: &ContainerInfo) {
    println!("── RWV1 container ───────────────────────────────────────");
    println!("  Path           {}", path.display());
    println!("  Version        {}", info.version);
    println!("  Block size     {} B", info.block_size);
    println!("  Blocks         {}", info.block_count);
    println!("  Digest         {}", info.digest.as_deref().unwrap_or("none"));
    println!("  Original       {} B", info.total_raw);
    println!("  Container      {} B ({:.4})", info.container_len, info.overall_ratio());
    println!("  Branch usage:");
    for (branch, count) in info.branch_usage() {
        println!("    {:<8} {}", branch.name(), count);
    }
    println!("{:>7} {:<8} {:>10} {:>10} {:>7}", "Block", "Branch", "Raw", "Payload", "Ratio");
    for b in &info.blocks {
        println!("{:>7} {:<8} {:>10} {:>10} {:>7.3}",
            b.index, b.branch.name(), b.raw_len, b.payload_len, b.ratio);
    }
}
