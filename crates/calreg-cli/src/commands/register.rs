use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use calreg_core::fft::{CpuFftBackend, FftBackend};
use calreg_core::pipeline::{register_movie, MoviePaths, RegistrationOutcome};
use calreg_core::config::RegistrationConfig;

use crate::summary::{print_outcome_summary, print_register_summary};

#[derive(Args)]
pub struct RegisterArgs {
    /// Input binary movie (raw little-endian i16 frames)
    pub file: PathBuf,

    /// Frame height in pixels (required unless --config provides it)
    #[arg(long)]
    pub ly: Option<usize>,

    /// Frame width in pixels (required unless --config provides it)
    #[arg(long)]
    pub lx: Option<usize>,

    /// Registration config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Registered output path
    #[arg(short, long, default_value = "registered.bin")]
    pub output: PathBuf,

    /// Rewrite the input file in place instead of writing --output
    #[arg(long)]
    pub in_place: bool,

    /// Frames per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Gaussian band-limit width in pixels
    #[arg(long)]
    pub smooth_sigma: Option<f32>,

    /// Maximum shift as a fraction of the larger frame dimension
    #[arg(long)]
    pub max_shift: Option<f32>,

    /// Enable one-photon spatial pre-filtering
    #[arg(long)]
    pub one_photon: bool,

    /// Enable bidirectional scan correction
    #[arg(long)]
    pub bidiphase: bool,

    /// Worker threads (default: half the logical cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Second-channel input movie, shifted with the primary offsets
    #[arg(long)]
    pub chan2: Option<PathBuf>,

    /// Second-channel registered output path
    #[arg(long, default_value = "registered_chan2.bin")]
    pub chan2_output: PathBuf,

    /// Write per-frame offsets and crop bounds as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,
}

pub fn run(args: &RegisterArgs) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(b) = args.batch_size {
        config.batch_size = b;
    }
    if let Some(s) = args.smooth_sigma {
        config.smooth_sigma = s;
    }
    if let Some(m) = args.max_shift {
        config.max_shift_fraction = m;
    }
    if args.one_photon {
        config.one_photon.enabled = true;
    }
    if args.bidiphase {
        config.bidiphase.enabled = true;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if args.chan2.is_some() {
        config.n_channels = config.n_channels.max(2);
    }

    // the alignment channel drives registration; the other follows its offsets
    let (primary, secondary) = if config.align_channel == 2 {
        match args.chan2.clone() {
            Some(chan2) => (chan2, Some(args.file.clone())),
            None => bail!("align_channel = 2 but no --chan2 movie given"),
        }
    } else {
        (args.file.clone(), args.chan2.clone())
    };

    let paths = if args.in_place {
        let mut p = MoviePaths::in_place(&primary);
        p.reg_chan2 = secondary;
        p
    } else {
        MoviePaths {
            reg: args.output.clone(),
            raw: Some(primary),
            reg_chan2: secondary.as_ref().map(|_| args.chan2_output.clone()),
            raw_chan2: secondary,
        }
    };

    let backend = CpuFftBackend;
    print_register_summary(&config, &paths, backend.name());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Registering [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let outcome = register_movie(&paths, &config, None, &backend, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish();

    print_outcome_summary(&outcome);

    if let Some(ref path) = args.json {
        write_outcome_json(path, &outcome)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Offsets saved to {}", path.display());
    }
    println!("Registered movie at {}", paths.reg.display());
    Ok(())
}

fn load_config(args: &RegisterArgs) -> Result<RegistrationConfig> {
    if let Some(ref path) = args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: RegistrationConfig = toml::from_str(&text)?;
        return Ok(config);
    }
    match (args.ly, args.lx) {
        (Some(ly), Some(lx)) => Ok(RegistrationConfig::new(ly, lx)),
        _ => bail!("frame dimensions required: pass --ly and --lx, or --config"),
    }
}

fn write_outcome_json(path: &PathBuf, outcome: &RegistrationOutcome) -> Result<()> {
    let value = serde_json::json!({
        "yoff": outcome.yoff,
        "xoff": outcome.xoff,
        "corr": outcome.corr,
        "bidiphase": outcome.bidiphase,
        "badframes": outcome.badframes,
        "yrange": outcome.yrange,
        "xrange": outcome.xrange,
    });
    std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}
