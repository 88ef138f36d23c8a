use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use calreg_core::bidiphase;
use calreg_core::io::BinaryMovie;

#[derive(Args)]
pub struct BidiphaseArgs {
    /// Input binary movie (raw little-endian i16 frames)
    pub file: PathBuf,

    /// Frame height in pixels
    #[arg(long)]
    pub ly: usize,

    /// Frame width in pixels
    #[arg(long)]
    pub lx: usize,

    /// Frames to sample across the movie
    #[arg(long, default_value = "200")]
    pub sample: usize,
}

pub fn run(args: &BidiphaseArgs) -> Result<()> {
    let movie = BinaryMovie::open(&args.file, args.ly, args.lx)?;
    let frames = movie.subsample_frames(args.sample)?;
    let offset = bidiphase::estimate(&frames);

    println!("Sampled:     {} frames", frames.len());
    println!("Bidiphase:   {} px", offset);
    if offset == 0 {
        println!("No bidirectional correction needed.");
    } else {
        println!("Pass --bidiphase to `calreg register` to apply it.");
    }
    Ok(())
}
