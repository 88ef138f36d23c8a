use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use calreg_core::io::BinaryMovie;

#[derive(Args)]
pub struct InfoArgs {
    /// Input binary movie (raw little-endian i16 frames)
    pub file: PathBuf,

    /// Frame height in pixels
    #[arg(long)]
    pub ly: usize,

    /// Frame width in pixels
    #[arg(long)]
    pub lx: usize,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let movie = BinaryMovie::open(&args.file, args.ly, args.lx)?;

    println!("File:        {}", args.file.display());
    println!("Frames:      {}", movie.frame_count());
    println!("Dimensions:  {}x{}", args.lx, args.ly);
    println!("Frame size:  {} bytes", movie.frame_bytes());

    let total_mb = (movie.frame_bytes() * movie.frame_count()) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
