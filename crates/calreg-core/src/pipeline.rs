use std::path::PathBuf;

use ndarray::Array2;
use tracing::{info, warn};

use crate::bidiphase;
use crate::config::RegistrationConfig;
use crate::consts::{CLIP_MAX, LOW_FRAME_WARNING, MIN_FRAMES, PROGRESS_BATCH_INTERVAL};
use crate::crop::compute_crop;
use crate::error::{CalregError, Result};
use crate::fft::FftBackend;
use crate::io::{BatchReader, BinaryMovie, FrameWriter};
use crate::masks::prepare_masks;
use crate::phasecorr::{phasecorr, FrameShift};
use crate::reference::pick_initial_reference;
use crate::shift::shift_frames;

/// Movie files a run operates on. `reg` always holds the registered
/// primary channel afterwards; when `raw` is absent the registration
/// rewrites `reg` in place (reader cursor ahead of the writer's). The
/// optional second channel follows the same rule with the primary
/// channel's offsets.
#[derive(Clone, Debug, Default)]
pub struct MoviePaths {
    pub reg: PathBuf,
    pub raw: Option<PathBuf>,
    pub reg_chan2: Option<PathBuf>,
    pub raw_chan2: Option<PathBuf>,
}

impl MoviePaths {
    pub fn in_place(reg: impl Into<PathBuf>) -> Self {
        Self {
            reg: reg.into(),
            ..Default::default()
        }
    }
}

/// Everything a run produces besides the rewritten movie files.
#[derive(Clone, Debug)]
pub struct RegistrationOutcome {
    /// Reference image the movie was aligned to.
    pub reference: Array2<f32>,
    /// Mean of the registered (clipped) primary-channel frames.
    pub mean_img: Array2<f32>,
    pub mean_img_chan2: Option<Array2<f32>>,
    /// Per-frame row offsets, in arrival order.
    pub yoff: Vec<i32>,
    /// Per-frame column offsets, in arrival order.
    pub xoff: Vec<i32>,
    /// Per-frame peak correlations.
    pub corr: Vec<f32>,
    /// Bidirectional scan correction applied to every frame (0 when
    /// disabled).
    pub bidiphase: i32,
    pub badframes: Vec<bool>,
    pub yrange: [i64; 2],
    pub xrange: [i64; 2],
}

/// Register a movie end to end: bootstrap (or accept) a reference,
/// stream the primary channel through phase correlation in batches,
/// rewrite it shifted, mirror the shifts onto the second channel, and
/// derive crop bounds and frame quality flags.
///
/// `progress` is called after every batch with (frames done, total).
pub fn register_movie<F>(
    paths: &MoviePaths,
    config: &RegistrationConfig,
    reference: Option<Array2<f32>>,
    backend: &dyn FftBackend,
    progress: F,
) -> Result<RegistrationOutcome>
where
    F: Fn(usize, usize) + Send + Sync,
{
    let source = paths.raw.as_ref().unwrap_or(&paths.reg);
    let movie = BinaryMovie::open(source, config.ly, config.lx)?;
    let n_frames = movie.frame_count();
    if n_frames < MIN_FRAMES {
        return Err(CalregError::TooFewFrames {
            got: n_frames,
            min: MIN_FRAMES,
        });
    }
    if n_frames < LOW_FRAME_WARNING {
        warn!(
            n_frames,
            "few frames; registration metrics will be unreliable"
        );
    }

    let threads = config.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get() / 2)
            .unwrap_or(1)
            .max(1)
    });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| CalregError::Pipeline(e.to_string()))?;
    info!(n_frames, threads, source = %source.display(), "starting registration");

    pool.install(|| register_inner(paths, config, reference, backend, &movie, &progress))
}

fn register_inner<F>(
    paths: &MoviePaths,
    config: &RegistrationConfig,
    reference: Option<Array2<f32>>,
    backend: &dyn FftBackend,
    movie: &BinaryMovie,
    progress: &F,
) -> Result<RegistrationOutcome>
where
    F: Fn(usize, usize) + Send + Sync,
{
    let n_frames = movie.frame_count();
    let mut sample = movie.subsample_frames(config.n_init_frames)?;

    let bidi = if config.bidiphase.enabled {
        config
            .bidiphase
            .offset
            .unwrap_or_else(|| bidiphase::estimate(&sample))
    } else {
        0
    };
    if bidi != 0 {
        for frame in sample.iter_mut() {
            bidiphase::apply(frame, bidi);
        }
    }

    let ref_img = match reference {
        Some(r) => {
            if r.dim() != (config.ly, config.lx) {
                return Err(CalregError::Pipeline(format!(
                    "reference is {:?}, movie frames are ({}, {})",
                    r.dim(),
                    config.ly,
                    config.lx
                )));
            }
            r
        }
        None => pick_initial_reference(&sample, config, backend)?,
    };
    let masks = prepare_masks(&ref_img, config, backend);
    let fill = ref_img.mean().unwrap_or(0.0);

    let source = paths.raw.as_ref().unwrap_or(&paths.reg);
    let mut reader = BatchReader::open(source, config.ly, config.lx, config.batch_size)?;
    let mut writer = if paths.raw.is_some() {
        FrameWriter::create(&paths.reg)?
    } else {
        FrameWriter::overwrite(&paths.reg)?
    };

    let mut yoff = Vec::with_capacity(n_frames);
    let mut xoff = Vec::with_capacity(n_frames);
    let mut corr = Vec::with_capacity(n_frames);
    let mut mean_sum = Array2::<f64>::zeros((config.ly, config.lx));
    let mut done = 0usize;
    let mut n_batches = 0usize;
    loop {
        let mut batch = reader.next_batch()?;
        if batch.is_empty() {
            break;
        }
        if bidi != 0 {
            for frame in batch.iter_mut() {
                bidiphase::apply(frame, bidi);
            }
        }
        let shifts = phasecorr(&batch, &masks, config, backend);
        let mut registered = shift_frames(&batch, &shifts, fill);
        for frame in registered.iter_mut() {
            frame.mapv_inplace(|v| v.min(CLIP_MAX));
            mean_sum.zip_mut_with(frame, |m, &v| *m += v as f64);
        }
        writer.write_frames(&registered)?;
        for s in &shifts {
            yoff.push(s.dy);
            xoff.push(s.dx);
            corr.push(s.corr);
        }
        done += registered.len();
        n_batches += 1;
        if n_batches % PROGRESS_BATCH_INTERVAL == 0 {
            info!(done, n_frames, "registered batch");
        }
        progress(done, n_frames);
    }
    writer.finalize()?;
    let mean_img = mean_sum.mapv(|v| (v / done.max(1) as f64) as f32);

    let mean_img_chan2 = if let Some(reg_chan2) = &paths.reg_chan2 {
        let shifts: Vec<FrameShift> = yoff
            .iter()
            .zip(&xoff)
            .zip(&corr)
            .map(|((&dy, &dx), &c)| FrameShift { dy, dx, corr: c })
            .collect();
        Some(apply_to_channel(
            reg_chan2,
            paths.raw_chan2.as_ref(),
            &shifts,
            bidi,
            fill,
            config,
        )?)
    } else {
        None
    };

    let crop = compute_crop(
        &yoff,
        &xoff,
        &corr,
        &config.manual_bad_frames,
        config.bad_frame_threshold,
        config.ly,
        config.lx,
    );
    info!(frames = done, "registration complete");

    Ok(RegistrationOutcome {
        reference: ref_img,
        mean_img,
        mean_img_chan2,
        yoff,
        xoff,
        corr,
        bidiphase: bidi,
        badframes: crop.badframes,
        yrange: crop.yrange,
        xrange: crop.xrange,
    })
}

/// Shift a secondary channel with the primary channel's offsets. Never
/// re-registered; frame k of each channel was scanned simultaneously.
fn apply_to_channel(
    reg: &PathBuf,
    raw: Option<&PathBuf>,
    shifts: &[FrameShift],
    bidi: i32,
    fill: f32,
    config: &RegistrationConfig,
) -> Result<Array2<f32>> {
    let source = raw.unwrap_or(reg);
    let mut reader = BatchReader::open(source, config.ly, config.lx, config.batch_size)?;
    let mut writer = if raw.is_some() {
        FrameWriter::create(reg)?
    } else {
        FrameWriter::overwrite(reg)?
    };

    let mut mean_sum = Array2::<f64>::zeros((config.ly, config.lx));
    let mut done = 0usize;
    loop {
        let mut batch = reader.next_batch()?;
        if batch.is_empty() {
            break;
        }
        if done + batch.len() > shifts.len() {
            return Err(CalregError::Pipeline(format!(
                "second channel has more frames than the primary ({}+ vs {})",
                done + batch.len(),
                shifts.len()
            )));
        }
        if bidi != 0 {
            for frame in batch.iter_mut() {
                bidiphase::apply(frame, bidi);
            }
        }
        let mut registered = shift_frames(&batch, &shifts[done..done + batch.len()], fill);
        for frame in registered.iter_mut() {
            frame.mapv_inplace(|v| v.min(CLIP_MAX));
            mean_sum.zip_mut_with(frame, |m, &v| *m += v as f64);
        }
        writer.write_frames(&registered)?;
        done += registered.len();
    }
    writer.finalize()?;
    Ok(mean_sum.mapv(|v| (v / done.max(1) as f64) as f32))
}
