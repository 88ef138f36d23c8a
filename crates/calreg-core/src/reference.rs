use ndarray::Array2;
use tracing::debug;

use crate::config::RegistrationConfig;
use crate::consts::{INIT_TOP_FRAMES, REFINE_ITERATIONS};
use crate::error::{CalregError, Result};
use crate::fft::{roll2, FftBackend};
use crate::masks::prepare_masks;
use crate::phasecorr::phasecorr;
use crate::shift::shift_frames;

/// Seed reference: the average of the frames most mutually correlated
/// with the best-connected frame in the sample.
///
/// Correlations are computed on mean-centered, L2-normalized flattened
/// frames. A frame's connectivity score is the mean of its strongest
/// correlations to other frames (self excluded); the winner's closest
/// partners, itself included, are averaged into the seed with each
/// frame's own mean removed first.
pub fn pick_init_init(frames: &[Array2<f32>]) -> Array2<f32> {
    let n = frames.len();
    let npix = frames[0].len();

    // mean-centered, unit-norm rows
    let mut flat = vec![vec![0.0f32; npix]; n];
    let mut means = vec![0.0f32; n];
    for ((row, frame), m) in flat.iter_mut().zip(frames).zip(means.iter_mut()) {
        let mean = frame.mean().unwrap_or(0.0);
        *m = mean;
        for (v, &p) in row.iter_mut().zip(frame.iter()) {
            *v = p - mean;
        }
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-12);
        for v in row.iter_mut() {
            *v /= norm;
        }
    }

    let mut cc = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        cc[i][i] = 1.0;
        for j in i + 1..n {
            let dot: f32 = flat[i].iter().zip(&flat[j]).map(|(a, b)| a * b).sum();
            cc[i][j] = dot;
            cc[j][i] = dot;
        }
    }

    let top = INIT_TOP_FRAMES.min(n);
    let mut best_score = f32::NEG_INFINITY;
    let mut anchor = 0;
    for (i, row) in cc.iter().enumerate() {
        let mut sorted = row.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        // skip the self correlation at position 0
        let score: f32 = sorted[1..top].iter().sum::<f32>() / (top - 1).max(1) as f32;
        if score > best_score {
            best_score = score;
            anchor = i;
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cc[anchor][b].total_cmp(&cc[anchor][a]));

    // the seed averages the centered frames, so its DC sits near zero
    // until the first refinement pass rebuilds it from raw frames
    let mut seed = Array2::<f32>::zeros(frames[0].dim());
    for &k in &order[..top] {
        let m = means[k];
        seed.zip_mut_with(&frames[k], |s, &v| *s += v - m);
    }
    seed.mapv_inplace(|v| v / top as f32);
    debug!(anchor, top, "seeded reference from correlated frames");
    seed
}

/// Iteratively sharpen the seed reference against the sample.
///
/// Each round registers every sample frame to the current reference and
/// rebuilds it from a growing fraction of the best-correlated corrected
/// frames, then re-centers it by the rounded mean shift of that set so
/// the reference does not drift.
pub fn refine_init(
    frames: &[Array2<f32>],
    mut ref_img: Array2<f32>,
    config: &RegistrationConfig,
    backend: &dyn FftBackend,
) -> Array2<f32> {
    let n = frames.len();
    for iter in 0..REFINE_ITERATIONS {
        let masks = prepare_masks(&ref_img, config, backend);
        let shifts = phasecorr(frames, &masks, config, backend);
        let fill = ref_img.mean().unwrap_or(0.0);
        let corrected = shift_frames(frames, &shifts, fill);

        let mut isort: Vec<usize> = (0..n).collect();
        isort.sort_by(|&a, &b| shifts[b].corr.total_cmp(&shifts[a].corr));
        let nmax = (n * (1 + iter) / (2 * REFINE_ITERATIONS)).max(2).min(n);
        let kept = &isort[1.min(n - 1)..nmax];

        let mut next = Array2::<f32>::zeros(ref_img.dim());
        let mut dy_sum = 0f32;
        let mut dx_sum = 0f32;
        for &k in kept {
            next += &corrected[k];
            dy_sum += shifts[k].dy as f32;
            dx_sum += shifts[k].dx as f32;
        }
        next.mapv_inplace(|v| v / kept.len() as f32);

        // move the reference onto the kept frames' mean position so the
        // net displacement cancels instead of compounding
        let (ly, lx) = next.dim();
        let my = (dy_sum / kept.len() as f32).round() as i64;
        let mx = (dx_sum / kept.len() as f32).round() as i64;
        ref_img = roll2(
            &next,
            my.rem_euclid(ly as i64) as usize,
            mx.rem_euclid(lx as i64) as usize,
        );
    }
    ref_img
}

/// Bootstrap a reference image from a subsampled set of raw frames.
pub fn pick_initial_reference(
    frames: &[Array2<f32>],
    config: &RegistrationConfig,
    backend: &dyn FftBackend,
) -> Result<Array2<f32>> {
    if frames.is_empty() {
        return Err(CalregError::EmptySequence);
    }
    let seed = pick_init_init(frames);
    Ok(refine_init(frames, seed, config, backend))
}
