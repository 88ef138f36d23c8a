use tracing::info;

use crate::consts::MEDFILT_WINDOW;

/// Crop bounds and per-frame quality flags derived from the recorded
/// offsets after a run.
#[derive(Clone, Debug)]
pub struct CropResult {
    /// Frames whose offsets deviate too far from the local trend to be
    /// trusted (manual flags included).
    pub badframes: Vec<bool>,
    /// Valid row range `[ymin, ymax)` after shifting.
    pub yrange: [i64; 2],
    /// Valid column range `[xmin, xmax)` after shifting.
    pub xrange: [i64; 2],
}

/// Sliding median with an odd window, edges padded by repeating the
/// first/last sample so the output length matches the input.
pub fn medfilt(x: &[f32], window: usize) -> Vec<f32> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let half = window / 2;
    let mut out = Vec::with_capacity(n);
    let mut buf = Vec::with_capacity(window);
    for k in 0..n {
        buf.clear();
        for off in 0..window {
            let idx = (k + off) as isize - half as isize;
            let idx = idx.clamp(0, n as isize - 1) as usize;
            buf.push(x[idx]);
        }
        buf.sort_by(f32::total_cmp);
        out.push(buf[window / 2]);
    }
    out
}

/// Flag unreliable frames and derive the largest rectangle every
/// trusted frame fully covers after shifting.
///
/// A frame's deviation score is its offset distance from the local
/// median trend, normalized by the run average, divided by its local
/// correlation ratio; scores above `threshold * 100` mark the frame
/// bad. The row/column ranges shrink by the extreme offsets so that no
/// retained pixel was filled rather than imaged.
pub fn compute_crop(
    yoff: &[i32],
    xoff: &[i32],
    corr: &[f32],
    manual_bad: &[usize],
    threshold: f32,
    ly: usize,
    lx: usize,
) -> CropResult {
    let n = yoff.len();
    let yf: Vec<f32> = yoff.iter().map(|&v| v as f32).collect();
    let xf: Vec<f32> = xoff.iter().map(|&v| v as f32).collect();
    let ymed = medfilt(&yf, MEDFILT_WINDOW);
    let xmed = medfilt(&xf, MEDFILT_WINDOW);
    let cmed = medfilt(corr, MEDFILT_WINDOW);

    let mut dxy: Vec<f32> = (0..n)
        .map(|k| (yf[k] - ymed[k]).hypot(xf[k] - xmed[k]))
        .collect();
    let dxy_mean = dxy.iter().sum::<f32>() / n.max(1) as f32;
    if dxy_mean > 0.0 {
        for v in dxy.iter_mut() {
            *v /= dxy_mean;
        }
    }

    let mut badframes = vec![false; n];
    for k in 0..n {
        let cxy = if cmed[k] != 0.0 { corr[k] / cmed[k] } else { 0.0 };
        let px = dxy[k] / cxy.max(0.0);
        badframes[k] = px > threshold * 100.0;
    }
    for &k in manual_bad {
        if k < n {
            badframes[k] = true;
        }
    }
    let n_bad = badframes.iter().filter(|&&b| b).count();
    // flags are never unset once raised; with no trusted frame left the
    // near-edge bounds fall back to the whole run
    let any_good = n_bad < n;
    let good = |k: usize| !badframes[k] || !any_good;
    let ymin = (0..n)
        .filter(|&k| good(k))
        .map(|k| yoff[k] as i64)
        .max()
        .unwrap_or(0)
        .max(0);
    let xmin = (0..n)
        .filter(|&k| good(k))
        .map(|k| xoff[k] as i64)
        .max()
        .unwrap_or(0)
        .max(0);
    // the upper bounds come from all frames, bad ones included
    let ymax = ly as i64 + yoff.iter().map(|&v| v as i64).min().unwrap_or(0).min(0);
    let xmax = lx as i64 + xoff.iter().map(|&v| v as i64).min().unwrap_or(0).min(0);

    info!(
        n_bad,
        ymin, ymax, xmin, xmax, "derived crop bounds and frame flags"
    );
    CropResult {
        badframes,
        yrange: [ymin, ymax],
        xrange: [xmin, xmax],
    }
}
