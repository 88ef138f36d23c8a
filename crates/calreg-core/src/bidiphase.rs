use ndarray::Array2;
use num_complex::Complex;
use tracing::info;

use crate::consts::{BIDIPHASE_SEARCH, EPS0};
use crate::fft::{fft1d, fftshift1d, ifft1d};

/// Estimate the column offset between odd and even scan lines of a
/// resonance-scanned movie.
///
/// Each odd/even row pair contributes a phase-normalized 1-D cross
/// spectrum; pairs are averaged across all frames before the inverse
/// transform, so a single consensus offset comes out regardless of
/// per-frame noise. Returns the correction to pass to [`apply`], i.e.
/// the negated measured displacement.
pub fn estimate(frames: &[Array2<f32>]) -> i32 {
    if frames.is_empty() {
        return 0;
    }
    let (ly, lx) = frames[0].dim();
    let n_pairs = ly / 2;
    if n_pairs == 0 || lx < 2 * BIDIPHASE_SEARCH + 1 {
        return 0;
    }

    let mut acc = vec![Complex::new(0.0f32, 0.0); lx];
    let mut odd = vec![Complex::new(0.0f32, 0.0); lx];
    let mut even = vec![Complex::new(0.0f32, 0.0); lx];
    for frame in frames {
        for p in 0..n_pairs {
            for j in 0..lx {
                odd[j] = Complex::new(frame[[2 * p + 1, j]], 0.0);
                even[j] = Complex::new(frame[[2 * p, j]], 0.0);
            }
            fft1d(&mut odd);
            fft1d(&mut even);
            for j in 0..lx {
                let o = odd[j] / (EPS0 + odd[j].norm());
                let e = (even[j] / (EPS0 + even[j].norm())).conj();
                acc[j] += o * e;
            }
        }
    }
    let scale = 1.0 / (n_pairs * frames.len()) as f32;
    for v in acc.iter_mut() {
        *v *= scale;
    }
    ifft1d(&mut acc);

    let cc = fftshift1d(&acc.iter().map(|v| v.re).collect::<Vec<_>>());
    let center = lx / 2;
    let mut best = f32::NEG_INFINITY;
    let mut at = 0i32;
    for (k, &v) in cc[center - BIDIPHASE_SEARCH..=center + BIDIPHASE_SEARCH]
        .iter()
        .enumerate()
    {
        if v > best {
            best = v;
            at = k as i32 - BIDIPHASE_SEARCH as i32;
        }
    }
    let bidiphase = -at;
    info!(bidiphase, "estimated bidirectional phase offset");
    bidiphase
}

/// Shift the odd scan lines of `frame` by `bidiphase` columns, without
/// wrap-around; pixels shifted in from outside keep their prior values.
/// No-op for a zero offset. The last row of an odd-height frame has no
/// partner and is left untouched.
pub fn apply(frame: &mut Array2<f32>, bidiphase: i32) {
    if bidiphase == 0 {
        return;
    }
    let (ly, lx) = frame.dim();
    let b = bidiphase.unsigned_abs() as usize;
    if b >= lx {
        return;
    }
    let n_pairs = ly / 2;
    for p in 0..n_pairs {
        let i = 2 * p + 1;
        if bidiphase > 0 {
            for j in (b..lx).rev() {
                frame[[i, j]] = frame[[i, j - b]];
            }
        } else {
            for j in 0..lx - b {
                frame[[i, j]] = frame[[i, j + b]];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scene with column structure, odd rows circularly displaced by
    /// `offset` so the cross spectrum carries a pure phase ramp.
    fn striped_frame(ly: usize, lx: usize, offset: i32) -> Array2<f32> {
        let profile: Vec<f32> = (0..lx)
            .map(|j| {
                let x = j as f32 / 6.0;
                100.0 + 50.0 * (x.sin() + (2.3 * x).cos())
            })
            .collect();
        Array2::from_shape_fn((ly, lx), |(i, j)| {
            if i % 2 == 1 {
                profile[(j as i32 - offset).rem_euclid(lx as i32) as usize]
            } else {
                profile[j]
            }
        })
    }

    #[test]
    fn estimates_injected_offset() {
        for offset in [-3i32, -1, 2, 4] {
            let frames: Vec<_> = (0..4).map(|_| striped_frame(32, 96, offset)).collect();
            assert_eq!(estimate(&frames), -offset, "offset {}", offset);
        }
    }

    #[test]
    fn aligned_lines_estimate_zero() {
        let frames = vec![striped_frame(32, 96, 0); 3];
        assert_eq!(estimate(&frames), 0);
    }

    #[test]
    fn apply_zero_is_noop() {
        let mut frame = striped_frame(16, 64, 0);
        let copy = frame.clone();
        apply(&mut frame, 0);
        assert_eq!(frame, copy);
    }

    #[test]
    fn apply_only_touches_odd_rows() {
        let mut frame = Array2::from_shape_fn((8, 32), |(i, j)| (i * 32 + j) as f32);
        let copy = frame.clone();
        apply(&mut frame, 2);
        for j in 0..32 {
            assert_eq!(frame[[0, j]], copy[[0, j]]);
            assert_eq!(frame[[4, j]], copy[[4, j]]);
        }
        for j in 2..32 {
            assert_eq!(frame[[1, j]], copy[[1, j - 2]]);
        }
        // columns below the shift keep their prior content
        assert_eq!(frame[[1, 0]], copy[[1, 0]]);
        assert_eq!(frame[[1, 1]], copy[[1, 1]]);
    }

    #[test]
    fn estimate_then_apply_realigns_lines() {
        let frames: Vec<_> = (0..3).map(|_| striped_frame(32, 96, 3)).collect();
        let b = estimate(&frames);
        let mut frame = frames[0].clone();
        apply(&mut frame, b);
        // interior columns of odd rows now match their even partners
        for j in 10..86 {
            assert!((frame[[1, j]] - frame[[0, j]]).abs() < 1e-3, "col {}", j);
        }
    }
}
