use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Forward/inverse 2-D transform strategy behind mask building and phase
/// correlation. Selected once per run and injected at construction; an
/// alternate implementation (e.g. a GPU planner) must satisfy the same
/// contract.
pub trait FftBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Forward 2-D FFT of a real image, zero-padded to `shape`.
    fn fft2(&self, data: &Array2<f32>, shape: (usize, usize)) -> Array2<Complex<f32>>;

    /// Inverse 2-D FFT, returning the real part scaled by `1/(h*w)`.
    fn ifft2(&self, data: &Array2<Complex<f32>>) -> Array2<f32>;
}

/// CPU backend: rustfft planners, row pass then column pass, with Rayon
/// across rows/columns above a pixel-count threshold.
pub struct CpuFftBackend;

impl FftBackend for CpuFftBackend {
    fn name(&self) -> &str {
        "CPU/rustfft"
    }

    fn fft2(&self, data: &Array2<f32>, shape: (usize, usize)) -> Array2<Complex<f32>> {
        let (h, w) = shape;
        let (dh, dw) = data.dim();
        let mut work = Array2::<Complex<f32>>::zeros((h, w));
        for r in 0..dh.min(h) {
            for c in 0..dw.min(w) {
                work[[r, c]] = Complex::new(data[[r, c]], 0.0);
            }
        }

        let mut planner = FftPlanner::new();
        let fft_row = planner.plan_fft_forward(w);
        let fft_col = planner.plan_fft_forward(h);
        let parallel = h * w >= PARALLEL_PIXEL_THRESHOLD;
        process_rows(&mut work, &fft_row, parallel);
        process_cols(&mut work, &fft_col, parallel);
        work
    }

    fn ifft2(&self, data: &Array2<Complex<f32>>) -> Array2<f32> {
        let (h, w) = data.dim();
        let mut work = data.clone();

        let mut planner = FftPlanner::new();
        let ifft_row = planner.plan_fft_inverse(w);
        let ifft_col = planner.plan_fft_inverse(h);
        let parallel = h * w >= PARALLEL_PIXEL_THRESHOLD;
        process_cols(&mut work, &ifft_col, parallel);
        process_rows(&mut work, &ifft_row, parallel);

        let scale = 1.0 / (h * w) as f32;
        work.mapv(|v| v.re * scale)
    }
}

fn process_rows(work: &mut Array2<Complex<f32>>, fft: &Arc<dyn Fft<f32>>, parallel: bool) {
    let (h, w) = work.dim();
    if parallel {
        let rows: Vec<Vec<Complex<f32>>> = (0..h)
            .into_par_iter()
            .map(|r| {
                let mut buf: Vec<Complex<f32>> = (0..w).map(|c| work[[r, c]]).collect();
                fft.process(&mut buf);
                buf
            })
            .collect();
        for (r, buf) in rows.into_iter().enumerate() {
            for (c, v) in buf.into_iter().enumerate() {
                work[[r, c]] = v;
            }
        }
    } else {
        let mut buf = vec![Complex::zero(); w];
        for r in 0..h {
            for c in 0..w {
                buf[c] = work[[r, c]];
            }
            fft.process(&mut buf);
            for c in 0..w {
                work[[r, c]] = buf[c];
            }
        }
    }
}

fn process_cols(work: &mut Array2<Complex<f32>>, fft: &Arc<dyn Fft<f32>>, parallel: bool) {
    let (h, w) = work.dim();
    if parallel {
        let cols: Vec<Vec<Complex<f32>>> = (0..w)
            .into_par_iter()
            .map(|c| {
                let mut buf: Vec<Complex<f32>> = (0..h).map(|r| work[[r, c]]).collect();
                fft.process(&mut buf);
                buf
            })
            .collect();
        for (c, buf) in cols.into_iter().enumerate() {
            for (r, v) in buf.into_iter().enumerate() {
                work[[r, c]] = v;
            }
        }
    } else {
        let mut buf = vec![Complex::zero(); h];
        for c in 0..w {
            for r in 0..h {
                buf[r] = work[[r, c]];
            }
            fft.process(&mut buf);
            for r in 0..h {
                work[[r, c]] = buf[r];
            }
        }
    }
}

/// Forward 1-D FFT in place.
pub fn fft1d(data: &mut [Complex<f32>]) {
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(data.len()).process(data);
}

/// Inverse 1-D FFT in place, scaled by `1/n`.
pub fn ifft1d(data: &mut [Complex<f32>]) {
    let n = data.len();
    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(n).process(data);
    let scale = 1.0 / n as f32;
    for v in data.iter_mut() {
        *v *= scale;
    }
}

/// Circular roll by `(sy, sx)`: `out[i] = in[(i - s) mod n]` per axis.
pub(crate) fn roll2<T: Copy>(data: &Array2<T>, sy: usize, sx: usize) -> Array2<T> {
    let (h, w) = data.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        data[[(i + h - sy) % h, (j + w - sx) % w]]
    })
}

/// Move the zero-shift bin to the array center.
pub fn fftshift2(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    roll2(data, h / 2, w / 2)
}

/// Inverse of [`fftshift2`]: move the center bin back to the origin.
pub fn ifftshift2(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    roll2(data, (h - h / 2) % h, (w - w / 2) % w)
}

/// 1-D fftshift.
pub fn fftshift1d(data: &[f32]) -> Vec<f32> {
    let n = data.len();
    let s = n / 2;
    (0..n).map(|i| data[(i + n - s) % n]).collect()
}

/// Smallest 5-smooth integer (2^a * 3^b * 5^c) not less than `target`,
/// the sizes rustfft handles fastest.
pub fn next_fast_len(target: usize) -> usize {
    if target <= 6 {
        return target.max(1);
    }
    let mut best = usize::MAX;
    let mut p5 = 1usize;
    while p5 < best {
        let mut p35 = p5;
        while p35 < best {
            let quotient = target.div_ceil(p35);
            let mut p2 = 1usize;
            while p2 < quotient {
                p2 *= 2;
            }
            let n = p2 * p35;
            if n == target {
                return n;
            }
            if n < best {
                best = n;
            }
            p35 = match p35.checked_mul(3) {
                Some(v) => v,
                None => break,
            };
        }
        p5 = match p5.checked_mul(5) {
            Some(v) => v,
            None => break,
        };
    }
    best
}
