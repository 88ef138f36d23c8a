use ndarray::Array2;

use crate::config::OnePhotonConfig;
use crate::fft::{ifftshift2, FftBackend};

/// Gaussian smoothing kernel of std `sig` in the frequency domain.
///
/// The kernel is built centered, normalized to unit sum, rotated to the
/// origin and transformed; only the real part is meaningful, the
/// imaginary residue from numerical asymmetry is discarded.
pub fn gaussian_fft(sig: f32, ly: usize, lx: usize, backend: &dyn FftBackend) -> Array2<f32> {
    let cy = (ly as f32 - 1.0) / 2.0;
    let cx = (lx as f32 - 1.0) / 2.0;
    let mut kernel = Array2::from_shape_fn((ly, lx), |(i, j)| {
        let dy = (i as f32 - cy) / sig;
        let dx = (j as f32 - cx) / sig;
        (-dy * dy / 2.0).exp() * (-dx * dx / 2.0).exp()
    });
    let sum: f32 = kernel.sum();
    kernel.mapv_inplace(|v| v / sum);
    let spec = backend.fft2(&ifftshift2(&kernel), (ly, lx));
    spec.mapv(|c| c.re)
}

/// Edge taper: logistic roll-off of width ~`2 * sig` along each border,
/// combined multiplicatively across axes. ~1 in the interior, smoothly
/// approaching 0 at the edges.
pub fn spatial_taper(sig: f32, ly: usize, lx: usize) -> Array2<f32> {
    let cy = (ly as f32 - 1.0) / 2.0;
    let cx = (lx as f32 - 1.0) / 2.0;
    let my = cy - 2.0 * sig;
    let mx = cx - 2.0 * sig;
    Array2::from_shape_fn((ly, lx), |(i, j)| {
        let dy = (i as f32 - cy).abs();
        let dx = (j as f32 - cx).abs();
        let mask_y = 1.0 / (1.0 + ((dy - my) / sig).exp());
        let mask_x = 1.0 / (1.0 + ((dx - mx) / sig).exp());
        mask_y * mask_x
    })
}

/// Box smoothing with window `n` (even) and zero padding of `n/2` on
/// each side, separable over rows then columns.
pub fn spatial_smooth(data: &Array2<f32>, n: usize) -> Array2<f32> {
    let smoothed = box_filter_axis0(data, n);
    box_filter_axis1(&smoothed, n)
}

/// High-pass: subtract the box smoothing, renormalized near the borders
/// where the zero padding bleeds into the window.
pub fn spatial_high_pass(data: &Array2<f32>, n: usize) -> Array2<f32> {
    let norm = spatial_smooth(&Array2::ones(data.dim()), n);
    let smooth = spatial_smooth(data, n);
    data - &(smooth / norm)
}

/// One-photon pre-filtering: optional box pre-smooth, then spatial
/// high-pass. Windows are rounded up to even. Applied to correlation
/// inputs only; the frames written out stay unfiltered.
pub fn one_photon_preprocess(data: &Array2<f32>, config: &OnePhotonConfig) -> Array2<f32> {
    let mut out;
    if config.pre_smooth > 0 {
        out = spatial_smooth(data, round_up_even(config.pre_smooth));
    } else {
        out = data.clone();
    }
    out = spatial_high_pass(&out, round_up_even(config.spatial_hp));
    out
}

fn round_up_even(n: usize) -> usize {
    n.div_ceil(2) * 2
}

// Output row k averages input rows (k+1-n/2 ..= k+n/2), missing rows
// counting as zero.
fn box_filter_axis0(data: &Array2<f32>, n: usize) -> Array2<f32> {
    let (ly, lx) = data.dim();
    let half = (n / 2) as isize;
    let mut out = Array2::<f32>::zeros((ly, lx));
    for k in 0..ly {
        let lo = (k as isize + 1 - half).max(0) as usize;
        let hi = ((k as isize + half) as usize).min(ly - 1);
        for r in lo..=hi {
            for j in 0..lx {
                out[[k, j]] += data[[r, j]];
            }
        }
    }
    out.mapv_inplace(|v| v / n as f32);
    out
}

fn box_filter_axis1(data: &Array2<f32>, n: usize) -> Array2<f32> {
    let (ly, lx) = data.dim();
    let half = (n / 2) as isize;
    let mut out = Array2::<f32>::zeros((ly, lx));
    for k in 0..lx {
        let lo = (k as isize + 1 - half).max(0) as usize;
        let hi = ((k as isize + half) as usize).min(lx - 1);
        for i in 0..ly {
            for c in lo..=hi {
                out[[i, k]] += data[[i, c]];
            }
        }
    }
    out.mapv_inplace(|v| v / n as f32);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::CpuFftBackend;

    #[test]
    fn taper_is_bounded_and_shaped() {
        let sig = 3.0f32;
        let mask = spatial_taper(sig, 64, 64);
        for &v in mask.iter() {
            assert!((0.0..=1.0).contains(&v), "taper value {} out of range", v);
        }
        assert!(mask[[32, 32]] > 0.99, "center should be ~1");
        assert!(mask[[0, 32]] < 0.15, "edge should be ~0");
        assert!(mask[[32, 0]] < 0.15, "edge should be ~0");
        // roll-off confined to ~2*sig of the border
        assert!(mask[[(2.5 * sig) as usize + 2, 32]] > 0.5);
    }

    #[test]
    fn gaussian_fft_is_unit_dc_lowpass() {
        let fhg = gaussian_fft(1.15, 32, 32, &CpuFftBackend);
        // unit-sum kernel keeps the DC bin at 1
        assert!((fhg[[0, 0]] - 1.0).abs() < 1e-4);
        // attenuates the highest frequency
        assert!(fhg[[16, 16]].abs() < 0.5);
    }

    #[test]
    fn spatial_smooth_preserves_constant_interior() {
        let data = Array2::<f32>::ones((32, 32));
        let smooth = spatial_smooth(&data, 4);
        assert!((smooth[[16, 16]] - 1.0).abs() < 1e-6);
        // zero padding pulls the borders down
        assert!(smooth[[0, 16]] < 1.0);
    }

    #[test]
    fn high_pass_removes_flat_background() {
        let data = Array2::<f32>::from_elem((32, 32), 7.0);
        let hp = spatial_high_pass(&data, 8);
        for &v in hp.iter() {
            assert!(v.abs() < 1e-4, "flat input should high-pass to ~0, got {}", v);
        }
    }
}
