use ndarray::Array2;
use rayon::prelude::*;

use crate::config::RegistrationConfig;
use crate::consts::{EPS0, PARALLEL_FRAME_THRESHOLD};
use crate::fft::{fftshift2, FftBackend};
use crate::filters::one_photon_preprocess;
use crate::masks::MaskSet;

/// Per-frame registration result: the rigid offset that moves the frame
/// onto the reference, and the peak correlation supporting it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameShift {
    pub dy: i32,
    pub dx: i32,
    pub corr: f32,
}

/// Estimate the rigid shift of each frame against the reference masks.
///
/// Frames are independent; batches above the frame threshold fan out
/// over the Rayon pool installed by the caller.
pub fn phasecorr(
    frames: &[Array2<f32>],
    masks: &MaskSet,
    config: &RegistrationConfig,
    backend: &dyn FftBackend,
) -> Vec<FrameShift> {
    if frames.len() >= PARALLEL_FRAME_THRESHOLD {
        frames
            .par_iter()
            .map(|frame| phasecorr_frame(frame, masks, config, backend))
            .collect()
    } else {
        frames
            .iter()
            .map(|frame| phasecorr_frame(frame, masks, config, backend))
            .collect()
    }
}

fn phasecorr_frame(
    frame: &Array2<f32>,
    masks: &MaskSet,
    config: &RegistrationConfig,
    backend: &dyn FftBackend,
) -> FrameShift {
    let (ly, lx) = frame.dim();
    let lcorr = shift_search_radius(ly, lx, config.max_shift_fraction);

    let filtered;
    let frame = if config.one_photon.enabled {
        filtered = one_photon_preprocess(frame, &config.one_photon);
        &filtered
    } else {
        frame
    };

    // taper toward the reference mean before transforming
    let mut masked = frame * &masks.mask_mul;
    masked += &masks.mask_offset;

    let mut spec = backend.fft2(&masked, masks.shape());
    if config.phase_correlation {
        spec.mapv_inplace(|c| c / (EPS0 + c.norm()));
    }
    spec.zip_mut_with(&masks.cf_ref, |c, &r| *c *= r);

    let cc = fftshift2(&backend.ifft2(&spec));
    let (ph, pw) = cc.dim();
    let (cy, cx) = (ph / 2, pw / 2);
    // the window must also fit the correlation surface itself; on even
    // dimensions the full half-width would run one row past the edge
    let lcorr = lcorr
        .min(cy.min(ph - 1 - cy))
        .min(cx.min(pw - 1 - cx));

    // peak within the admissible window, centered on zero shift
    let mut best = f32::NEG_INFINITY;
    let mut worst = f32::INFINITY;
    let (mut by, mut bx) = (0i32, 0i32);
    for wy in 0..=(2 * lcorr) {
        for wx in 0..=(2 * lcorr) {
            let v = cc[[cy - lcorr + wy, cx - lcorr + wx]];
            if v > best {
                best = v;
                by = wy as i32 - lcorr as i32;
                bx = wx as i32 - lcorr as i32;
            }
            if v < worst {
                worst = v;
            }
        }
    }
    if best == worst {
        // featureless surface, no evidence of any displacement
        return FrameShift {
            dy: 0,
            dx: 0,
            corr: best,
        };
    }
    FrameShift {
        dy: by,
        dx: bx,
        corr: best,
    }
}

/// Half-width of the peak search window: the configured fraction of the
/// larger dimension, capped so the window stays inside the frame.
pub fn shift_search_radius(ly: usize, lx: usize, max_shift_fraction: f32) -> usize {
    let by_fraction = (max_shift_fraction * ly.max(lx) as f32).round() as usize;
    by_fraction.min(ly.min(lx) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::CpuFftBackend;
    use crate::masks::prepare_masks;
    use crate::shift::shift_frame;

    fn square_scene(ly: usize, lx: usize) -> Array2<f32> {
        let mut img = Array2::<f32>::from_elem((ly, lx), 100.0);
        for i in ly / 2 - 6..ly / 2 + 6 {
            for j in lx / 2 - 6..lx / 2 + 6 {
                img[[i, j]] = 900.0;
            }
        }
        img
    }

    #[test]
    fn search_radius_respects_both_limits() {
        assert_eq!(shift_search_radius(512, 512, 0.1), 51);
        // capped by the smaller dimension
        assert_eq!(shift_search_radius(10, 512, 0.1), 5);
        assert_eq!(shift_search_radius(64, 64, 0.1), 6);
    }

    #[test]
    fn recovers_known_integer_shift() {
        let ref_img = square_scene(64, 64);
        let config = RegistrationConfig::new(64, 64);
        let masks = prepare_masks(&ref_img, &config, &CpuFftBackend);

        // frame displaced by (+3, +5) relative to the reference
        let moved = shift_frame(&ref_img, -3, -5, 100.0);
        let shifts = phasecorr(&[moved], &masks, &config, &CpuFftBackend);
        assert_eq!(shifts[0].dy, 3);
        assert_eq!(shifts[0].dx, 5);
    }

    #[test]
    fn aligned_frame_reports_zero_shift() {
        let ref_img = square_scene(64, 64);
        let config = RegistrationConfig::new(64, 64);
        let masks = prepare_masks(&ref_img, &config, &CpuFftBackend);
        let shifts = phasecorr(&[ref_img.clone()], &masks, &config, &CpuFftBackend);
        assert_eq!(shifts[0].dy, 0);
        assert_eq!(shifts[0].dx, 0);
        assert!(shifts[0].corr > 0.0);
    }

    #[test]
    fn half_frame_search_window_stays_on_the_surface() {
        // a 0.5 fraction saturates the radius at min(Ly, Lx)/2, which on
        // even dimensions reaches exactly one row past the surface
        let ref_img = square_scene(64, 64);
        let mut config = RegistrationConfig::new(64, 64);
        config.max_shift_fraction = 0.5;
        let masks = prepare_masks(&ref_img, &config, &CpuFftBackend);

        let moved = shift_frame(&ref_img, -3, -5, 100.0);
        let shifts = phasecorr(&[moved], &masks, &config, &CpuFftBackend);
        assert_eq!(shifts[0].dy, 3);
        assert_eq!(shifts[0].dx, 5);
    }

    #[test]
    fn shift_beyond_window_is_clamped_inside_it() {
        let ref_img = square_scene(64, 64);
        let config = RegistrationConfig::new(64, 64);
        let lcorr = shift_search_radius(64, 64, config.max_shift_fraction) as i32;
        let masks = prepare_masks(&ref_img, &config, &CpuFftBackend);

        let moved = shift_frame(&ref_img, -(lcorr + 8), 0, 100.0);
        let shifts = phasecorr(&[moved], &masks, &config, &CpuFftBackend);
        assert!(shifts[0].dy.abs() <= lcorr);
        assert!(shifts[0].dx.abs() <= lcorr);
    }

    #[test]
    fn registered_shifts_undo_displacement() {
        let ref_img = square_scene(64, 64);
        let config = RegistrationConfig::new(64, 64);
        let masks = prepare_masks(&ref_img, &config, &CpuFftBackend);

        for (dy, dx) in [(2, 0), (0, -4), (-3, 3)] {
            let moved = shift_frame(&ref_img, -dy, -dx, 100.0);
            let s = phasecorr(&[moved.clone()], &masks, &config, &CpuFftBackend)[0];
            let restored = shift_frame(&moved, s.dy, s.dx, 100.0);
            // interior pixels must match the reference exactly
            assert_eq!(restored[[32, 32]], ref_img[[32, 32]]);
            assert_eq!(restored[[28, 28]], ref_img[[28, 28]]);
        }
    }
}
