use ndarray::Array2;
use num_complex::Complex;

use crate::config::RegistrationConfig;
use crate::consts::EPS0;
use crate::fft::{next_fast_len, FftBackend};
use crate::filters::{gaussian_fft, one_photon_preprocess, spatial_taper};

/// Everything phase correlation needs about a reference image, derived
/// deterministically from it and the active configuration. Immutable
/// once built; rebuilt whenever the reference changes.
#[derive(Clone, Debug)]
pub struct MaskSet {
    /// Multiplicative edge taper, Ly x Lx, in [0, 1].
    pub mask_mul: Array2<f32>,
    /// Additive offset pulling tapered regions toward the reference mean.
    pub mask_offset: Array2<f32>,
    /// Conjugated, optionally phase-normalized, band-limited reference
    /// spectrum at the (possibly padded) FFT size.
    pub cf_ref: Array2<Complex<f32>>,
}

impl MaskSet {
    /// FFT size used for correlation (padded when `pad_fft` is set).
    pub fn shape(&self) -> (usize, usize) {
        self.cf_ref.dim()
    }
}

/// Build the mask triple for a reference image.
pub fn prepare_masks(
    ref_img: &Array2<f32>,
    config: &RegistrationConfig,
    backend: &dyn FftBackend,
) -> MaskSet {
    let (ly, lx) = ref_img.dim();
    let slope = if config.one_photon.enabled {
        config.one_photon.spatial_taper_width
    } else {
        3.0 * config.smooth_sigma
    };
    let mask_mul = spatial_taper(slope, ly, lx);

    let ref_img = if config.one_photon.enabled {
        one_photon_preprocess(ref_img, &config.one_photon)
    } else {
        ref_img.clone()
    };
    let mean = ref_img.mean().unwrap_or(0.0);
    let mask_offset = mask_mul.mapv(|m| mean * (1.0 - m));

    let shape = if config.pad_fft {
        (next_fast_len(ly), next_fast_len(lx))
    } else {
        (ly, lx)
    };
    let mut cf_ref = backend.fft2(&ref_img, shape);
    cf_ref.mapv_inplace(|c| c.conj());
    if config.phase_correlation {
        cf_ref.mapv_inplace(|c| c / (EPS0 + c.norm()));
    }

    let fhg = gaussian_fft(config.smooth_sigma, shape.0, shape.1, backend);
    cf_ref.zip_mut_with(&fhg, |c, &g| *c *= g);

    MaskSet {
        mask_mul,
        mask_offset,
        cf_ref,
    }
}
