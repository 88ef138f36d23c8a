use serde::{Deserialize, Serialize};

/// Immutable per-run registration parameters.
///
/// Every recognized option is an always-present field with a defined
/// default; run products (offsets, mean image, crop) live in
/// [`crate::pipeline::RegistrationOutcome`], never here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Frame height in pixels.
    pub ly: usize,
    /// Frame width in pixels.
    pub lx: usize,
    /// Frames read, registered and written per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum allowed shift as a fraction of the larger frame dimension.
    #[serde(default = "default_max_shift_fraction")]
    pub max_shift_fraction: f32,
    /// Normalize spectra to phase-only before correlating.
    #[serde(default = "default_true")]
    pub phase_correlation: bool,
    /// Gaussian band-limit width (pixels) for the correlation surface.
    #[serde(default = "default_smooth_sigma")]
    pub smooth_sigma: f32,
    /// Zero-pad FFTs to the next 5-smooth size.
    #[serde(default = "default_true")]
    pub pad_fft: bool,
    /// Frames subsampled for the initial reference bootstrap.
    #[serde(default = "default_n_init_frames")]
    pub n_init_frames: usize,
    /// Bad-frame deviation threshold; a frame is flagged when its
    /// deviation score exceeds `threshold * 100`.
    #[serde(default = "default_bad_frame_threshold")]
    pub bad_frame_threshold: f32,
    /// Channels recorded in the movie (a second channel is shifted with
    /// the primary channel's offsets, never re-registered).
    #[serde(default = "default_one")]
    pub n_channels: usize,
    /// 1-based channel whose movie drives the registration.
    #[serde(default = "default_one")]
    pub align_channel: usize,
    /// Worker threads for per-frame correlation; defaults to half the
    /// logical cores.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Externally supplied bad-frame indices, unioned into the computed
    /// bad-frame flags.
    #[serde(default)]
    pub manual_bad_frames: Vec<usize>,
    #[serde(default)]
    pub one_photon: OnePhotonConfig,
    #[serde(default)]
    pub bidiphase: BidiphaseConfig,
}

impl RegistrationConfig {
    pub fn new(ly: usize, lx: usize) -> Self {
        Self {
            ly,
            lx,
            batch_size: default_batch_size(),
            max_shift_fraction: default_max_shift_fraction(),
            phase_correlation: true,
            smooth_sigma: default_smooth_sigma(),
            pad_fft: true,
            n_init_frames: default_n_init_frames(),
            bad_frame_threshold: default_bad_frame_threshold(),
            n_channels: 1,
            align_channel: 1,
            threads: None,
            manual_bad_frames: Vec::new(),
            one_photon: OnePhotonConfig::default(),
            bidiphase: BidiphaseConfig::default(),
        }
    }
}

/// One-photon spatial pre-filtering applied before mask building and
/// correlation (never to the written frames).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnePhotonConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Box pre-smoothing window (pixels, rounded up to even); 0 disables.
    #[serde(default)]
    pub pre_smooth: usize,
    /// Spatial high-pass window (pixels, rounded up to even).
    #[serde(default = "default_spatial_hp")]
    pub spatial_hp: usize,
    /// Explicit edge-taper width used instead of `3 * smooth_sigma`.
    #[serde(default = "default_spatial_taper")]
    pub spatial_taper_width: f32,
}

impl Default for OnePhotonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pre_smooth: 0,
            spatial_hp: default_spatial_hp(),
            spatial_taper_width: default_spatial_taper(),
        }
    }
}

/// Line-scanning bidirectional phase correction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BidiphaseConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Precomputed column offset between odd and even scan lines; when
    /// absent it is estimated once from the bootstrap sample.
    #[serde(default)]
    pub offset: Option<i32>,
}

fn default_batch_size() -> usize {
    500
}

fn default_max_shift_fraction() -> f32 {
    0.1
}

fn default_smooth_sigma() -> f32 {
    1.15
}

fn default_n_init_frames() -> usize {
    200
}

fn default_bad_frame_threshold() -> f32 {
    1.0
}

fn default_spatial_hp() -> usize {
    25
}

fn default_spatial_taper() -> f32 {
    40.0
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}
