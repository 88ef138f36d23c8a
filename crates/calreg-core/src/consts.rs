/// Epsilon floor for phase-only spectrum normalization.
pub const EPS0: f32 = 1e-5;

/// Window length (frames) of the running median used for bad-frame
/// detection and crop computation. Must be odd.
pub const MEDFILT_WINDOW: usize = 101;

/// Upper clip applied to corrected intensities before narrowing back to
/// i16 storage: 2^15 - 2 keeps one step of headroom below i16::MAX.
pub const CLIP_MAX: f32 = 32766.0;

/// Below this many total frames registration aborts.
pub const MIN_FRAMES: usize = 50;

/// Below this many total frames registration proceeds with a warning.
pub const LOW_FRAME_WARNING: usize = 200;

/// Iterations of the realign-and-average reference refinement.
pub const REFINE_ITERATIONS: usize = 8;

/// Frames averaged (and correlations scored) in the greedy seed pick.
pub const INIT_TOP_FRAMES: usize = 20;

/// Half-width (pixels) of the bidirectional-phase search around center.
pub const BIDIPHASE_SEARCH: usize = 10;

/// Emit a progress log line every this many batches.
pub const PROGRESS_BATCH_INTERVAL: usize = 5;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;
