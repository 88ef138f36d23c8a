pub mod error;
pub mod consts;
pub mod config;
pub mod fft;
pub mod filters;
pub mod masks;
pub mod phasecorr;
pub mod shift;
pub mod bidiphase;
pub mod reference;
pub mod io;
pub mod pipeline;
pub mod crop;
