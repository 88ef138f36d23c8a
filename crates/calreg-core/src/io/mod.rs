//! Raw binary movie access: random-frame reads over a memory map and
//! the sequential batch reader/writer pair the pipeline streams through.

pub mod binary;

pub use binary::{BatchReader, BinaryMovie, FrameWriter};
