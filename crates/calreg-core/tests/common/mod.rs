#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array2;
use tempfile::TempDir;

use calreg_core::shift::shift_frame;

pub const LY: usize = 48;
pub const LX: usize = 48;
pub const BACKGROUND: f32 = 120.0;

/// A two-blob scene with enough structure for unambiguous correlation.
pub fn scene() -> Array2<f32> {
    let mut img = Array2::<f32>::from_elem((LY, LX), BACKGROUND);
    for i in 14..24 {
        for j in 10..20 {
            img[[i, j]] = 800.0;
        }
    }
    for i in 30..36 {
        for j in 28..40 {
            img[[i, j]] = 550.0;
        }
    }
    img
}

/// Deterministic small jitter cycle for frame `k`.
pub fn jitter(k: usize) -> (i32, i32) {
    const CYCLE: [(i32, i32); 6] = [(0, 0), (1, -1), (-2, 1), (0, 2), (2, 0), (-1, -2)];
    CYCLE[k % CYCLE.len()]
}

/// Frame `k` of the synthetic movie: the scene displaced by `jitter(k)`.
pub fn jittered_frame(k: usize) -> Array2<f32> {
    let (dy, dx) = jitter(k);
    shift_frame(&scene(), -dy, -dx, BACKGROUND)
}

pub fn write_movie(path: &Path, frames: &[Array2<f32>]) {
    let mut bytes = Vec::with_capacity(frames.len() * LY * LX * 2);
    for frame in frames {
        for &v in frame.iter() {
            bytes.extend_from_slice(&(v as i16).to_le_bytes());
        }
    }
    let mut file = File::create(path).unwrap();
    file.write_all(&bytes).unwrap();
}

pub fn read_movie(path: &Path, ly: usize, lx: usize) -> Vec<Array2<f32>> {
    let bytes = std::fs::read(path).unwrap();
    let frame_bytes = ly * lx * 2;
    assert_eq!(bytes.len() % frame_bytes, 0, "movie file misaligned");
    bytes
        .chunks(frame_bytes)
        .map(|chunk| {
            let mut raw = vec![0i16; ly * lx];
            LittleEndian::read_i16_into(chunk, &mut raw);
            Array2::from_shape_vec((ly, lx), raw.into_iter().map(f32::from).collect()).unwrap()
        })
        .collect()
}

/// Write an `n_frames`-long jittered movie into `dir` and return its path.
pub fn make_jittered_movie(dir: &TempDir, name: &str, n_frames: usize) -> PathBuf {
    let frames: Vec<_> = (0..n_frames).map(jittered_frame).collect();
    let path = dir.path().join(name);
    write_movie(&path, &frames);
    path
}
