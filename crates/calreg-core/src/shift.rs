use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::phasecorr::FrameShift;

/// Rigid shift: circular shift by `(-dy, -dx)`, then overwrite the rows
/// and columns that wrapped in from the opposite edge with `fill`.
///
/// Safe for shift magnitudes up to and beyond the frame dimensions; a
/// shift of a full dimension fills the whole frame.
pub fn shift_frame(frame: &Array2<f32>, dy: i32, dx: i32, fill: f32) -> Array2<f32> {
    let (ly, lx) = frame.dim();
    let mut out = Array2::from_shape_fn((ly, lx), |(i, j)| {
        let r = (i as i64 + dy as i64).rem_euclid(ly as i64) as usize;
        let c = (j as i64 + dx as i64).rem_euclid(lx as i64) as usize;
        frame[[r, c]]
    });
    for i in 0..ly {
        let src = i as i64 + dy as i64;
        if src < 0 || src >= ly as i64 {
            out.row_mut(i).fill(fill);
        }
    }
    for j in 0..lx {
        let src = j as i64 + dx as i64;
        if src < 0 || src >= lx as i64 {
            out.column_mut(j).fill(fill);
        }
    }
    out
}

/// Apply a per-frame shift to a batch, in parallel above the frame
/// threshold.
pub fn shift_frames(frames: &[Array2<f32>], shifts: &[FrameShift], fill: f32) -> Vec<Array2<f32>> {
    debug_assert_eq!(frames.len(), shifts.len());
    if frames.len() >= PARALLEL_FRAME_THRESHOLD {
        frames
            .par_iter()
            .zip(shifts.par_iter())
            .map(|(frame, s)| shift_frame(frame, s.dy, s.dx, fill))
            .collect()
    } else {
        frames
            .iter()
            .zip(shifts.iter())
            .map(|(frame, s)| shift_frame(frame, s.dy, s.dx, fill))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(ly: usize, lx: usize) -> Array2<f32> {
        Array2::from_shape_fn((ly, lx), |(i, j)| (i * lx + j) as f32)
    }

    #[test]
    fn zero_shift_is_identity() {
        let frame = ramp(8, 6);
        assert_eq!(shift_frame(&frame, 0, 0, -1.0), frame);
    }

    #[test]
    fn positive_shift_moves_content_up_and_fills_bottom() {
        let frame = ramp(6, 6);
        let out = shift_frame(&frame, 2, 0, -1.0);
        // out[i] = frame[i + 2] for rows that stay in bounds
        assert_eq!(out[[0, 3]], frame[[2, 3]]);
        assert_eq!(out[[3, 0]], frame[[5, 0]]);
        // wrapped-in bottom rows filled
        assert_eq!(out[[4, 0]], -1.0);
        assert_eq!(out[[5, 5]], -1.0);
    }

    #[test]
    fn roundtrip_restores_all_but_border() {
        let frame = ramp(16, 16);
        let (dy, dx) = (3, -5);
        let back = shift_frame(&shift_frame(&frame, dy, dx, 0.0), -dy, -dx, 0.0);
        for i in 0..16 {
            for j in 0..16 {
                let border_row = i < 3;
                let border_col = j >= 16 - 5;
                if !border_row && !border_col {
                    assert_eq!(back[[i, j]], frame[[i, j]], "pixel ({}, {})", i, j);
                }
            }
        }
    }

    #[test]
    fn full_dimension_shift_fills_everything() {
        let frame = ramp(4, 4);
        let out = shift_frame(&frame, 4, 0, 9.0);
        assert!(out.iter().all(|&v| v == 9.0));
        let out = shift_frame(&frame, -7, 0, 9.0);
        assert!(out.iter().all(|&v| v == 9.0));
    }
}
