use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;
use tracing::debug;

use crate::consts::CLIP_MAX;
use crate::error::{CalregError, Result};

/// A movie stored as a flat stream of little-endian `i16` frames,
/// memory-mapped for random access.
#[derive(Debug)]
pub struct BinaryMovie {
    mmap: Mmap,
    ly: usize,
    lx: usize,
    n_frames: usize,
}

impl BinaryMovie {
    pub fn open(path: impl AsRef<Path>, ly: usize, lx: usize) -> Result<Self> {
        if ly == 0 || lx == 0 {
            return Err(CalregError::InvalidDimensions {
                width: lx,
                height: ly,
            });
        }
        let file = File::open(path)?;
        let size = file.metadata()?.len() as usize;
        let frame_bytes = ly * lx * 2;
        if size % frame_bytes != 0 {
            return Err(CalregError::MisalignedStream { size, frame_bytes });
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            ly,
            lx,
            n_frames: size / frame_bytes,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.n_frames
    }

    pub fn frame_bytes(&self) -> usize {
        self.ly * self.lx * 2
    }

    pub fn read_frame(&self, index: usize) -> Result<Array2<f32>> {
        if index >= self.n_frames {
            return Err(CalregError::FrameIndexOutOfRange {
                index,
                total: self.n_frames,
            });
        }
        let start = index * self.frame_bytes();
        Ok(decode_frame(
            &self.mmap[start..start + self.frame_bytes()],
            self.ly,
            self.lx,
        ))
    }

    /// Up to `n` frames at evenly spaced positions, preserving temporal
    /// order. Duplicate positions from a short movie are dropped.
    pub fn subsample_frames(&self, n: usize) -> Result<Vec<Array2<f32>>> {
        let mut frames = Vec::with_capacity(n.min(self.n_frames));
        let mut last = usize::MAX;
        for j in 0..n {
            let index = j * self.n_frames / n.max(1);
            if index == last || index >= self.n_frames {
                continue;
            }
            last = index;
            frames.push(self.read_frame(index)?);
        }
        debug!(requested = n, got = frames.len(), "subsampled frames");
        Ok(frames)
    }
}

/// Sequential batched reader over the same layout, for the streaming
/// pass. An empty batch signals end of stream.
pub struct BatchReader {
    file: File,
    ly: usize,
    lx: usize,
    buf: Vec<u8>,
}

impl BatchReader {
    pub fn open(path: impl AsRef<Path>, ly: usize, lx: usize, batch_size: usize) -> Result<Self> {
        if ly == 0 || lx == 0 {
            return Err(CalregError::InvalidDimensions {
                width: lx,
                height: ly,
            });
        }
        let file = File::open(path)?;
        Ok(Self {
            file,
            ly,
            lx,
            buf: vec![0u8; batch_size.max(1) * ly * lx * 2],
        })
    }

    /// Read the next batch of whole frames; a trailing partial frame is
    /// discarded. Returns an empty vec at end of stream.
    pub fn next_batch(&mut self) -> Result<Vec<Array2<f32>>> {
        let frame_bytes = self.ly * self.lx * 2;
        let mut filled = 0;
        while filled < self.buf.len() {
            let n = self.file.read(&mut self.buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let n_frames = filled / frame_bytes;
        let mut frames = Vec::with_capacity(n_frames);
        for k in 0..n_frames {
            frames.push(decode_frame(
                &self.buf[k * frame_bytes..(k + 1) * frame_bytes],
                self.ly,
                self.lx,
            ));
        }
        Ok(frames)
    }
}

/// Buffered frame writer emitting the same little-endian `i16` layout.
/// Values are clipped at the top of the representable range before
/// narrowing; the cast saturates at the bottom.
pub struct FrameWriter {
    out: BufWriter<File>,
    path: PathBuf,
    frames_written: usize,
}

impl FrameWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            frames_written: 0,
        })
    }

    /// Open for rewriting in place, from the start, without truncating:
    /// the reader's cursor stays ahead of ours so unprocessed frames are
    /// still intact when we reach them.
    pub fn overwrite(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().write(true).open(&path)?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            frames_written: 0,
        })
    }

    pub fn write_frames(&mut self, frames: &[Array2<f32>]) -> Result<()> {
        for frame in frames {
            for &v in frame.iter() {
                self.out.write_i16::<LittleEndian>(v.min(CLIP_MAX) as i16)?;
            }
        }
        self.frames_written += frames.len();
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn finalize(mut self) -> Result<()> {
        self.out.flush()?;
        debug!(path = %self.path.display(), frames = self.frames_written, "finalized movie");
        Ok(())
    }
}

fn decode_frame(bytes: &[u8], ly: usize, lx: usize) -> Array2<f32> {
    let mut raw = vec![0i16; ly * lx];
    LittleEndian::read_i16_into(bytes, &mut raw);
    Array2::from_shape_vec((ly, lx), raw.into_iter().map(f32::from).collect())
        .expect("frame buffer matches dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn write_movie(frames: &[Vec<i16>]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for frame in frames {
            let mut bytes = Vec::with_capacity(frame.len() * 2);
            for &v in frame {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            file.write_all(&bytes).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn open_rejects_misaligned_stream() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 31]).unwrap();
        let err = BinaryMovie::open(file.path(), 4, 4).unwrap_err();
        assert!(matches!(err, CalregError::MisalignedStream { size: 31, .. }));
    }

    #[test]
    fn open_rejects_zero_dimensions() {
        let file = NamedTempFile::new().unwrap();
        let err = BinaryMovie::open(file.path(), 0, 16).unwrap_err();
        assert!(matches!(err, CalregError::InvalidDimensions { .. }));
    }

    #[test]
    fn read_frame_decodes_little_endian() {
        let frames = vec![vec![0i16, 1, -2, 300], vec![5, 6, 7, 8]];
        let file = write_movie(&frames);
        let movie = BinaryMovie::open(file.path(), 2, 2).unwrap();
        assert_eq!(movie.frame_count(), 2);
        let f0 = movie.read_frame(0).unwrap();
        assert_eq!(f0[[0, 0]], 0.0);
        assert_eq!(f0[[0, 1]], 1.0);
        assert_eq!(f0[[1, 0]], -2.0);
        assert_eq!(f0[[1, 1]], 300.0);
        assert!(movie.read_frame(2).is_err());
    }

    #[test]
    fn subsample_spans_the_movie() {
        let frames: Vec<Vec<i16>> = (0..10).map(|k| vec![k as i16; 4]).collect();
        let file = write_movie(&frames);
        let movie = BinaryMovie::open(file.path(), 2, 2).unwrap();
        let sub = movie.subsample_frames(5).unwrap();
        let ids: Vec<f32> = sub.iter().map(|f| f[[0, 0]]).collect();
        assert_eq!(ids, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn subsample_more_than_available_drops_duplicates() {
        let frames: Vec<Vec<i16>> = (0..3).map(|k| vec![k as i16; 4]).collect();
        let file = write_movie(&frames);
        let movie = BinaryMovie::open(file.path(), 2, 2).unwrap();
        let sub = movie.subsample_frames(8).unwrap();
        let ids: Vec<f32> = sub.iter().map(|f| f[[0, 0]]).collect();
        assert_eq!(ids, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn batch_reader_walks_the_stream() {
        let frames: Vec<Vec<i16>> = (0..7).map(|k| vec![k as i16; 4]).collect();
        let file = write_movie(&frames);
        let mut reader = BatchReader::open(file.path(), 2, 2, 3).unwrap();
        assert_eq!(reader.next_batch().unwrap().len(), 3);
        assert_eq!(reader.next_batch().unwrap().len(), 3);
        let last = reader.next_batch().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0][[0, 0]], 6.0);
        assert!(reader.next_batch().unwrap().is_empty());
    }

    #[test]
    fn writer_clips_and_roundtrips() {
        let file = NamedTempFile::new().unwrap();
        let frame = Array2::from_shape_vec(
            (2, 2),
            vec![1.4, -40000.0, 40000.0, CLIP_MAX + 1.0],
        )
        .unwrap();
        let mut writer = FrameWriter::create(file.path()).unwrap();
        writer.write_frames(&[frame]).unwrap();
        assert_eq!(writer.frames_written(), 1);
        writer.finalize().unwrap();

        let movie = BinaryMovie::open(file.path(), 2, 2).unwrap();
        let back = movie.read_frame(0).unwrap();
        assert_eq!(back[[0, 0]], 1.0);
        assert_eq!(back[[0, 1]], -32768.0);
        assert_eq!(back[[1, 0]], CLIP_MAX);
        assert_eq!(back[[1, 1]], CLIP_MAX);
    }

    #[test]
    fn overwrite_rewrites_in_place_without_truncating() {
        let frames: Vec<Vec<i16>> = (0..4).map(|k| vec![k as i16 + 10; 4]).collect();
        let file = write_movie(&frames);
        let mut writer = FrameWriter::overwrite(file.path()).unwrap();
        let zero = Array2::<f32>::zeros((2, 2));
        writer.write_frames(&[zero]).unwrap();
        writer.finalize().unwrap();

        let movie = BinaryMovie::open(file.path(), 2, 2).unwrap();
        assert_eq!(movie.frame_count(), 4);
        assert_eq!(movie.read_frame(0).unwrap()[[0, 0]], 0.0);
        // frames past the write cursor untouched
        assert_eq!(movie.read_frame(3).unwrap()[[0, 0]], 13.0);
    }
}
