//! Frame spooling: write captured frames to disk as BMP files.
//!
//! The standalone detection server cannot see this process's memory, so the
//! engine hands it a path instead.  Each window has one file that is
//! overwritten on every capture (`0x00001A2B.bmp`), which keeps the spool
//! directory bounded no matter how long the engine runs.
//!
//! # BMP layout
//!
//! A 14-byte `BITMAPFILEHEADER`, a 40-byte `BITMAPINFOHEADER` with a
//! *negative* height (top-down rows, matching the capture buffer), then the
//! raw 32-bit BGRA pixels.  32-bit rows need no padding.

use std::path::{Path, PathBuf};

use mwp_core::WindowId;

use crate::application::observe::{CaptureError, Frame};

const FILE_HEADER_LEN: u32 = 14;
const INFO_HEADER_LEN: u32 = 40;

#[derive(Debug, Clone)]
pub struct FrameSpool {
    dir: PathBuf,
}

impl FrameSpool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, window: WindowId) -> PathBuf {
        self.dir.join(format!("{window}.bmp"))
    }

    /// Writes `frame` and returns the path it was written to.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Spool`] if the directory cannot be created or
    /// the file cannot be written.
    pub async fn write(&self, window: WindowId, frame: &Frame) -> Result<PathBuf, CaptureError> {
        let path = self.path_for(window);
        let spool_err = |source| CaptureError::Spool {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(spool_err)?;
        tokio::fs::write(&path, encode_bmp(frame)).await.map_err(spool_err)?;
        Ok(path)
    }
}

/// Encodes a top-down BGRA frame as a 32-bit BMP.
///
/// Missing pixel bytes (a frame without pixels) are written as black.
pub fn encode_bmp(frame: &Frame) -> Vec<u8> {
    let pixel_len = frame.width as usize * frame.height as usize * 4;
    let offset = FILE_HEADER_LEN + INFO_HEADER_LEN;
    let file_len = offset as usize + pixel_len;

    let mut out = Vec::with_capacity(file_len);
    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_len as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved
    out.extend_from_slice(&offset.to_le_bytes());
    // BITMAPINFOHEADER
    out.extend_from_slice(&INFO_HEADER_LEN.to_le_bytes());
    out.extend_from_slice(&(frame.width as i32).to_le_bytes());
    out.extend_from_slice(&(-(frame.height as i32)).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&32u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&(pixel_len as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes()); // 72 DPI
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // colours used
    out.extend_from_slice(&0u32.to_le_bytes()); // important colours

    let available = frame.pixels.len().min(pixel_len);
    out.extend_from_slice(&frame.pixels[..available]);
    out.resize(file_len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_describes_top_down_32bit_image() {
        // Arrange
        let frame = Frame {
            width: 2,
            height: 3,
            pixels: vec![0xAB; 24],
            image_ref: None,
        };

        // Act
        let bmp = encode_bmp(&frame);

        // Assert
        assert_eq!(&bmp[..2], b"BM");
        assert_eq!(bmp.len(), 54 + 24);
        assert_eq!(u32::from_le_bytes(bmp[2..6].try_into().unwrap()), 78);
        assert_eq!(u32::from_le_bytes(bmp[10..14].try_into().unwrap()), 54);
        assert_eq!(i32::from_le_bytes(bmp[18..22].try_into().unwrap()), 2);
        assert_eq!(i32::from_le_bytes(bmp[22..26].try_into().unwrap()), -3);
        assert_eq!(u16::from_le_bytes(bmp[28..30].try_into().unwrap()), 32);
        assert!(bmp[54..].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_frame_without_pixels_is_padded_black() {
        let bmp = encode_bmp(&Frame::blank(4, 4));
        assert_eq!(bmp.len(), 54 + 64);
        assert!(bmp[54..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_write_uses_one_file_per_window() {
        let dir = std::env::temp_dir().join(format!("mwp-spool-{}", uuid::Uuid::new_v4()));
        let spool = FrameSpool::new(&dir);

        let first = spool.write(WindowId(0x1A2B), &Frame::blank(1, 1)).await.unwrap();
        let second = spool.write(WindowId(0x1A2B), &Frame::blank(2, 2)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.file_name().unwrap(), "0x00001A2B.bmp");
        assert_eq!(std::fs::metadata(&second).unwrap().len(), 54 + 16);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
