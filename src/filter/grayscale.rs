use super::ImageFilter;
use crate::capture::VideoFrame;

/// Replaces every pixel with its luminance
#[derive(Debug, Clone, Copy, Default)]
pub struct GrayscaleFilter;

/// Weighted luminance, (11r + 16g + 5b) / 32
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 11 + g as u32 * 16 + b as u32 * 5) / 32) as u8
}

impl ImageFilter for GrayscaleFilter {
    fn filter(&self, frame: &mut VideoFrame) {
        for pixel in frame.data.chunks_exact_mut(4) {
            let gray = luminance(pixel[2], pixel[1], pixel[0]);
            pixel.copy_from_slice(&[gray, gray, gray, 0xff]);
        }
    }
}
