//! Raw capture buffers

/// One RGB32 camera frame
///
/// Pixels are `0xffRRGGBB` words stored little-endian, so each pixel is the
/// byte sequence B, G, R, X.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// A black frame of the given size
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for pixel in data.chunks_exact_mut(4) {
            pixel[3] = 0xff;
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, (r, g, b): (u8, u8, u8)) {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.data[offset..offset + 4].copy_from_slice(&[b, g, r, 0xff]);
    }

    /// (r, g, b) of one pixel
    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        (self.data[offset + 2], self.data[offset + 1], self.data[offset])
    }
}
