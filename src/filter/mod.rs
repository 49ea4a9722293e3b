//! Image filters applied to camera frames before muxing

mod grayscale;

pub use grayscale::GrayscaleFilter;

use serde::{Deserialize, Serialize};

use crate::capture::VideoFrame;

/// A per-frame image transform
pub trait ImageFilter: Send {
    fn filter(&self, frame: &mut VideoFrame);
}

/// Filter selection from configuration or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    None,
    Grayscale,
}

/// Build the filter for `kind`, or `None` when frames pass through untouched
pub fn create_filter(kind: FilterKind) -> Option<Box<dyn ImageFilter>> {
    match kind {
        FilterKind::None => None,
        FilterKind::Grayscale => Some(Box::new(GrayscaleFilter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_filter() {
        assert!(create_filter(FilterKind::None).is_none());

        let filter = create_filter(FilterKind::Grayscale).unwrap();
        let mut frame = VideoFrame::new(1, 1);
        frame.set_pixel(0, 0, (255, 0, 0));
        filter.filter(&mut frame);
        let (r, g, b) = frame.pixel(0, 0);
        assert!(r == g && g == b);
    }
}
