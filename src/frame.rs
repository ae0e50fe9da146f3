/// One captured image. Pixels are opaque to this crate and are only handed
/// through to appearance-based tracker backends and detectors.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub dims: (u32, u32),
    pub pixels: Vec<u8>,
    pub timestamp: f64, // in seconds
}

impl Frame {
    #[inline]
    pub fn new(dims: (u32, u32), pixels: Vec<u8>, timestamp: f64) -> Self {
        Self {
            dims,
            pixels,
            timestamp,
        }
    }

    /// Frame without pixel data, enough for detectors that work off-band.
    #[inline]
    pub fn blank(dims: (u32, u32), timestamp: f64) -> Self {
        Self::new(dims, Vec::new(), timestamp)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.dims.0
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.dims.1
    }
}
