use ndarray::{ArrayView3, ArrayViewMut3};

/// A decoded video frame: tightly packed RGB bytes in row-major order.
///
/// Pixel format conversion happens at the I/O boundary only; every stage
/// between reader and writer sees this same byte layout.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Copies a rectangular region into a new frame, clamped to the frame
    /// bounds. Returns `None` when the clamped region is empty.
    ///
    /// The crop keeps the source frame's index so downstream stages can
    /// still attribute it.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Frame> {
        let x0 = x.min(self.width) as usize;
        let y0 = y.min(self.height) as usize;
        let x1 = (x.saturating_add(width).min(self.width)) as usize;
        let y1 = (y.saturating_add(height).min(self.height)) as usize;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let ch = self.channels as usize;
        let src_stride = self.width as usize * ch;
        let out_width = x1 - x0;
        let out_height = y1 - y0;
        let mut data = Vec::with_capacity(out_width * out_height * ch);
        for row in y0..y1 {
            let start = row * src_stride + x0 * ch;
            data.extend_from_slice(&self.data[start..start + out_width * ch]);
        }
        Some(Frame::new(
            data,
            out_width as u32,
            out_height as u32,
            self.channels,
            self.index,
        ))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
