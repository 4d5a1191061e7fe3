//! Decoded Frame Types
//!
//! Raw frames as they leave the decoder, before color conversion.

use std::fmt;

/// Pixel format of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// I420 (YUV 4:2:0 planar) - H.264 decoder output
    I420,
    /// NV12 (YUV 4:2:0 semi-planar) - Common hardware format
    NV12,
    /// YUYV (YUV 4:2:2 packed) - Common V4L2 format
    YUYV,
    /// RGB24 (8 bits per channel, packed)
    RGB24,
    /// BGRA32 (8 bits per channel with alpha, packed) - capture output
    Bgra32,
}

impl PixelFormat {
    /// Get the V4L2 fourcc code for this format
    pub fn fourcc(&self) -> u32 {
        u32::from_le_bytes(self.fourcc_bytes())
    }

    /// FourCC as raw bytes
    pub fn fourcc_bytes(&self) -> [u8; 4] {
        match self {
            PixelFormat::I420 => *b"YU12",
            PixelFormat::NV12 => *b"NV12",
            PixelFormat::YUYV => *b"YUYV",
            PixelFormat::RGB24 => *b"RGB3",
            PixelFormat::Bgra32 => *b"AR24",
        }
    }

    /// Calculate the buffer size needed for a tightly packed frame
    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        let chroma = chroma_width(width) * chroma_height(height);
        match self {
            PixelFormat::I420 => pixels + chroma * 2,
            PixelFormat::NV12 => pixels + chroma * 2,
            PixelFormat::YUYV => chroma_width(width) * 4 * height as usize,
            PixelFormat::RGB24 => pixels * 3,
            PixelFormat::Bgra32 => pixels * 4,
        }
    }

    /// Size of a frame whose first plane rows are `line` bytes apart
    pub fn strided_size(&self, width: u32, height: u32, line: usize) -> usize {
        plane_layout(width, height, *self, line)
            .iter()
            .map(|p| p.stride * p.rows)
            .sum()
    }

    /// Whether the format has a single interleaved plane
    pub fn is_packed(&self) -> bool {
        matches!(
            self,
            PixelFormat::YUYV | PixelFormat::RGB24 | PixelFormat::Bgra32
        )
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::I420 => write!(f, "I420 (YUV 4:2:0 planar)"),
            PixelFormat::NV12 => write!(f, "NV12 (YUV 4:2:0 semi-planar)"),
            PixelFormat::YUYV => write!(f, "YUYV (YUV 4:2:2 packed)"),
            PixelFormat::RGB24 => write!(f, "RGB24"),
            PixelFormat::Bgra32 => write!(f, "BGRA32"),
        }
    }
}

fn chroma_width(width: u32) -> usize {
    (width as usize + 1) / 2
}

fn chroma_height(height: u32) -> usize {
    (height as usize + 1) / 2
}

/// A decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Frame data buffer, planes stored back to back
    pub data: Vec<u8>,
    /// Stride for each plane
    pub strides: Vec<usize>,
}

impl VideoFrame {
    /// Create a zeroed frame
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = format.buffer_size(width, height);
        Self {
            width,
            height,
            format,
            data: vec![0u8; size],
            strides: Self::compute_strides(width, format),
        }
    }

    /// Create a tightly packed frame from existing data
    ///
    /// Returns `None` when `data` is too short for the geometry.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        if data.len() < format.buffer_size(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            data,
            strides: Self::compute_strides(width, format),
        })
    }

    /// Repack a frame whose rows are `line` bytes apart into a tight frame
    ///
    /// `line` is the stride of the first plane as reported by the driver;
    /// chroma strides follow from it. Returns `None` when `line` is shorter
    /// than a row or `data` is not exactly the padded frame size.
    pub fn from_strided(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &[u8],
        line: usize,
    ) -> Option<Self> {
        let planes = plane_layout(width, height, format, line);
        if planes.iter().any(|p| p.stride < p.row_bytes) {
            return None;
        }
        if data.len() != format.strided_size(width, height, line) {
            return None;
        }

        let mut packed = Vec::with_capacity(format.buffer_size(width, height));
        let mut offset = 0;
        for plane in &planes {
            for row in 0..plane.rows {
                let start = offset + row * plane.stride;
                packed.extend_from_slice(&data[start..start + plane.row_bytes]);
            }
            offset += plane.stride * plane.rows;
        }
        Self::from_data(width, height, format, packed)
    }

    /// Compute strides for each plane
    fn compute_strides(width: u32, format: PixelFormat) -> Vec<usize> {
        let w = width as usize;
        match format {
            PixelFormat::I420 => vec![w, chroma_width(width), chroma_width(width)],
            PixelFormat::NV12 => vec![w, chroma_width(width) * 2],
            PixelFormat::YUYV => vec![chroma_width(width) * 4],
            PixelFormat::RGB24 => vec![w * 3],
            PixelFormat::Bgra32 => vec![w * 4],
        }
    }

    /// Get the Y plane (for YUV planar formats)
    pub fn y_plane(&self) -> Option<&[u8]> {
        match self.format {
            PixelFormat::I420 | PixelFormat::NV12 => {
                let y_size = self.strides[0] * self.height as usize;
                Some(&self.data[..y_size])
            }
            _ => None,
        }
    }

    /// Get the U and V planes (for I420)
    pub fn uv_planes(&self) -> Option<(&[u8], &[u8])> {
        if self.format != PixelFormat::I420 {
            return None;
        }
        let y_size = self.strides[0] * self.height as usize;
        let uv_size = self.strides[1] * chroma_height(self.height);
        Some((
            &self.data[y_size..y_size + uv_size],
            &self.data[y_size + uv_size..y_size + uv_size * 2],
        ))
    }

    /// Get the interleaved UV plane (for NV12)
    pub fn uv_plane(&self) -> Option<&[u8]> {
        if self.format != PixelFormat::NV12 {
            return None;
        }
        let y_size = self.strides[0] * self.height as usize;
        Some(&self.data[y_size..])
    }
}

/// Row geometry of one plane inside a driver buffer
struct PlaneLayout {
    row_bytes: usize,
    rows: usize,
    stride: usize,
}

fn plane_layout(width: u32, height: u32, format: PixelFormat, line: usize) -> Vec<PlaneLayout> {
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (chroma_width(width), chroma_height(height));
    let plane = |row_bytes, rows, stride| PlaneLayout {
        row_bytes,
        rows,
        stride,
    };
    match format {
        PixelFormat::I420 => vec![
            plane(w, h, line),
            plane(cw, ch, line / 2),
            plane(cw, ch, line / 2),
        ],
        PixelFormat::NV12 => vec![plane(w, h, line), plane(cw * 2, ch, line)],
        PixelFormat::YUYV => vec![plane(cw * 4, h, line)],
        PixelFormat::RGB24 => vec![plane(w * 3, h, line)],
        PixelFormat::Bgra32 => vec![plane(w * 4, h, line)],
    }
}
