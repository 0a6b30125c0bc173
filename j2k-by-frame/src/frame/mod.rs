//! Decoded picture buffers handed to the encoder.

pub mod post_process;
pub mod scale;

pub use self::post_process::*;
pub use self::scale::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layouts the encoder accepts. The discriminants are FFmpeg's
/// `AVPixelFormat` values, which is how the format travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Yuv420p = 0,
    Rgb24 = 2,
    Bgr24 = 3,
    Yuv422p = 4,
    Yuv444p = 5,
}

impl PixelFormat {
    pub fn from_tag(tag: i32) -> Result<Self> {
        Ok(match tag {
            0 => PixelFormat::Yuv420p,
            2 => PixelFormat::Rgb24,
            3 => PixelFormat::Bgr24,
            4 => PixelFormat::Yuv422p,
            5 => PixelFormat::Yuv444p,
            _ => return Err(Error::UnsupportedPixelFormat(tag)),
        })
    }

    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn planes(self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 1,
            _ => 3,
        }
    }

    /// Number of meaningful bytes in one line of `plane`.
    pub fn bytes_per_line(self, plane: usize, width: u32) -> usize {
        let width = width as usize;
        match (self, plane) {
            (PixelFormat::Rgb24, _) | (PixelFormat::Bgr24, _) => width * 3,
            (_, 0) | (PixelFormat::Yuv444p, _) => width,
            (PixelFormat::Yuv420p, _) | (PixelFormat::Yuv422p, _) => (width + 1) / 2,
        }
    }

    pub fn lines(self, plane: usize, height: u32) -> usize {
        let height = height as usize;
        match (self, plane) {
            (PixelFormat::Yuv420p, 1) | (PixelFormat::Yuv420p, 2) => (height + 1) / 2,
            _ => height,
        }
    }
}

/// A decoded picture: one packed plane or three planar ones, each with
/// an explicit stride.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixel_format: PixelFormat,
    size: Size,
    line_size: Vec<usize>,
    data: Vec<Vec<u8>>,
}

impl Image {
    /// Allocate a black image with tightly packed lines.
    pub fn new(pixel_format: PixelFormat, size: Size) -> Self {
        let line_size: Vec<usize> = (0..pixel_format.planes())
            .map(|plane| pixel_format.bytes_per_line(plane, size.width))
            .collect();
        let data = line_size
            .iter()
            .enumerate()
            .map(|(plane, &stride)| {
                let fill = match (pixel_format, plane) {
                    (PixelFormat::Rgb24, _) | (PixelFormat::Bgr24, _) => 0,
                    (_, 0) => 16,
                    _ => 128,
                };
                vec![fill; stride * pixel_format.lines(plane, size.height)]
            })
            .collect();
        Image {
            pixel_format,
            size,
            line_size,
            data,
        }
    }

    /// Wrap existing plane buffers, checking that every plane is large
    /// enough for its stride and line count.
    pub fn from_planes(
        pixel_format: PixelFormat,
        size: Size,
        line_size: Vec<usize>,
        data: Vec<Vec<u8>>,
    ) -> Result<Self> {
        if line_size.len() != pixel_format.planes() || data.len() != pixel_format.planes() {
            return Err(Error::bad_image(format!(
                "{:?} needs {} planes, got {} strides and {} buffers",
                pixel_format,
                pixel_format.planes(),
                line_size.len(),
                data.len()
            )));
        }
        for plane in 0..pixel_format.planes() {
            let needed = pixel_format.bytes_per_line(plane, size.width);
            if line_size[plane] < needed {
                return Err(Error::bad_image(format!(
                    "plane {} stride {} is shorter than a line ({} bytes)",
                    plane, line_size[plane], needed
                )));
            }
            let expected = line_size[plane] * pixel_format.lines(plane, size.height);
            if data[plane].len() != expected {
                return Err(Error::bad_image(format!(
                    "plane {} holds {} bytes, expected {}",
                    plane,
                    data[plane].len(),
                    expected
                )));
            }
        }
        Ok(Image {
            pixel_format,
            size,
            line_size,
            data,
        })
    }

    /// Packed 8-bit RGB, as produced by most still-image decoders.
    pub fn from_rgb24(size: Size, data: Vec<u8>) -> Result<Self> {
        let stride = PixelFormat::Rgb24.bytes_per_line(0, size.width);
        Image::from_planes(PixelFormat::Rgb24, size, vec![stride], vec![data])
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn components(&self) -> usize {
        self.data.len()
    }

    pub fn line_size(&self) -> &[usize] {
        &self.line_size
    }

    pub fn lines(&self, plane: usize) -> usize {
        self.pixel_format.lines(plane, self.size.height)
    }

    pub fn data(&self, plane: usize) -> &[u8] {
        &self.data[plane]
    }

    pub fn data_mut(&mut self, plane: usize) -> &mut [u8] {
        &mut self.data[plane]
    }

    /// The meaningful bytes of line `y` in `plane`, without stride padding.
    pub fn line(&self, plane: usize, y: usize) -> &[u8] {
        let start = y * self.line_size[plane];
        let len = self.pixel_format.bytes_per_line(plane, self.size.width);
        &self.data[plane][start..start + len]
    }

    pub fn line_mut(&mut self, plane: usize, y: usize) -> &mut [u8] {
        let start = y * self.line_size[plane];
        let len = self.pixel_format.bytes_per_line(plane, self.size.width);
        &mut self.data[plane][start..start + len]
    }

    /// Convert to tightly packed RGB24 at the same size.
    pub fn to_rgb24(&self) -> Image {
        let mut out = Image::new(PixelFormat::Rgb24, self.size);
        let (w, h) = (self.size.width as usize, self.size.height as usize);
        for y in 0..h {
            match self.pixel_format {
                PixelFormat::Rgb24 => {
                    out.line_mut(0, y).copy_from_slice(self.line(0, y));
                }
                PixelFormat::Bgr24 => {
                    let src = self.line(0, y).to_vec();
                    let dst = out.line_mut(0, y);
                    for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(3)) {
                        d.copy_from_slice(&[s[2], s[1], s[0]]);
                    }
                }
                PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
                    let chroma_y = match self.pixel_format {
                        PixelFormat::Yuv420p => y / 2,
                        _ => y,
                    };
                    let chroma_shift = match self.pixel_format {
                        PixelFormat::Yuv444p => 0,
                        _ => 1,
                    };
                    let luma = self.line(0, y).to_vec();
                    let u = self.line(1, chroma_y).to_vec();
                    let v = self.line(2, chroma_y).to_vec();
                    let dst = out.line_mut(0, y);
                    for x in 0..w {
                        let rgb = yuv_to_rgb(luma[x], u[x >> chroma_shift], v[x >> chroma_shift]);
                        dst[x * 3..x * 3 + 3].copy_from_slice(&rgb);
                    }
                }
            }
        }
        out
    }
}

/// BT.601 limited-range YCbCr to RGB.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clip = |x: i32| x.max(0).min(255) as u8;
    [
        clip((298 * c + 409 * e + 128) >> 8),
        clip((298 * c - 100 * d - 208 * e + 128) >> 8),
        clip((298 * c + 516 * d + 128) >> 8),
    ]
}
