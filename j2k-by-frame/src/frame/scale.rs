use super::{Image, PixelFormat, Size};
use crate::error::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::fmt;
use std::str::FromStr;

/// Resampling filter used to bring the source picture to the output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaler {
    Bicubic,
    Bilinear,
    Gauss,
    Lanczos,
    Nearest,
}

impl Scaler {
    pub const ALL: [Scaler; 5] = [
        Scaler::Bicubic,
        Scaler::Bilinear,
        Scaler::Gauss,
        Scaler::Lanczos,
        Scaler::Nearest,
    ];

    /// Identifier used in configuration and on the wire.
    pub fn id(self) -> &'static str {
        match self {
            Scaler::Bicubic => "bicubic",
            Scaler::Bilinear => "bilinear",
            Scaler::Gauss => "gauss",
            Scaler::Lanczos => "lanczos",
            Scaler::Nearest => "nearest",
        }
    }

    pub fn from_id(id: &str) -> Result<Self> {
        Scaler::ALL
            .iter()
            .copied()
            .find(|s| s.id() == id)
            .ok_or_else(|| Error::UnknownScaler(id.to_string()))
    }

    fn filter(self) -> FilterType {
        match self {
            Scaler::Bicubic => FilterType::CatmullRom,
            Scaler::Bilinear => FilterType::Triangle,
            Scaler::Gauss => FilterType::Gaussian,
            Scaler::Lanczos => FilterType::Lanczos3,
            Scaler::Nearest => FilterType::Nearest,
        }
    }
}

impl Default for Scaler {
    fn default() -> Self {
        Scaler::Bicubic
    }
}

impl FromStr for Scaler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Scaler::from_id(s)
    }
}

impl fmt::Display for Scaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Image {
    /// Scale to `out_size` and convert to packed RGB24.
    ///
    /// `out_size` includes `padding` black pixels on both the left and
    /// right; the picture itself is scaled to fill the space between.
    pub fn scale_and_convert_to_rgb(
        &self,
        out_size: Size,
        padding: u32,
        scaler: Scaler,
    ) -> Result<Image> {
        let inner_width = padding
            .checked_mul(2)
            .and_then(|p| out_size.width.checked_sub(p))
            .filter(|&w| w > 0)
            .ok_or_else(|| {
                Error::bad_image(format!(
                    "padding of {} leaves no room in a {} wide output",
                    padding, out_size.width
                ))
            })?;
        if out_size.height == 0 || self.size.width == 0 || self.size.height == 0 {
            return Err(Error::bad_image(format!(
                "cannot scale {} to {}",
                self.size, out_size
            )));
        }

        let rgb = self.to_rgb24();
        let source = RgbImage::from_raw(self.size.width, self.size.height, rgb.data(0).to_vec())
            .ok_or_else(|| Error::bad_image("RGB buffer does not match its size"))?;
        let scaled = if source.dimensions() == (inner_width, out_size.height) {
            source
        } else {
            imageops::resize(&source, inner_width, out_size.height, scaler.filter())
        };

        let mut out = Image::new(PixelFormat::Rgb24, out_size);
        let row_bytes = inner_width as usize * 3;
        let offset = padding as usize * 3;
        for (y, row) in scaled.as_raw().chunks_exact(row_bytes).enumerate() {
            out.line_mut(0, y)[offset..offset + row_bytes].copy_from_slice(row);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(size: Size, rgb: [u8; 3]) -> Image {
        let data = rgb.iter().copied().cycle().take(size.area() * 3).collect();
        Image::from_rgb24(size, data).unwrap()
    }

    #[test]
    fn scaler_ids_round_trip() {
        for scaler in Scaler::ALL.iter() {
            assert_eq!(Scaler::from_id(scaler.id()).unwrap(), *scaler);
        }
        assert!(matches!(
            "sinc".parse::<Scaler>(),
            Err(Error::UnknownScaler(_))
        ));
    }

    #[test]
    fn padding_is_black_on_both_sides() {
        let image = solid(Size::new(8, 4), [200, 100, 50]);
        let out = image
            .scale_and_convert_to_rgb(Size::new(12, 4), 2, Scaler::Nearest)
            .unwrap();
        assert_eq!(out.size(), Size::new(12, 4));
        for y in 0..4 {
            let line = out.line(0, y);
            assert_eq!(&line[..6], &[0; 6]);
            assert_eq!(&line[6..9], &[200, 100, 50]);
            assert_eq!(&line[30..], &[0; 6]);
        }
    }

    #[test]
    fn solid_colour_survives_every_scaler() {
        let image = solid(Size::new(10, 6), [30, 60, 90]);
        for scaler in Scaler::ALL.iter() {
            let out = image
                .scale_and_convert_to_rgb(Size::new(20, 12), 0, *scaler)
                .unwrap();
            for px in out.data(0).chunks_exact(3) {
                for (got, want) in px.iter().zip([30u8, 60, 90].iter()) {
                    assert!((i32::from(*got) - i32::from(*want)).abs() <= 1, "{}", scaler);
                }
            }
        }
    }

    #[test]
    fn padding_wider_than_output_is_rejected() {
        let image = solid(Size::new(4, 4), [1, 2, 3]);
        assert!(matches!(
            image.scale_and_convert_to_rgb(Size::new(8, 4), 4, Scaler::Bicubic),
            Err(Error::BadImage(_))
        ));
    }

    #[test]
    fn yuv_input_is_converted() {
        let image = Image::new(PixelFormat::Yuv422p, Size::new(6, 6));
        let out = image
            .scale_and_convert_to_rgb(Size::new(6, 6), 0, Scaler::Bilinear)
            .unwrap();
        assert_eq!(out.pixel_format(), PixelFormat::Rgb24);
        assert!(out.data(0).iter().all(|&b| b == 0));
    }
}
