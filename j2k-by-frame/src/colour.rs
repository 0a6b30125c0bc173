//! Conversion from gamma-encoded RGB to the 12-bit DCI X'Y'Z' encoding.
//!
//! Each 8-bit sample is linearised through an input gamma table, moved to
//! XYZ with a 3x3 matrix, scaled by the DCI companding coefficient and
//! finally encoded through the DCI output gamma table.
//!
//! All tables are built once and shared read-only between encoder threads.

use crate::error::{Error, Result};
use crate::frame::{Image, PixelFormat, Size};
use lazy_static::lazy_static;

pub const COLOUR_DEPTH: u32 = 12;
pub const DCI_LUT_SIZE: usize = 1 << COLOUR_DEPTH;
pub const DCI_GAMMA: f64 = 2.6;
/// 48 cd/m² reference white over the 52.37 cd/m² encoding peak.
pub const DCI_COEFFICIENT: f64 = 48.0 / 52.37;

/// Input colour space, selected by the configured colour LUT index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourLut {
    Srgb = 0,
    Rec709 = 1,
}

impl ColourLut {
    pub fn from_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(ColourLut::Srgb),
            1 => Ok(ColourLut::Rec709),
            _ => Err(Error::UnknownColourLut(index)),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

// sRGB and Rec.709 share primaries and the D65 white point.
const COLOUR_MATRIX: [[[f64; 3]; 3]; 2] = [
    [
        [0.4124564, 0.3575761, 0.1804375],
        [0.2126729, 0.7151522, 0.0721750],
        [0.0193339, 0.1191920, 0.9503041],
    ],
    [
        [0.4124564, 0.3575761, 0.1804375],
        [0.2126729, 0.7151522, 0.0721750],
        [0.0193339, 0.1191920, 0.9503041],
    ],
];

lazy_static! {
    static ref LUT_IN: [Vec<f64>; 2] = [
        build_lut_in(srgb_to_linear),
        build_lut_in(rec709_to_linear),
    ];
    static ref LUT_OUT_DCI: Vec<i32> = (0..DCI_LUT_SIZE)
        .map(|i| {
            let v = i as f64 / (DCI_LUT_SIZE - 1) as f64;
            (v.powf(1.0 / DCI_GAMMA) * (DCI_LUT_SIZE - 1) as f64).round() as i32
        })
        .collect();
}

fn build_lut_in(curve: fn(f64) -> f64) -> Vec<f64> {
    (0..DCI_LUT_SIZE)
        .map(|i| curve(i as f64 / (DCI_LUT_SIZE - 1) as f64))
        .collect()
}

fn srgb_to_linear(v: f64) -> f64 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn rec709_to_linear(v: f64) -> f64 {
    if v < 0.081 {
        v / 4.5
    } else {
        ((v + 0.099) / 1.099).powf(1.0 / 0.45)
    }
}

/// Convert one RGB pixel to 12-bit X'Y'Z'.
///
/// The companded value is clamped to the output table before lookup.
pub fn rgb_to_xyz(rgb: [u8; 3], lut: ColourLut) -> [i32; 3] {
    let lut_in = &LUT_IN[lut.index()];
    let matrix = &COLOUR_MATRIX[lut.index()];

    // 8-bit input indexes the 12-bit table in steps of 16
    let s = [
        lut_in[usize::from(rgb[0]) << 4],
        lut_in[usize::from(rgb[1]) << 4],
        lut_in[usize::from(rgb[2]) << 4],
    ];

    let mut out = [0; 3];
    for (c, row) in matrix.iter().enumerate() {
        out[c] = dci_encode(s[0] * row[0] + s[1] * row[1] + s[2] * row[2]);
    }
    out
}

/// Compand a linear XYZ value and encode it through the DCI output table,
/// clamping to the ends of the table.
fn dci_encode(linear: f64) -> i32 {
    let companded = linear * DCI_COEFFICIENT * (DCI_LUT_SIZE - 1) as f64;
    let index = (companded as i64).max(0).min(DCI_LUT_SIZE as i64 - 1) as usize;
    LUT_OUT_DCI[index]
}

/// Three 12-bit planes ready to be handed to the J2K compressor.
#[derive(Debug, Clone, PartialEq)]
pub struct XyzFrame {
    pub size: Size,
    pub components: [Vec<i32>; 3],
}

/// Run the colour pipeline over every pixel of a packed RGB24 image.
pub fn convert_to_xyz(image: &Image, lut: ColourLut) -> Result<XyzFrame> {
    if image.pixel_format() != PixelFormat::Rgb24 {
        return Err(Error::bad_image(format!(
            "colour conversion needs RGB24 input, got {:?}",
            image.pixel_format()
        )));
    }

    let size = image.size();
    let mut components = [
        Vec::with_capacity(size.area()),
        Vec::with_capacity(size.area()),
        Vec::with_capacity(size.area()),
    ];
    for y in 0..size.height as usize {
        for px in image.line(0, y).chunks_exact(3) {
            let xyz = rgb_to_xyz([px[0], px[1], px[2]], lut);
            components[0].push(xyz[0]);
            components[1].push(xyz[1]);
            components[2].push(xyz[2]);
        }
    }
    Ok(XyzFrame { size, components })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn black_maps_to_zero() {
        assert_eq!(rgb_to_xyz([0, 0, 0], ColourLut::Srgb), [0, 0, 0]);
        assert_eq!(rgb_to_xyz([0, 0, 0], ColourLut::Rec709), [0, 0, 0]);
    }

    #[test]
    fn known_code_values() {
        // 8-bit 255 keys entry 4080, just short of full-scale white
        let cases = [
            ([255, 255, 255], [3871, 3947, 4078]),
            ([0, 255, 0], [2657, 3469, 1741]),
            ([200, 100, 50], [2450, 2190, 1309]),
        ];
        for (rgb, expected) in cases.iter() {
            let xyz = rgb_to_xyz(*rgb, ColourLut::Srgb);
            for (got, want) in xyz.iter().zip(expected.iter()) {
                assert!((got - want).abs() <= 1, "{:?} -> {:?}", rgb, xyz);
            }
        }
    }

    #[test]
    fn out_of_range_linear_values_are_clamped() {
        assert_eq!(dci_encode(-0.5), 0);
        assert_eq!(dci_encode(f64::NEG_INFINITY), 0);
        assert_eq!(dci_encode(1.0 / DCI_COEFFICIENT * 1.5), (DCI_LUT_SIZE - 1) as i32);
        assert_eq!(dci_encode(1e12), (DCI_LUT_SIZE - 1) as i32);
        assert_eq!(dci_encode(0.0), 0);
    }

    #[test]
    fn green_dominates_y() {
        let xyz = rgb_to_xyz([0, 255, 0], ColourLut::Srgb);
        assert!(xyz[1] > xyz[0]);
        assert!(xyz[1] > xyz[2]);
    }

    #[test]
    fn output_table_is_monotonic_and_bounded() {
        assert_eq!(LUT_OUT_DCI[0], 0);
        assert_eq!(LUT_OUT_DCI[DCI_LUT_SIZE - 1], (DCI_LUT_SIZE - 1) as i32);
        assert!(LUT_OUT_DCI.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unknown_lut_index() {
        assert!(matches!(
            ColourLut::from_index(2),
            Err(Error::UnknownColourLut(2))
        ));
    }

    #[test]
    fn converts_whole_image_row_by_row() {
        let image = Image::from_planes(
            PixelFormat::Rgb24,
            Size::new(2, 2),
            vec![8],
            vec![vec![
                255, 255, 255, 0, 0, 0, 9, 9, //
                0, 0, 0, 255, 255, 255, 9, 9,
            ]],
        )
        .unwrap();
        let frame = convert_to_xyz(&image, ColourLut::Srgb).unwrap();
        let white = rgb_to_xyz([255, 255, 255], ColourLut::Srgb);
        assert_eq!(frame.components[1], vec![white[1], 0, 0, white[1]]);
    }

    #[test]
    fn rejects_planar_input() {
        let image = Image::new(PixelFormat::Yuv420p, Size::new(2, 2));
        assert!(matches!(
            convert_to_xyz(&image, ColourLut::Srgb),
            Err(Error::BadImage(_))
        ));
    }

    proptest! {
        #[test]
        fn conversion_is_deterministic_and_12_bit(
            r in any::<u8>(),
            g in any::<u8>(),
            b in any::<u8>(),
            lut in 0usize..2,
        ) {
            let lut = ColourLut::from_index(lut).unwrap();
            let first = rgb_to_xyz([r, g, b], lut);
            let second = rgb_to_xyz([r, g, b], lut);
            prop_assert_eq!(first, second);
            for v in first.iter() {
                prop_assert!(*v >= 0 && *v < DCI_LUT_SIZE as i32);
            }
        }
    }
}
