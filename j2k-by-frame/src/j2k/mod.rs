//! Cinema-profile JPEG2000 compression.

mod opj;

use crate::colour::{XyzFrame, COLOUR_DEPTH};
use crate::error::{Error, Result};
use crate::frame::Size;
use log::debug;

/// Comment written into every codestream.
pub const CODESTREAM_COMMENT: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionOrder {
    Lrcp,
    Rlcp,
    Rpcl,
    Pcrl,
    Cprl,
}

/// Everything the compressor needs to know for one frame.
///
/// Built per encode call and dropped with it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorConfig {
    pub size: Size,
    pub components: u32,
    pub bit_depth: u32,
    pub codeblock_width: i32,
    pub codeblock_height: i32,
    pub progression_order: ProgressionOrder,
    /// 9/7 wavelet rather than the reversible 5/3.
    pub irreversible: bool,
    pub multi_component_transform: bool,
    pub quality_layers: i32,
    /// Maximum codestream size per frame, in bytes.
    pub max_cs_len: i32,
    /// Maximum size of a single component, in bytes.
    pub max_comp_size: i32,
    /// Compression ratio target for the single quality layer.
    pub rate: f32,
}

pub fn build_compressor_config(
    size: Size,
    j2k_bandwidth: u32,
    frames_per_second: u32,
) -> CompressorConfig {
    let max_cs_len = (j2k_bandwidth as f32 / 8.0 / frames_per_second.max(1) as f32) as i32;
    let max_comp_size = (f64::from(max_cs_len) / 1.25) as i32;
    let components = 3;

    let rate = (f64::from(components) * size.area() as f64 * f64::from(COLOUR_DEPTH)
        / (f64::from(max_cs_len.max(1)) * 8.0)) as f32;

    CompressorConfig {
        size,
        components,
        bit_depth: COLOUR_DEPTH,
        codeblock_width: 32,
        codeblock_height: 32,
        progression_order: ProgressionOrder::Cprl,
        irreversible: true,
        multi_component_transform: true,
        quality_layers: 1,
        max_cs_len,
        max_comp_size,
        rate,
    }
}

/// Compress a 12-bit XYZ frame to a raw J2K codestream.
pub fn compress(config: &CompressorConfig, frame: &XyzFrame) -> Result<Vec<u8>> {
    if frame.size != config.size {
        return Err(Error::bad_image(format!(
            "frame is {} but the compressor was configured for {}",
            frame.size, config.size
        )));
    }

    let mut image = opj::Image::new(config)?;
    for (c, component) in frame.components.iter().enumerate() {
        image.component_mut(c).copy_from_slice(component);
    }

    let codestream = opj::encode(config, &mut image)?;
    if codestream.is_empty() {
        return Err(Error::encode("compressor produced no data"));
    }
    debug!(
        "Compressed {} frame to {} bytes (limit {})",
        config.size,
        codestream.len(),
        config.max_cs_len
    );
    Ok(codestream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_derivation() {
        let config = build_compressor_config(Size::new(1998, 1080), 100_000_000, 24);
        assert_eq!(config.max_cs_len, 520_833);
        assert_eq!(config.max_comp_size, 416_666);
    }

    #[test]
    fn rate_targets_the_frame_budget() {
        let config = build_compressor_config(Size::new(2048, 1080), 250_000_000, 24);
        let expected = (3.0 * 2048.0 * 1080.0 * 12.0) / (config.max_cs_len as f32 * 8.0);
        assert!((config.rate - expected).abs() < 1e-3);
        assert_eq!(config.max_cs_len, 1_302_083);
    }

    #[test]
    fn rate_of_huge_frames_does_not_overflow() {
        let config = build_compressor_config(Size::new(40_000, 40_000), 250_000_000, 24);
        let expected = 3.0 * 40_000.0 * 40_000.0 * 12.0 / (1_302_083.0 * 8.0);
        assert!((f64::from(config.rate) / expected - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cinema_constraints() {
        let config = build_compressor_config(Size::new(64, 64), 250_000_000, 24);
        assert_eq!(config.codeblock_width, 32);
        assert_eq!(config.codeblock_height, 32);
        assert_eq!(config.progression_order, ProgressionOrder::Cprl);
        assert!(config.irreversible);
        assert!(config.multi_component_transform);
        assert_eq!(config.quality_layers, 1);
        assert_eq!(config.components, 3);
        assert_eq!(config.bit_depth, 12);
    }

    #[test]
    fn higher_frame_rates_shrink_the_budget() {
        let at_24 = build_compressor_config(Size::new(64, 64), 250_000_000, 24);
        let at_48 = build_compressor_config(Size::new(64, 64), 250_000_000, 48);
        assert!(at_48.max_cs_len < at_24.max_cs_len);
    }

    #[test]
    fn mismatched_frame_size_is_rejected() {
        let config = build_compressor_config(Size::new(64, 64), 250_000_000, 24);
        let frame = XyzFrame {
            size: Size::new(32, 32),
            components: [vec![0; 1024], vec![0; 1024], vec![0; 1024]],
        };
        assert!(matches!(compress(&config, &frame), Err(Error::BadImage(_))));
    }

    #[test]
    fn compresses_a_flat_frame() {
        let config = build_compressor_config(Size::new(64, 64), 250_000_000, 24);
        let frame = XyzFrame {
            size: config.size,
            components: [vec![2000; 4096], vec![2100; 4096], vec![2200; 4096]],
        };
        let codestream = compress(&config, &frame).unwrap();
        // SOC marker then SIZ
        assert_eq!(&codestream[..4], &[0xff, 0x4f, 0xff, 0x51]);
        assert!(codestream.len() as i32 <= config.max_cs_len);
    }
}
