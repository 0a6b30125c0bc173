use crate::colour::{convert_to_xyz, ColourLut};
use crate::encoded::EncodedData;
use crate::error::Result;
use crate::frame::{Image, Scaler, Size};
use crate::j2k::{build_compressor_config, compress};
use log::info;

/// Everything about a frame's encode except the pixels themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEncodeRequest {
    /// Output size in pixels, including padding.
    pub out_size: Size,
    /// Black pixels added on each side of the picture.
    pub padding: u32,
    pub scaler: Scaler,
    /// Index of the frame within the film.
    pub frame: usize,
    pub frames_per_second: u32,
    /// Post-process filter chain; empty for none.
    pub post_process: String,
    pub colour_lut_index: usize,
    /// J2K bandwidth in bits per second.
    pub j2k_bandwidth: u32,
}

impl FrameEncodeRequest {
    /// `fps` is rounded to the nearest whole rate (and at least 1).
    pub fn new(
        out_size: Size,
        padding: u32,
        scaler: Scaler,
        frame: usize,
        fps: f32,
        post_process: impl Into<String>,
        colour_lut_index: usize,
        j2k_bandwidth: u32,
    ) -> Self {
        FrameEncodeRequest {
            out_size,
            padding,
            scaler,
            frame,
            frames_per_second: (fps.round() as u32).max(1),
            post_process: post_process.into(),
            colour_lut_index,
            j2k_bandwidth,
        }
    }
}

/// J2K-encode a frame on this machine.
///
/// Failures are returned as they are; retrying or falling back is up to
/// the caller.
pub fn encode_locally(image: &Image, request: &FrameEncodeRequest) -> Result<EncodedData> {
    let lut = ColourLut::from_index(request.colour_lut_index)?;

    let prepared = if request.post_process.is_empty() {
        image.scale_and_convert_to_rgb(request.out_size, request.padding, request.scaler)?
    } else {
        image
            .post_process(&request.post_process)?
            .scale_and_convert_to_rgb(request.out_size, request.padding, request.scaler)?
    };

    let xyz = convert_to_xyz(&prepared, lut)?;
    let config = build_compressor_config(
        request.out_size,
        request.j2k_bandwidth,
        request.frames_per_second,
    );
    let codestream = compress(&config, &xyz)?;

    info!("Finished locally-encoded frame {}", request.frame);
    Ok(EncodedData::local(codestream))
}
