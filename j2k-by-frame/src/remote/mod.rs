//! The frame encode protocol spoken between clients and workers.
//!
//! One request per connection:
//!
//! 1. client sends a NUL-terminated ASCII header:
//!    `encode <in_w> <in_h> <pixfmt> <out_w> <out_h> <padding> <scaler>
//!    <frame> <fps> <post_process|none> <colour_lut> <bandwidth> <linesize>...`
//! 2. client sends every plane's raw bytes (`linesize * lines`) back to back;
//! 3. worker replies with a NUL-terminated decimal length;
//! 4. worker sends that many bytes of J2K codestream.
//!
//! The post-process chain travels unescaped, so it must not contain
//! whitespace or NUL; there is no way to express such a chain on the wire.

pub mod client;
pub mod server;

pub use self::client::*;
pub use self::server::*;

use crate::encode::FrameEncodeRequest;
use crate::error::{Error, Result};
use crate::frame::{Image, PixelFormat, Scaler, Size};
use crate::socket::Socket;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// First word of every request header.
pub const ENCODE_COMMAND: &str = "encode";

/// Default TCP port workers listen on.
pub const DEFAULT_SERVER_PORT: u16 = 6192;

/// Longest length header accepted in a response, terminator included.
pub const RESPONSE_HEADER_LIMIT: usize = 32;

/// Longest request header a worker accepts, terminator included.
pub const REQUEST_HEADER_LIMIT: usize = 4096;

/// Largest codestream a client will accept from a worker.
pub const MAX_RESPONSE_BYTES: usize = 256 * 1024 * 1024;

const NO_POST_PROCESS: &str = "none";

/// A remote worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescription {
    pub host: String,
    pub port: u16,
}

impl ServerDescription {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ServerDescription {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The request header, i.e. everything a worker needs besides the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    pub input_size: Size,
    pub pixel_format: PixelFormat,
    pub line_size: Vec<usize>,
    pub request: FrameEncodeRequest,
}

impl RequestHeader {
    pub fn new(image: &Image, request: &FrameEncodeRequest) -> Self {
        RequestHeader {
            input_size: image.size(),
            pixel_format: image.pixel_format(),
            line_size: image.line_size().to_vec(),
            request: request.clone(),
        }
    }

    /// Bytes the client will send for `plane` after the header.
    pub fn plane_len(&self, plane: usize) -> usize {
        self.line_size[plane].saturating_mul(self.pixel_format.lines(plane, self.input_size.height))
    }
}

impl fmt::Display for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.request;
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {} {} {} {}",
            ENCODE_COMMAND,
            self.input_size.width,
            self.input_size.height,
            self.pixel_format.tag(),
            r.out_size.width,
            r.out_size.height,
            r.padding,
            r.scaler.id(),
            r.frame,
            r.frames_per_second,
            if r.post_process.is_empty() {
                NO_POST_PROCESS
            } else {
                &r.post_process
            },
            r.colour_lut_index,
            r.j2k_bandwidth,
        )?;
        for size in &self.line_size {
            write!(f, " {}", size)?;
        }
        Ok(())
    }
}

impl FromStr for RequestHeader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split_whitespace();
        match fields.next() {
            Some(ENCODE_COMMAND) => {}
            other => {
                return Err(Error::protocol(format!(
                    "expected `{}` request, got {:?}",
                    ENCODE_COMMAND, other
                )))
            }
        }

        let mut next = |name: &str| {
            fields
                .next()
                .ok_or_else(|| Error::protocol(format!("request header is missing {}", name)))
        };
        fn number<T: FromStr>(name: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::protocol(format!("bad {} `{}` in request header", name, value)))
        }

        let input_size = Size::new(
            number("input width", next("input width")?)?,
            number("input height", next("input height")?)?,
        );
        let pixel_format = PixelFormat::from_tag(number("pixel format", next("pixel format")?)?)?;
        let out_size = Size::new(
            number("output width", next("output width")?)?,
            number("output height", next("output height")?)?,
        );
        let padding = number("padding", next("padding")?)?;
        let scaler = Scaler::from_id(next("scaler")?)?;
        let frame = number("frame", next("frame")?)?;
        let frames_per_second = number("frame rate", next("frame rate")?)?;
        let post_process = match next("post-process")? {
            NO_POST_PROCESS => String::new(),
            chain => chain.to_string(),
        };
        let colour_lut_index = number("colour LUT", next("colour LUT")?)?;
        let j2k_bandwidth = number("bandwidth", next("bandwidth")?)?;

        let line_size = (0..pixel_format.planes())
            .map(|plane| number("line size", next(&format!("line size {}", plane))?))
            .collect::<Result<Vec<usize>>>()?;
        if let Some(extra) = fields.next() {
            return Err(Error::protocol(format!(
                "unexpected `{}` at end of request header",
                extra
            )));
        }

        Ok(RequestHeader {
            input_size,
            pixel_format,
            line_size,
            request: FrameEncodeRequest {
                out_size,
                padding,
                scaler,
                frame,
                frames_per_second,
                post_process,
                colour_lut_index,
                j2k_bandwidth,
            },
        })
    }
}

/// Read a response length header: decimal ASCII terminated by NUL, no
/// larger than [`MAX_RESPONSE_BYTES`].
pub fn read_length_header(socket: &mut Socket, timeout: Duration) -> Result<usize> {
    let header = socket.read_until_nul(RESPONSE_HEADER_LIMIT, timeout)?;
    let text = std::str::from_utf8(&header)
        .map_err(|_| Error::protocol("response length is not ASCII"))?;
    let length: usize = text
        .trim()
        .parse()
        .map_err(|_| Error::protocol(format!("bad response length `{}`", text)))?;
    if length > MAX_RESPONSE_BYTES {
        return Err(Error::protocol(format!(
            "response of {} bytes exceeds the {} byte limit",
            length, MAX_RESPONSE_BYTES
        )));
    }
    Ok(length)
}
