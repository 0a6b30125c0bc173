use super::{RequestHeader, REQUEST_HEADER_LIMIT};
use crate::encode::encode_locally;
use crate::error::{Error, Result};
use crate::frame::Image;
use crate::socket::Socket;
use log::debug;
use std::time::Duration;

/// Largest frame a worker will buffer, across all planes.
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Serve one encode request on `socket`: read the header and planes,
/// encode the frame here and send back the codestream.
///
/// Returns the frame index on success. On any error nothing is sent;
/// the caller should drop the connection.
pub fn serve_connection(socket: &mut Socket, timeout: Duration) -> Result<usize> {
    let header = socket.read_until_nul(REQUEST_HEADER_LIMIT, timeout)?;
    let header: RequestHeader = std::str::from_utf8(&header)
        .map_err(|_| Error::protocol("request header is not ASCII"))?
        .parse()?;
    debug!("Request from {:?}: {}", socket.peer_addr(), header);

    let planes = header.pixel_format.planes();
    let total = (0..planes).fold(0usize, |sum, plane| sum.saturating_add(header.plane_len(plane)));
    let out_size = header.request.out_size;
    let output = (out_size.width as usize)
        .checked_mul(out_size.height as usize)
        .and_then(|area| area.checked_mul(3))
        .unwrap_or(usize::MAX);
    if total.max(output) > MAX_FRAME_BYTES {
        return Err(Error::protocol(format!(
            "frame of {} bytes in, {} bytes out exceeds the {} byte limit",
            total, output, MAX_FRAME_BYTES
        )));
    }

    let mut data = Vec::with_capacity(planes);
    for plane in 0..planes {
        let mut buf = vec![0; header.plane_len(plane)];
        socket.read_exact(&mut buf, timeout)?;
        data.push(buf);
    }
    let image = Image::from_planes(
        header.pixel_format,
        header.input_size,
        header.line_size.clone(),
        data,
    )?;

    let encoded = encode_locally(&image, &header.request)?;
    encoded.send(socket)?;
    Ok(header.request.frame)
}
