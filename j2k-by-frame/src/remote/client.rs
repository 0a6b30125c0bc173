use super::{read_length_header, RequestHeader, ServerDescription};
use crate::encode::FrameEncodeRequest;
use crate::encoded::EncodedData;
use crate::error::{Error, Result};
use crate::frame::Image;
use crate::socket::Socket;
use log::{debug, info};
use std::time::Duration;

/// Have the worker at `server` J2K-encode a frame.
///
/// `timeout` bounds every connect, read and write of the exchange. A
/// post-process chain containing whitespace has no wire form and is refused
/// with a protocol error before connecting.
///
/// Failures are returned as they are; the caller decides whether to retry,
/// pick another worker or fall back to [`encode_locally`](crate::encode_locally).
pub fn encode_remotely(
    image: &Image,
    request: &FrameEncodeRequest,
    server: &ServerDescription,
    timeout: Duration,
) -> Result<EncodedData> {
    if request.post_process.contains(|c: char| c.is_whitespace() || c == '\0') {
        return Err(Error::protocol(format!(
            "post-process chain `{}` cannot be sent to a worker",
            request.post_process
        )));
    }

    let mut socket = Socket::connect((server.host.as_str(), server.port), timeout)?;

    let header = RequestHeader::new(image, request);
    debug!("Sending frame {} to {}: {}", request.frame, server, header);
    let mut text = header.to_string().into_bytes();
    text.push(0);
    socket.write(&text, timeout)?;

    for plane in 0..image.components() {
        socket.write(image.data(plane), timeout)?;
    }

    let size = read_length_header(&mut socket, timeout)?;
    let mut encoded = EncodedData::remote(size);
    socket.read_exact(encoded.data_mut(), timeout)?;

    info!(
        "Finished remotely-encoded frame {} from {}",
        request.frame, server
    );
    Ok(encoded)
}
