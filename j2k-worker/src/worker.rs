use crate::channels::ConnectionReceiver;
use crossbeam_utils::thread::Scope;
use j2k_by_frame::{serve_connection, Socket, SOCKET_TIMEOUT};
use log::{error, info, warn};

#[derive(Debug)]
pub struct Connection {
    pub id: u64,
    pub socket: Socket,
}

pub fn start_workers(
    worker_threads: usize,
    scope: &Scope,
    connection_receiver: ConnectionReceiver,
) {
    info!("Starting {} workers", worker_threads);

    for _ in 0..worker_threads {
        let connection_receiver = connection_receiver.clone();
        scope.spawn(move |_| {
            while let Ok(mut connection) = connection_receiver.recv() {
                match serve_connection(&mut connection.socket, SOCKET_TIMEOUT) {
                    Ok(frame) => {
                        info!(
                            "Encoded frame {} for connection {}",
                            frame, connection.id
                        );
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("Connection {} failed: {}", connection.id, e);
                    }
                    Err(e) => {
                        error!("Encoding error for connection {}: {}", connection.id, e);
                    }
                }
                // Dropping the socket closes the connection; on failure the
                // client sees EOF instead of a response
            }
        });
    }
}
