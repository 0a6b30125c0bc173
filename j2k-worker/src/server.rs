use crate::channels::ConnectionSender;
use crate::worker::Connection;
use anyhow::Result;
use crossbeam_utils::thread::Scope;
use j2k_by_frame::Socket;
use log::{debug, error, info};
use std::net::{SocketAddrV4, TcpListener};

pub fn start_listener(
    server_ip: SocketAddrV4,
    scope: &Scope,
    connection_sender: ConnectionSender,
) -> Result<()> {
    let server = TcpListener::bind(server_ip)?;

    // This thread accepts connections and queues them for the workers,
    // one encode request per connection
    scope.spawn(move |_| {
        info!("Listening for encode requests on {}", server_ip);

        let mut next_id = 0u64;
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to receive connection: {}", e);
                    continue;
                }
            };
            let connection = Connection {
                id: next_id,
                socket: Socket::new(stream),
            };
            next_id += 1;
            debug!(
                "Accepted connection {} from {:?}",
                connection.id,
                connection.socket.peer_addr()
            );
            if connection_sender.send(connection).is_err() {
                error!("All workers have stopped; closing listener");
                break;
            }
        }
    });

    Ok(())
}
