use crate::channels::ConnectionChannel;
use anyhow::{anyhow, Context, Result};
use clap::{App, Arg};
use crossbeam_channel::unbounded;
use server::*;
use std::env;
use std::net::SocketAddrV4;
use worker::*;

mod channels;
mod server;
mod worker;

#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "j2k_worker=info,j2k_by_frame=info");
    }
    env_logger::init();

    let default_port = j2k_by_frame::DEFAULT_SERVER_PORT.to_string();
    let matches = App::new("j2k-worker")
        .arg(
            Arg::with_name("LISTEN_IP")
                .help("Select which IP to listen on")
                .long("ip")
                .visible_alias("host")
                .default_value("0.0.0.0")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("LISTEN_PORT")
                .help("Select which port to listen on")
                .long("port")
                .short("p")
                .default_value(&default_port)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MAX_THREADS")
                .help(
                    "Limit the number of threads that can be used for workers [default: num cpus]",
                )
                .long("threads")
                .takes_value(true),
        )
        .get_matches();

    let server_ip = SocketAddrV4::new(
        matches
            .value_of("LISTEN_IP")
            .unwrap()
            .parse()
            .context("Invalid listen IP")?,
        matches
            .value_of("LISTEN_PORT")
            .unwrap()
            .parse()
            .context("Invalid listen port")?,
    );
    let mut threads = num_cpus::get();
    if let Some(thread_setting) = matches
        .value_of("MAX_THREADS")
        .and_then(|val| val.parse().ok())
    {
        threads = threads.min(thread_setting).max(1);
    }

    crossbeam_utils::thread::scope(|s| -> Result<()> {
        let (connection_sender, connection_receiver): ConnectionChannel = unbounded();
        start_listener(server_ip, s, connection_sender)?;
        start_workers(threads, s, connection_receiver);
        Ok(())
    })
    .map_err(|_| anyhow!("A worker thread panicked"))?
}
