#![allow(clippy::cognitive_complexity)]
#![allow(clippy::too_many_arguments)]

pub mod colour;
pub mod config;
pub mod encode;
pub mod encoded;
pub mod error;
pub mod frame;
pub mod j2k;
pub mod remote;
pub mod socket;

pub use self::colour::{convert_to_xyz, rgb_to_xyz, ColourLut, XyzFrame};
pub use self::config::{Config, ServerConfig};
pub use self::encode::*;
pub use self::encoded::*;
pub use self::error::{Error, Result};
pub use self::frame::*;
pub use self::j2k::{build_compressor_config, compress, CompressorConfig, ProgressionOrder};
pub use self::remote::*;
pub use self::socket::{Socket, SOCKET_TIMEOUT};
