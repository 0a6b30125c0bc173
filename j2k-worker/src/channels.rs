use crate::worker::Connection;
use crossbeam_channel::{Receiver, Sender};

pub type ConnectionSender = Sender<Connection>;
pub type ConnectionReceiver = Receiver<Connection>;
pub type ConnectionChannel = (ConnectionSender, ConnectionReceiver);
