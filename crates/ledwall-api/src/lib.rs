// ledwall-api: line-protocol transports for addressable LED wall controllers

pub mod error;
pub mod network;
pub mod protocol;
pub mod serial;
pub mod sim;
pub mod transport;

pub use error::{Error, ErrorKind};
pub use network::NetworkChannel;
pub use protocol::{ColorOrder, Command, Reply, Rgb};
pub use serial::{LineChannel, PortInfo, SerialChannel, list_ports, open_serial, resolve_port};
pub use sim::{FaultAction, SimHandle, SimulatedDevice};
pub use transport::{TransportChannel, TransportConfig, TransportKind};
