//! Network subsystem for the TCP uplink

pub mod sender;
pub mod tcp;

pub use sender::{SenderHandle, SenderStats, SenderStatsSnapshot, SenderTask};
pub use tcp::{Connection, Connector, TcpConnection, TcpConnector};
