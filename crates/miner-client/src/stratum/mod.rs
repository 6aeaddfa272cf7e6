//! Stratum V1 client: wire messages, line transport and the pool session.

pub mod messages;
pub mod session;
pub mod transport;

pub use session::{derive_context, Session, ShareStatus};
pub use transport::{TcpTransport, Transport};
