pub mod client;
pub mod gateway;
pub mod protocol;
pub mod router;
pub mod server;

pub use gateway::Gateway;
pub use router::{Limits, Router};
pub use server::{start, ServerConfig, ServerHandle};
