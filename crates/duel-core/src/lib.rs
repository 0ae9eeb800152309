pub mod code;
pub mod errors;
pub mod game;
pub mod ids;
pub mod registry;
pub mod session;

pub use errors::{RegistryError, SessionError};
pub use game::{resolve, Choice, Outcome};
pub use ids::{ConnectionId, RoomCode};
pub use registry::{SessionRegistry, SharedSession};
pub use session::Session;
