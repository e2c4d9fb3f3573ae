pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, SessionError, TetherError, TransportError};
pub use events::EventBus;
pub use id::{new_id, InstanceId};

pub type Result<T> = std::result::Result<T, TetherError>;
