pub mod outbound;
pub mod repo;
pub mod repo_types;

pub use outbound::send_and_log;
pub use repo_types::{Direction, MessageLog};
