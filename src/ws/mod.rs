pub mod coordinator;

pub use coordinator::{BroadcastCoordinator, ConnectionId, Outbound, WELCOME_MESSAGE};
