pub mod batch;
pub mod batch_requests;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod messages;

pub use batch::*;
pub use batch_requests::*;
pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use messages::*;
