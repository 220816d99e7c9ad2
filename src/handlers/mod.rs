pub mod batches;
pub mod diagnostics;
pub mod health;

pub use batches::*;
pub use diagnostics::*;
pub use health::*;
