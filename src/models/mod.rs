pub mod attempt;
pub mod intent;
pub mod order;
pub mod webhook_event;

pub use attempt::*;
pub use intent::*;
pub use order::*;
pub use webhook_event::*;
