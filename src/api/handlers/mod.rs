pub mod health;
pub mod payments;
pub mod webhooks;

pub use health::*;
pub use payments::*;
pub use webhooks::*;
