pub mod attempt_repo;
pub mod intent_repo;
pub mod order_repo;

pub use attempt_repo::PgAttemptStore;
pub use intent_repo::PgPaymentStore;
pub use order_repo::PgOrderStore;
