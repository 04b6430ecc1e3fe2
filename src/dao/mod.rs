/// Interaction record storage and retrieval operations.
pub mod interaction_store;
/// Storage abstraction layer for database operations.
pub mod storage;
