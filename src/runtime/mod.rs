//! Runtime adapters for spawning worker tasks.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
