//! Shared utilities.

pub mod semaphore;

pub use semaphore::SemaphoreRunner;
