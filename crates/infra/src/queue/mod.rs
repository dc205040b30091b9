//! Offline queue implementations
//!
//! Both keep items in drain order (priority tier, then creation sequence).

mod file;
mod memory;
mod state;

pub use file::FileOfflineQueue;
pub use memory::InMemoryOfflineQueue;
