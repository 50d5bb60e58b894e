//! Transcript store backends.
//!
//! Both backends keep their live feeds in a [`FeedHub`](crate::transcript::FeedHub)
//! and publish a fresh list after every insert or delete.

mod file;
mod memory;

pub use file::FileTranscriptStore;
pub use memory::MemoryTranscriptStore;
