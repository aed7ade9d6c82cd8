#![allow(clippy::missing_docs_in_private_items)]

pub mod indexer;
pub mod utils;

pub use indexer::ContentIndexer;
