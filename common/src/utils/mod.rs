pub mod config;
pub mod embedding;
pub mod llm;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
