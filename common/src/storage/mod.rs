pub mod db;
pub mod exchange_buffer;
pub mod types;
pub mod vector;
