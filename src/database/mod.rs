pub mod list_cache;
pub mod output;
pub mod stream_cache;
