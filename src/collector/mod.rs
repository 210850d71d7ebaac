pub mod discovery;
pub mod stream_collector;
