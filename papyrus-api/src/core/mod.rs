pub mod cache;
pub mod config;
pub mod context;
pub mod generation;
pub mod ingest;
pub mod object_store;
pub mod session_manager;
pub mod state;
pub mod storage;
pub mod sweeper;
pub mod transcription;

#[cfg(test)]
pub mod testing;
