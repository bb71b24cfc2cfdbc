pub mod config;
pub mod error;
pub mod kv_store;
pub mod license_client;
pub mod state_codec;
