pub mod bootstrap;
pub mod commands;
pub mod license_gate;
pub mod share;
pub mod store;
