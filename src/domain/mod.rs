pub mod groups;
pub mod license;
pub mod models;
pub mod ranges;
pub mod snapshot;
