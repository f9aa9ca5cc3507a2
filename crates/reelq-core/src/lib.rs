pub mod config;
pub mod logging;

// Engine modules
pub mod control;
pub mod delivery;
pub mod fetch;
pub mod media;
pub mod scheduler;
pub mod url_model;
