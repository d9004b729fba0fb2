pub mod classifier;
pub mod events;
pub mod http;
pub mod observability;
pub mod persistence;
pub mod providers;
pub mod runtime;
pub mod security;
pub mod workers;
