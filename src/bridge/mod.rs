// Local HTTP bridge between a viewer front-end and the reading tracker.

pub mod models;
pub mod routes;
pub mod services;

pub use routes::ReaderBridgeApi;
