pub mod app;
pub mod control;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod normalize;
pub mod relay;
pub mod status;
