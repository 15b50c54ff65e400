pub mod builder;
pub mod config;
pub mod engine;
pub mod html;
pub mod loader;
pub mod output;
pub mod payload;
pub mod stats;
pub mod types;
pub mod util;
