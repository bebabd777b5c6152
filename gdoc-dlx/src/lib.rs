pub mod cli;
pub mod ingest;
pub mod load_config;
pub mod retro;

pub use cli::{run, Cli, Commands};
