pub mod args;
pub mod commands;

pub use args::{Cli, Commands, Method};
pub use commands::run;
