//! Command line surface of the `scholarsight` binary.

mod args;
mod commands;

pub use args::{Cli, Commands, ConfigAction, SetArgs};
pub use commands::execute;
