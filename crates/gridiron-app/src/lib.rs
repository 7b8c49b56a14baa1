// Gridiron command-line application: configuration and subcommands.

pub mod commands;
pub mod config;
