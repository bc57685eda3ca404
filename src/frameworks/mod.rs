// Frameworks layer: process wiring for the command-line client.

pub mod cli;
pub mod config;
pub mod logging;
