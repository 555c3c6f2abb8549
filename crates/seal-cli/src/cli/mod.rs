pub mod args;
pub mod commands;
pub mod flags;
pub mod output;
