pub mod handler;
pub mod meta_command;
