pub mod cli;
pub mod config;
pub mod conversation;
pub mod gateway;
pub mod server;
pub mod session;
