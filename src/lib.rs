pub mod cli;
pub mod config;
pub mod event;
pub mod http;
pub mod session;
pub mod util;
