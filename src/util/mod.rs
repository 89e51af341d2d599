pub mod hook;
pub mod log;
pub mod paths;
