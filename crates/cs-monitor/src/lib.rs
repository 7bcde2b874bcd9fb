pub mod candump;
pub mod config;
pub mod replay;
