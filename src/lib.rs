// Library exports for ssmtail

pub mod cli;
pub mod config;
pub mod error;
pub mod logs;
pub mod select;
pub mod session;
pub mod stream;
