pub mod apply;
pub mod config;
pub mod package;
pub mod validate;
