pub mod config;
pub mod dispatch;
pub mod error;
pub mod generate;
pub mod parsers;
pub mod project;
pub mod response;
pub mod server;
pub mod tools;
pub mod validation;
