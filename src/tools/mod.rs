pub mod generate;
pub mod project;
pub mod providers;
