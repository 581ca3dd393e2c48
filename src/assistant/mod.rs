pub mod discover;
pub mod runner;
