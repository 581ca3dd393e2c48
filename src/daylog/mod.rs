pub mod aggregate;
pub mod audit;
pub mod config;
pub mod entry;
pub mod messages;
pub mod paths;
pub mod report;
pub mod retention;
pub mod store;
pub mod summarize;
pub mod template;
pub mod util;
pub mod warn;
