pub mod client;
pub mod config;
pub mod display;
pub mod domain;
pub mod error;
pub mod index;
pub mod output;
pub mod pairwise;
pub mod parsers;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod store;
