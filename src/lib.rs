pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fdsn;
pub mod fetcher;
pub mod isc;
pub mod map_plan;
pub mod output;
pub mod query;
pub mod store;
