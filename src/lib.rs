pub mod codec;
pub mod config;
pub mod error;
pub mod frontend;
pub mod index;
pub mod indexer;
pub mod query_parser;
pub mod query_processor;
pub mod scoring;
pub mod search_engine;
pub mod utils;
