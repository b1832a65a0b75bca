pub mod query_processor;
pub mod retrieval_algorithms;
