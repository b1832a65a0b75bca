pub mod block_encoder;
pub mod indexer;
pub mod run_merger;
pub mod run_writer;
