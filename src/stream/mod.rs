//! Stateful processors driven by successive input chunks.

pub mod block;
pub mod processor;

pub use block::{block_convolve, BlockConvolver, BlockFilter, FilterMethod};
pub use processor::StretchStream;
