// Topic canonicalization: similarity providers and greedy clustering.

pub mod canonical;
pub mod download;
pub mod embeddings;
pub mod lexical;
pub mod traits;
