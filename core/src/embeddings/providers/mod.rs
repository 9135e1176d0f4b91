//! Embedding provider implementations

pub mod relace;

pub use relace::RelaceEmbedder;
