pub mod sessions;
pub mod vector;

pub use sessions::InMemorySessionStore;
pub use vector::{build_index, cosine_similarity, InMemoryVectorIndex};
