pub mod embedding_store;
pub mod global_identity;
pub mod identity_resolver;
pub mod similarity_index;
