//! # lorebase-shared
//!
//! Storage-independent building blocks for the Lorebase knowledge store:
//! identifier and enum types, the fixed-width embedding codec, and the
//! cosine-similarity ranking used by retrieval.

pub mod constants;
pub mod embedding;
pub mod error;
pub mod similarity;
pub mod types;

pub use error::ParseError;
pub use similarity::Scored;
pub use types::{ProviderTier, RecipientSet, Role, Tenancy, UserId, Visibility};
