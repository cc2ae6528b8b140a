//! Retrieval layer: embedding, hybrid search, and context assembly.
//!
//! Converts a free-text query into a token-budgeted, citation-bearing
//! context bundle:
//!
//! ```text
//! query → Embedder → vector
//!       → SearchIndex (keyword + k-NN legs, engine-side fusion)
//!       → ranked SearchCandidates
//!       → assemble() → ContextBundle
//! ```
//!
//! The search engine's fused ordering is authoritative end to end; nothing
//! in this layer re-ranks locally.

pub mod assembler;
pub mod embedding;
pub mod search;

pub use assembler::{ContextBundle, SourceMetadata, TiktokenTokenizer, Tokenizer, assemble};
pub use embedding::{Embedder, EmbeddingVector, OpenAiEmbedder};
pub use search::{HybridSearchClient, SearchCandidate, SearchIndex};
