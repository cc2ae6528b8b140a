//! Context assembly under a hard token budget.
//!
//! Folds ranked search candidates into a single citation-bearing context
//! string, stopping before the first chunk that would push the bundle
//! past the caller-supplied budget. Chunks are included whole or not at
//! all, in the fused rank order the search engine returned.

use tracing::debug;

use crate::error::RetrievalError;
use crate::retrieval::search::SearchCandidate;

/// Trait for counting language-model tokens in a piece of text.
///
/// Pluggable so tests can use a deterministic counter while production
/// uses the real model tokenizer.
pub trait Tokenizer: Send + Sync {
    /// Counts the tokens the given text occupies.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Assembly`] if the text cannot be tokenized.
    fn count_tokens(&self, text: &str) -> Result<usize, RetrievalError>;
}

/// Tokenizer backed by the `cl100k_base` BPE used by GPT-family models.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenTokenizer {
    /// Loads the `cl100k_base` encoding.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Assembly`] if the encoding tables fail to load.
    pub fn new() -> Result<Self, RetrievalError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| RetrievalError::Assembly {
            message: format!("failed to load cl100k_base encoding: {e}"),
        })?;
        Ok(Self { bpe })
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer").finish_non_exhaustive()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize, RetrievalError> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Provenance metadata for an assembled bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    /// First non-empty filename seen among included candidates.
    pub filename: String,
    /// First non-empty file URL seen among included candidates.
    pub file_url: String,
    /// Number of chunks included in the bundle.
    pub chunks_used: usize,
    /// Maximum `total_chunks` across all candidates, included or not.
    pub chunks_available: usize,
}

/// A token-bounded, citation-bearing context block.
///
/// Built once per query; `token_count` never exceeds the budget the
/// caller supplied to [`assemble`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    /// Formatted context string handed to the prompt renderer.
    pub output_text: String,
    /// Tokens the formatted string occupies.
    pub token_count: usize,
    /// Whether candidates were dropped to stay within budget.
    pub truncated: bool,
    /// Provenance of the included chunks.
    pub source: SourceMetadata,
}

/// Explicit accumulator for the candidate fold.
///
/// Replaces shared mutable locals so each step of the fold is a plain
/// value transition that tests can reason about.
#[derive(Debug, Default)]
struct Accumulator {
    chunks: Vec<String>,
    chunk_tokens: Vec<usize>,
    tokens: usize,
    chunks_used: usize,
    truncated: bool,
    filename: String,
    file_url: String,
}

impl Accumulator {
    fn push(&mut self, wrapped: String, cost: usize, candidate: &SearchCandidate) {
        self.tokens += cost;
        self.chunks.push(wrapped);
        self.chunk_tokens.push(cost);
        self.chunks_used += 1;
        // First-wins provenance: later candidates never overwrite it.
        if self.filename.is_empty() && !candidate.filename.is_empty() {
            self.filename = candidate.filename.clone();
        }
        if self.file_url.is_empty() && !candidate.file_url.is_empty() {
            self.file_url = candidate.file_url.clone();
        }
    }

    fn pop(&mut self) {
        if self.chunks.pop().is_some() {
            self.chunks_used -= 1;
            self.tokens -= self.chunk_tokens.pop().unwrap_or(0);
        }
    }
}

/// Wraps one chunk's text in the provenance delimiter.
fn wrap_chunk(description: &str) -> String {
    format!("<context>\n{description}\n</context>\n")
}

/// Renders the final summary string for the bundle.
///
/// The concatenated content is additionally truncated to `max_tokens`
/// characters, a cheap safety bound distinct from the token budget.
fn render_summary(acc: &Accumulator, chunks_available: usize, max_tokens: usize) -> String {
    let content: String = acc.chunks.concat();
    let content: String = content.chars().take(max_tokens).collect();
    format!(
        "Assembled {used} of {avail} knowledge-base chunks:\n\n{content}\nSource file: {filename}\nSource URL: {file_url}\n",
        used = acc.chunks_used,
        avail = chunks_available,
        filename = acc.filename,
        file_url = acc.file_url,
    )
}

/// Assembles ranked candidates into a token-bounded [`ContextBundle`].
///
/// Candidates are consumed in the order received. Each is wrapped in the
/// provenance delimiter, token-counted, and included only if it fits the
/// remaining budget whole; the first chunk that does not fit stops the
/// fold with `truncated = true`. The final `token_count` is computed by
/// re-tokenizing the complete formatted summary, since the summary
/// wrapper itself consumes tokens; if that pushes past the budget, chunks
/// are dropped from the tail until the rendered bundle fits.
///
/// An empty candidate list yields an empty bundle — success, not an error.
///
/// # Errors
///
/// Returns [`RetrievalError::Assembly`] if tokenization fails; partial
/// bundles are never returned on error.
pub fn assemble(
    candidates: &[SearchCandidate],
    tokenizer: &dyn Tokenizer,
    max_tokens: usize,
) -> Result<ContextBundle, RetrievalError> {
    if candidates.is_empty() {
        return Ok(ContextBundle::default());
    }

    let chunks_available = candidates
        .iter()
        .map(|c| c.total_chunks as usize)
        .max()
        .unwrap_or(0);

    let mut acc = Accumulator::default();
    for candidate in candidates {
        let wrapped = wrap_chunk(&candidate.description);
        let cost = tokenizer.count_tokens(&wrapped)?;
        if acc.tokens + cost > max_tokens {
            acc.truncated = true;
            break;
        }
        acc.push(wrapped, cost, candidate);
    }

    loop {
        if acc.chunks.is_empty() {
            // Nothing fits, not even the summary scaffold. Empty output
            // keeps the budget invariant; provenance records what was seen.
            return Ok(ContextBundle {
                output_text: String::new(),
                token_count: 0,
                truncated: true,
                source: SourceMetadata {
                    filename: acc.filename,
                    file_url: acc.file_url,
                    chunks_used: 0,
                    chunks_available,
                },
            });
        }

        let output_text = render_summary(&acc, chunks_available, max_tokens);
        let token_count = tokenizer.count_tokens(&output_text)?;
        if token_count <= max_tokens {
            debug!(
                chunks_used = acc.chunks_used,
                chunks_available,
                token_count,
                truncated = acc.truncated,
                "context bundle assembled"
            );
            return Ok(ContextBundle {
                output_text,
                token_count,
                truncated: acc.truncated,
                source: SourceMetadata {
                    filename: acc.filename,
                    file_url: acc.file_url,
                    chunks_used: acc.chunks_used,
                    chunks_available,
                },
            });
        }

        // Summary framing pushed the bundle over budget. Drop the
        // lowest-ranked included chunk and re-render.
        acc.pop();
        acc.truncated = true;
    }
}
