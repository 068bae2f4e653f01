//! Structural equivalence of contexts.
//!
//! Two contexts are equivalent when a store may reuse one in place of the
//! other: identical metadata, identical index shape, and identical indexed
//! content. Content is compared through a deterministic SHA-256
//! [`fingerprint`] over the normalised vectors (bit patterns) and the chunk
//! text, so the check is pure and repeatable.

use sha2::{Digest, Sha256};

use crate::context::Context;

/// Deterministic content hash of a context's index and chunk text.
///
/// Returns `None` when no index has been built.
pub fn fingerprint(context: &Context) -> Option<String> {
    let index = context.index().flat_index()?;

    let mut hasher = Sha256::new();
    hasher.update((index.dim() as u64).to_le_bytes());
    hasher.update((index.len() as u64).to_le_bytes());
    for vector in index.vectors() {
        for value in vector {
            hasher.update(value.to_bits().to_le_bytes());
        }
    }
    for chunk in context.chunks() {
        hasher.update((chunk.text.len() as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
    }

    Some(format!("{:x}", hasher.finalize()))
}

/// True when `a` and `b` are interchangeable for retrieval.
///
/// A context without a built index is never equivalent to anything,
/// including itself.
pub fn equivalent(a: &Context, b: &Context) -> bool {
    if a.name != b.name
        || a.associated_doc_name != b.associated_doc_name
        || a.embedding_model != b.embedding_model
    {
        return false;
    }

    let (ia, ib) = match (a.index().flat_index(), b.index().flat_index()) {
        (Some(ia), Some(ib)) => (ia, ib),
        _ => return false,
    };
    if ia.dim() != ib.dim() || ia.len() != ib.len() {
        return false;
    }

    fingerprint(a) == fingerprint(b)
}
