//! Exact flat similarity index over unit-normalised vectors.
//!
//! [`FlatIndex`] stores one normalised copy of every chunk vector in a single
//! contiguous buffer and answers queries by brute-force L2 distance.
//! [`EmbeddingIndex`] pairs a `FlatIndex` with the chunk sequence it was
//! built from; the index only holds positions, the text lives in the chunks.
//!
//! # Artifact format
//!
//! ```text
//! offset  size        field
//! 0       4           magic  b"CAFX"
//! 4       4           format version (u32 LE, currently 1)
//! 8       4           dimension (u32 LE)
//! 12      4           vector count (u32 LE)
//! 16      4·dim·count normalised vectors, f32 LE, row-major
//! ```

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Chunk, ScoredChunk};
use crate::vector::{l2_distance_squared, l2_normalize};

const ARTIFACT_MAGIC: &[u8; 4] = b"CAFX";
const ARTIFACT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// A brute-force exact nearest-neighbour index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    count: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Normalise and add every vector. All vectors must share one dimension.
    pub fn build<'a, I>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut iter = vectors.into_iter().peekable();
        let dim = match iter.peek() {
            Some(first) => first.len(),
            None => return Err(Error::EmptyChunkSet),
        };
        if dim == 0 {
            return Err(Error::ZeroDimension);
        }

        let mut data = Vec::new();
        let mut count = 0;
        for v in iter {
            if v.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: v.len(),
                });
            }
            data.extend(l2_normalize(v));
            count += 1;
        }

        Ok(Self { dim, count, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The normalised vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.count {
            return None;
        }
        let start = position * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Iterate over the stored normalised vectors in insertion order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    /// Return `(position, distance)` for the `k` nearest vectors, ascending by
    /// distance with ties broken by ascending position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k > self.count {
            return Err(Error::InsufficientChunks {
                requested: k,
                available: self.count,
            });
        }

        let q = l2_normalize(query);
        let mut scored: Vec<(usize, f32)> = self
            .vectors()
            .enumerate()
            .map(|(pos, v)| (pos, l2_distance_squared(&q, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, d2)| (pos, d2.sqrt()))
            .collect())
    }

    /// Encode the index as an opaque artifact (see module docs).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(ARTIFACT_MAGIC);
        out.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dim as u32).to_le_bytes());
        out.extend_from_slice(&(self.count as u32).to_le_bytes());
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decode an artifact produced by [`FlatIndex::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::CorruptArtifact(format!(
                "{} bytes is shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != ARTIFACT_MAGIC {
            return Err(Error::CorruptArtifact("bad magic".to_string()));
        }
        let version = read_u32(&bytes[4..8]);
        if version != ARTIFACT_VERSION {
            return Err(Error::CorruptArtifact(format!(
                "unsupported version {}",
                version
            )));
        }
        let dim = read_u32(&bytes[8..12]) as usize;
        let count = read_u32(&bytes[12..16]) as usize;
        if dim == 0 || count == 0 {
            return Err(Error::CorruptArtifact(format!(
                "empty index (dim={}, count={})",
                dim, count
            )));
        }

        let expected = dim
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| Error::CorruptArtifact("size overflow".to_string()))?;
        if bytes.len() != expected {
            return Err(Error::CorruptArtifact(format!(
                "expected {} bytes, found {}",
                expected,
                bytes.len()
            )));
        }

        let data = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self { dim, count, data })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// The chunks of one context together with the similarity index over them.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    chunks: Vec<Chunk>,
    index: Option<FlatIndex>,
}

impl EmbeddingIndex {
    /// An index with no chunks and nothing built.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index directly from an ordered chunk sequence.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
        let mut idx = Self::new();
        idx.build(chunks)?;
        Ok(idx)
    }

    /// Replace the chunks and build a fresh index over them.
    ///
    /// Positions are taken from sequence order: the chunk at position `i`
    /// gets `chunk_index = i`. On failure the index is left unset.
    pub fn build(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        self.index = None;
        let built = FlatIndex::build(chunks.iter().map(|c| c.vector.as_slice()))?;
        self.chunks = chunks;
        for (i, chunk) in self.chunks.iter_mut().enumerate() {
            chunk.chunk_index = i;
        }
        debug!(
            chunks = built.len(),
            dim = built.dim(),
            "built flat similarity index"
        );
        self.index = Some(built);
        Ok(())
    }

    /// Rebuild the index from the chunks currently attached.
    pub fn rebuild(&mut self) -> Result<()> {
        let chunks = self.chunks.clone();
        self.build(chunks)
    }

    /// Swap in a new chunk set without touching the index.
    ///
    /// Used when a stored index artifact is attached to chunk text loaded
    /// separately. If the content actually changed, call [`rebuild`](Self::rebuild)
    /// before querying.
    pub fn replace_chunks(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Err(Error::EmptyChunkSet);
        }
        self.chunks = chunks;
        Ok(())
    }

    /// Attach a previously serialized index.
    pub fn attach_index(&mut self, index: FlatIndex) {
        self.index = Some(index);
    }

    /// Return the `k` chunks nearest to `vector`, nearest first.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let index = self.index.as_ref().ok_or(Error::IndexNotBuilt)?;
        if index.len() != self.chunks.len() {
            return Err(Error::IndexOutOfSync {
                indexed: index.len(),
                chunks: self.chunks.len(),
            });
        }

        index
            .search(vector, k)?
            .into_iter()
            .map(|(pos, distance)| {
                let chunk = self.chunks.get(pos).ok_or(Error::IndexOutOfSync {
                    indexed: index.len(),
                    chunks: self.chunks.len(),
                })?;
                Ok(ScoredChunk {
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    distance,
                })
            })
            .collect()
    }

    /// Serialize the index structure; chunk text is not included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.index
            .as_ref()
            .map(FlatIndex::serialize)
            .ok_or(Error::IndexNotBuilt)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn flat_index(&self) -> Option<&FlatIndex> {
        self.index.as_ref()
    }

    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunks_from_pairs;

    fn doc1() -> EmbeddingIndex {
        EmbeddingIndex::from_chunks(chunks_from_pairs(vec![
            ("alpha", vec![1.0, 0.0, 0.0]),
            ("beta", vec![0.0, 1.0, 0.0]),
            ("gamma", vec![0.0, 0.0, 1.0]),
        ]))
        .unwrap()
    }

    fn texts(results: &[ScoredChunk]) -> Vec<&str> {
        results.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_query_top_one() {
        let idx = doc1();
        let results = idx.query(&[0.9, 0.1, 0.0], 1).unwrap();
        assert_eq!(texts(&results), vec!["alpha"]);
    }

    #[test]
    fn test_query_all_in_distance_order() {
        let idx = doc1();
        let results = idx.query(&[0.9, 0.1, 0.0], 3).unwrap();
        assert_eq!(texts(&results), vec!["alpha", "beta", "gamma"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_query_normalises_unnormalised_input() {
        let idx = EmbeddingIndex::from_chunks(chunks_from_pairs(vec![
            ("short", vec![0.1, 0.0]),
            ("long", vec![0.0, 50.0]),
        ]))
        .unwrap();
        let results = idx.query(&[100.0, 1.0], 1).unwrap();
        assert_eq!(texts(&results), vec!["short"]);
        assert!(results[0].distance < 0.1);
    }

    #[test]
    fn test_ties_broken_by_chunk_index() {
        let idx = EmbeddingIndex::from_chunks(chunks_from_pairs(vec![
            ("first", vec![0.0, 1.0]),
            ("second", vec![0.0, 2.0]),
            ("third", vec![1.0, 0.0]),
        ]))
        .unwrap();
        let results = idx.query(&[0.0, 1.0], 2).unwrap();
        assert_eq!(texts(&results), vec!["first", "second"]);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 1);
    }

    #[test]
    fn test_k_larger_than_count_is_rejected() {
        let idx = doc1();
        let err = idx.query(&[1.0, 0.0, 0.0], 4).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientChunks {
                requested: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn test_empty_build_leaves_index_unset() {
        let mut idx = EmbeddingIndex::new();
        let err = idx.build(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyChunkSet));
        assert!(!idx.is_built());
        let err = idx.query(&[1.0], 1).unwrap_err();
        assert!(matches!(err, Error::IndexNotBuilt));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err = EmbeddingIndex::from_chunks(chunks_from_pairs(vec![
            ("a", vec![1.0, 0.0]),
            ("b", vec![1.0, 0.0, 0.0]),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_query_dimension_checked() {
        let idx = doc1();
        let err = idx.query(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_build_renumbers_positions() {
        let idx = EmbeddingIndex::from_chunks(vec![
            Chunk::new(7, "x", vec![1.0]),
            Chunk::new(3, "y", vec![1.0]),
        ])
        .unwrap();
        let positions: Vec<usize> = idx.chunks().iter().map(|c| c.chunk_index).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let idx = doc1();
        let bytes = idx.serialize().unwrap();
        let restored = FlatIndex::deserialize(&bytes).unwrap();
        assert_eq!(Some(&restored), idx.flat_index());
        assert_eq!(restored.dim(), 3);
        assert_eq!(restored.len(), 3);
    }

    #[test]
    fn test_serialize_requires_index() {
        let idx = EmbeddingIndex::new();
        assert!(matches!(idx.serialize(), Err(Error::IndexNotBuilt)));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            FlatIndex::deserialize(b"nope"),
            Err(Error::CorruptArtifact(_))
        ));

        let mut bytes = doc1().serialize().unwrap();
        bytes.pop();
        assert!(matches!(
            FlatIndex::deserialize(&bytes),
            Err(Error::CorruptArtifact(_))
        ));

        let mut bytes = doc1().serialize().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            FlatIndex::deserialize(&bytes),
            Err(Error::CorruptArtifact(_))
        ));
    }

    #[test]
    fn test_replace_chunks_then_attach_index() {
        let original = doc1();
        let artifact = FlatIndex::deserialize(&original.serialize().unwrap()).unwrap();

        let mut loaded = EmbeddingIndex::new();
        loaded.replace_chunks(original.chunks().to_vec()).unwrap();
        assert!(matches!(
            loaded.query(&[1.0, 0.0, 0.0], 1),
            Err(Error::IndexNotBuilt)
        ));
        loaded.attach_index(artifact);

        let results = loaded.query(&[0.9, 0.1, 0.0], 3).unwrap();
        assert_eq!(texts(&results), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_replace_chunks_does_not_rebuild() {
        let mut idx = doc1();
        idx.replace_chunks(chunks_from_pairs(vec![("only", vec![1.0, 0.0, 0.0])]))
            .unwrap();
        assert!(matches!(
            idx.query(&[1.0, 0.0, 0.0], 1),
            Err(Error::IndexOutOfSync {
                indexed: 3,
                chunks: 1
            })
        ));
        idx.rebuild().unwrap();
        let results = idx.query(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(texts(&results), vec!["only"]);
    }

    #[test]
    fn test_replace_chunks_rejects_empty() {
        let mut idx = doc1();
        assert!(matches!(
            idx.replace_chunks(Vec::new()),
            Err(Error::EmptyChunkSet)
        ));
        assert_eq!(idx.len(), 3);
    }
}
