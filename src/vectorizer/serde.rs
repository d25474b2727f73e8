use crate::{error::CacheError, vectorizer::VectorSpace, RecordKey};

/// Opaque cache blob encoding of a `VectorSpace` (CBOR).
impl<K> VectorSpace<K>
where
    K: RecordKey,
{
    /// Encode into an opaque blob
    pub fn to_blob(&self) -> Result<Vec<u8>, CacheError> {
        serde_cbor::to_vec(self).map_err(|e| CacheError::Encode(e.to_string()))
    }

    /// Decode a blob produced by `to_blob`.
    /// A blob whose vectors do not match its vocabulary, or whose content does
    /// not match its fingerprint, is rejected.
    pub fn from_blob(bytes: &[u8]) -> Result<Self, CacheError> {
        let space: VectorSpace<K> =
            serde_cbor::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))?;
        if !space.is_consistent() {
            return Err(CacheError::Decode(format!(
                "vector length does not match vocabulary of {} terms",
                space.vocabulary.len()
            )));
        }
        if Self::fingerprint_of(&space.vocabulary, &space.vectors) != space.fingerprint {
            return Err(CacheError::Decode("fingerprint mismatch".to_string()));
        }
        Ok(space)
    }
}
