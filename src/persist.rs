//! Binary weight stream.
//!
//! Layout, in order, both sections bincode-encoded:
//!
//! 1. unlabeled weights: `u64` entry count, then `(FeatureId, f64)` pairs
//! 2. labeled weights: `u64` entry count, then `(FeatureId, Label, f64)` triples
//!
//! Averaging accumulators are not part of the stream.

use crate::error::Result;
use crate::feature::{FeatureId, Label};
use crate::sparse::{SparseLabeledVector, SparseVector};
use std::io::{Read, Write};

pub(crate) fn write_weights<W: Write>(
    mut writer: W,
    weights: &SparseVector,
    labeled_weights: &SparseLabeledVector,
) -> Result<()> {
    bincode::serialize_into(&mut writer, weights)?;
    bincode::serialize_into(&mut writer, labeled_weights)?;
    Ok(())
}

pub(crate) fn read_weights<R: Read>(mut reader: R) -> Result<(SparseVector, SparseLabeledVector)> {
    let entries: Vec<(FeatureId, f64)> = bincode::deserialize_from(&mut reader)?;
    let weights = SparseVector::from_entries(entries)?;

    let entries: Vec<(FeatureId, Label, f64)> = bincode::deserialize_from(&mut reader)?;
    let labeled_weights = SparseLabeledVector::from_entries(entries)?;

    Ok((weights, labeled_weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_sections_are_read_in_order() {
        let mut weights = SparseVector::new();
        weights.add(1, 1.0);
        let mut labeled = SparseLabeledVector::new();
        labeled.add(2, 3, 4.0);
        labeled.add(2, 5, 6.0);

        let mut buffer = Vec::new();
        write_weights(&mut buffer, &weights, &labeled).unwrap();

        let (w, l) = read_weights(buffer.as_slice()).unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w.get(1), 1.0);
        assert_eq!(l.len(), 2);
        assert_eq!(l.get(2, 5), 6.0);
    }

    #[test]
    fn test_count_prefix() {
        let mut weights = SparseVector::new();
        weights.add(1, 1.0);
        weights.add(2, 1.0);

        let mut buffer = Vec::new();
        write_weights(&mut buffer, &weights, &SparseLabeledVector::new()).unwrap();

        let count = u64::from_le_bytes(buffer[..8].try_into().unwrap());
        assert_eq!(count, 2);
        // two (u64, f64) pairs plus the empty labeled section's count
        assert_eq!(buffer.len(), 8 + 2 * 16 + 8);
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let mut weights = SparseVector::new();
        weights.add(1, 1.0);

        let mut buffer = Vec::new();
        write_weights(&mut buffer, &weights, &SparseLabeledVector::new()).unwrap();
        buffer.truncate(buffer.len() - 4);

        assert!(matches!(
            read_weights(buffer.as_slice()),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_duplicate_entries_are_rejected() {
        let mut buffer = Vec::new();
        let dup: Vec<(FeatureId, f64)> = vec![(1, 1.0), (1, 2.0)];
        bincode::serialize_into(&mut buffer, &dup).unwrap();
        bincode::serialize_into(&mut buffer, &Vec::<(FeatureId, Label, f64)>::new()).unwrap();

        assert!(matches!(
            read_weights(buffer.as_slice()),
            Err(Error::DuplicateKey(_))
        ));
    }
}
