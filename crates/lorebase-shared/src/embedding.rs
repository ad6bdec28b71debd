//! Fixed-width binary encoding of embedding vectors.
//!
//! Each component is the little-endian IEEE-754 bit pattern of an `f32`,
//! four bytes per component, concatenated in vector order. Every value,
//! including `-0.0`, survives a round trip bit for bit.

use crate::constants::EMBEDDING_WIDTH;

/// Encode a vector as a BLOB of `vector.len() * 4` bytes.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * EMBEDDING_WIDTH);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`encode`].
///
/// Returns `None` when the length is not a multiple of four; a truncated
/// blob is reported as corrupt rather than decoded partially.
pub fn decode(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % EMBEDDING_WIDTH != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(EMBEDDING_WIDTH)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bitwise_eq(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_eq!(x.to_bits(), y.to_bits(), "{x} vs {y}");
        }
    }

    #[test]
    fn layout_is_little_endian_ieee754() {
        let blob = encode(&[1.0, -2.5]);
        assert_eq!(blob, vec![0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x20, 0xc0]);
    }

    #[test]
    fn zero_and_negative_zero_keep_their_bits() {
        let v = vec![0.0f32, -0.0, 0.0, -0.0];
        let blob = encode(&v);
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[4..8], &[0x00, 0x00, 0x00, 0x80]);
        let back = decode(&blob).unwrap();
        assert_bitwise_eq(&v, &back);
        assert!(back[1].is_sign_negative());
    }

    #[test]
    fn extremes_round_trip() {
        let v = vec![
            f32::MAX,
            f32::MIN,
            f32::MIN_POSITIVE,
            -f32::MIN_POSITIVE,
            f32::EPSILON,
            1.0e-45, // smallest subnormal
            -123.456,
            0.1,
        ];
        assert_bitwise_eq(&v, &decode(&encode(&v)).unwrap());
    }

    #[test]
    fn empty_vector_is_empty_blob() {
        assert!(encode(&[]).is_empty());
        assert_eq!(decode(&[]), Some(vec![]));
    }

    #[test]
    fn misaligned_blob_is_rejected() {
        let mut blob = encode(&[1.0, 2.0]);
        blob.pop();
        assert_eq!(decode(&blob), None);
        assert_eq!(decode(&[0x00]), None);
    }
}
