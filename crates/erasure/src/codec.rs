//! Systematic Reed-Solomon erasure coding over GF(2^8)
//!
//! A chunk is cut into `data_shards` equal-length shards (the last one zero
//! padded). Byte column `c` of the data shards is read as the values of a
//! polynomial of degree `< data_shards` at the points `0, 1, .., k - 1`;
//! parity shard `p` holds the same polynomial evaluated at `k + p`.
//!
//! Any `data_shards` of the `data_shards + parity_shards` shards determine
//! the polynomial, so the original bytes can be rebuilt by Lagrange
//! interpolation as long as no more than `parity_shards` shards are lost.
//! Data shards are stored verbatim, so the common case (nothing lost) is a
//! plain concatenation.

use crate::galois::{FieldError, GaloisField256, FIELD_SIZE};

/// Errors that can occur while encoding or reconstructing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErasureError {
    #[error("invalid codec parameters: {0}")]
    InvalidParameters(String),
    #[error("expected {expected} shards, got {got}")]
    ShardCount { expected: usize, got: usize },
    #[error("shard {index} has length {got}, expected {expected}")]
    ShardLength {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("need {needed} intact shards to reconstruct, only {available} available")]
    TooFewShards { needed: usize, available: usize },
    #[error("field error: {0}")]
    Field(#[from] FieldError),
}

/// Reed-Solomon codec with a fixed shard layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErasureCodec {
    data_shards: usize,
    parity_shards: usize,
}

impl ErasureCodec {
    /// Create a codec producing `data_shards + parity_shards` shards per chunk
    ///
    /// # Errors
    ///
    /// Requires at least one data shard, and every shard needs a distinct
    /// evaluation point, so the total may not exceed 255.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, ErasureError> {
        if data_shards == 0 {
            return Err(ErasureError::InvalidParameters(
                "at least one data shard is required".to_string(),
            ));
        }
        let total = data_shards + parity_shards;
        if total >= FIELD_SIZE {
            return Err(ErasureError::InvalidParameters(format!(
                "{} shards exceed the {} available evaluation points",
                total,
                FIELD_SIZE - 1
            )));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Length of every shard for an input of `len` bytes
    pub fn shard_len(&self, len: usize) -> usize {
        len.div_ceil(self.data_shards)
    }

    /// Split `data` into data shards and compute the parity shards
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, ErasureError> {
        let shard_len = self.shard_len(data.len());
        let mut shards = Vec::with_capacity(self.total_shards());

        for i in 0..self.data_shards {
            let start = (i * shard_len).min(data.len());
            let end = ((i + 1) * shard_len).min(data.len());
            let mut shard = data[start..end].to_vec();
            shard.resize(shard_len, 0);
            shards.push(shard);
        }

        let data_points = self.points(0..self.data_shards);
        for p in 0..self.parity_shards {
            let target = (self.data_shards + p) as u8;
            let coefficients = lagrange_coefficients(&data_points, target)?;
            let sources: Vec<&[u8]> = shards[..self.data_shards]
                .iter()
                .map(Vec::as_slice)
                .collect();
            shards.push(combine(&sources, &coefficients, shard_len));
        }

        Ok(shards)
    }

    /// Rebuild the original `original_len` bytes from whichever shards survived
    ///
    /// `shards` is indexed by shard position; `None` marks a lost or
    /// discarded shard.
    pub fn reconstruct(
        &self,
        shards: &[Option<Vec<u8>>],
        original_len: usize,
    ) -> Result<Vec<u8>, ErasureError> {
        if shards.len() != self.total_shards() {
            return Err(ErasureError::ShardCount {
                expected: self.total_shards(),
                got: shards.len(),
            });
        }
        let shard_len = self.shard_len(original_len);
        for (index, shard) in shards.iter().enumerate() {
            if let Some(shard) = shard {
                if shard.len() != shard_len {
                    return Err(ErasureError::ShardLength {
                        index,
                        expected: shard_len,
                        got: shard.len(),
                    });
                }
            }
        }

        let available: Vec<usize> = shards
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .take(self.data_shards)
            .collect();
        if available.len() < self.data_shards {
            return Err(ErasureError::TooFewShards {
                needed: self.data_shards,
                available: available.len(),
            });
        }

        let points = self.points(available.iter().copied());
        let sources: Vec<&[u8]> = available
            .iter()
            .filter_map(|&i| shards[i].as_deref())
            .collect();

        let mut out = Vec::with_capacity(shard_len * self.data_shards);
        for i in 0..self.data_shards {
            match &shards[i] {
                Some(shard) => out.extend_from_slice(shard),
                None => {
                    tracing::debug!("reconstructing data shard {}", i);
                    let coefficients = lagrange_coefficients(&points, i as u8)?;
                    out.extend_from_slice(&combine(&sources, &coefficients, shard_len));
                }
            }
        }
        out.truncate(original_len);
        Ok(out)
    }

    fn points(&self, indices: impl Iterator<Item = usize>) -> Vec<u8> {
        indices.map(|i| i as u8).collect()
    }
}

/// Lagrange basis values `L_j(target)` for the given distinct points
fn lagrange_coefficients(points: &[u8], target: u8) -> Result<Vec<u8>, FieldError> {
    let mut coefficients = Vec::with_capacity(points.len());
    for (j, &xj) in points.iter().enumerate() {
        let mut numerator = 1u8;
        let mut denominator = 1u8;
        for (m, &xm) in points.iter().enumerate() {
            if m == j {
                continue;
            }
            numerator = GaloisField256::mul(numerator, GaloisField256::add(target, xm));
            denominator = GaloisField256::mul(denominator, GaloisField256::add(xj, xm));
        }
        coefficients.push(GaloisField256::div(numerator, denominator)?);
    }
    Ok(coefficients)
}

/// Column-wise linear combination of equal-length shards
fn combine(sources: &[&[u8]], coefficients: &[u8], shard_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; shard_len];
    for (source, &coefficient) in sources.iter().zip(coefficients) {
        if coefficient == 0 {
            continue;
        }
        for (acc, &byte) in out.iter_mut().zip(source.iter()) {
            *acc ^= GaloisField256::mul(byte, coefficient);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn test_codec_parameters() {
        assert!(ErasureCodec::new(0, 2).is_err());
        assert!(ErasureCodec::new(200, 55).is_err());
        let codec = ErasureCodec::new(200, 54).unwrap();
        assert_eq!(codec.total_shards(), 254);
    }

    #[test]
    fn test_data_shards_are_systematic() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let data = sample(10);
        let shards = codec.encode(&data).unwrap();
        assert_eq!(shards.len(), 6);
        assert!(shards.iter().all(|s| s.len() == 3));
        assert_eq!(&shards[0], &data[0..3]);
        assert_eq!(&shards[3], &[data[9], 0, 0]);
    }

    #[test]
    fn test_reconstruct_without_loss() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let data = sample(1000);
        let shards: Vec<Option<Vec<u8>>> =
            codec.encode(&data).unwrap().into_iter().map(Some).collect();
        assert_eq!(codec.reconstruct(&shards, data.len()).unwrap(), data);
    }

    #[test]
    fn test_reconstruct_any_parity_sized_loss() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let data = sample(777);
        let encoded = codec.encode(&data).unwrap();
        for a in 0..6 {
            for b in (a + 1)..6 {
                let mut shards: Vec<Option<Vec<u8>>> =
                    encoded.iter().cloned().map(Some).collect();
                shards[a] = None;
                shards[b] = None;
                assert_eq!(
                    codec.reconstruct(&shards, data.len()).unwrap(),
                    data,
                    "lost shards {} and {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_too_many_lost_shards() {
        let codec = ErasureCodec::new(3, 1).unwrap();
        let data = sample(30);
        let mut shards: Vec<Option<Vec<u8>>> =
            codec.encode(&data).unwrap().into_iter().map(Some).collect();
        shards[0] = None;
        shards[2] = None;
        assert_eq!(
            codec.reconstruct(&shards, data.len()),
            Err(ErasureError::TooFewShards {
                needed: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_shard_shape_is_checked() {
        let codec = ErasureCodec::new(2, 1).unwrap();
        let data = sample(8);
        let mut shards: Vec<Option<Vec<u8>>> =
            codec.encode(&data).unwrap().into_iter().map(Some).collect();
        assert!(matches!(
            codec.reconstruct(&shards[..2], data.len()),
            Err(ErasureError::ShardCount { .. })
        ));
        shards[1] = Some(vec![0u8; 3]);
        assert!(matches!(
            codec.reconstruct(&shards, data.len()),
            Err(ErasureError::ShardLength { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let shards: Vec<Option<Vec<u8>>> =
            codec.encode(&[]).unwrap().into_iter().map(Some).collect();
        assert!(shards.iter().all(|s| s.as_ref().unwrap().is_empty()));
        assert!(codec.reconstruct(&shards, 0).unwrap().is_empty());
    }
}
