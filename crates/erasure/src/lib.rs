/**
 * Arithmetic over GF(2^8).
 *  Table driven multiply / divide / exponentiate,
 *  shared process-wide and computed once.
 */
pub mod galois;
/**
 * Systematic Reed-Solomon erasure codec built on
 *  the field engine. Used by the chunk uploader and
 *  retriever to survive lost or corrupt shards.
 */
pub mod codec;

pub mod prelude {
    pub use crate::codec::{ErasureCodec, ErasureError};
    pub use crate::galois::{FieldError, GaloisField256};
}
