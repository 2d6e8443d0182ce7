//! Arithmetic over the Galois field GF(2^8)
//!
//! Field elements are bytes. Addition and subtraction are both XOR; this
//! module provides the non-trivial operations (multiply, divide and
//! exponentiate) through a pair of lookup tables built from the generator
//! polynomial
//!
//! ```text
//! p(x) = x^8 + x^4 + x^3 + x^2 + 1    (0x11D)
//! ```
//!
//! Theory follows BBC R&D White Paper WHP 031, "Reed-Solomon error
//! correction" (C.K.P. Clarke).
//!
//! # Tables
//!
//! - `exp` has 510 entries. `exp[0] = 1` and every following entry is the
//!   previous one multiplied by `x` (a left shift, reduced by the generator
//!   when it overflows 8 bits). Entries `255..510` repeat `0..255`, so a sum
//!   of two logarithms can be looked up without a `mod 255`.
//! - `log` is the inverse of `exp[0..255]`. `log[0]` has no meaning and is
//!   never read.
//!
//! Both tables are built once per process on first use and never written
//! again, so concurrent readers need no synchronization.

use std::sync::LazyLock;

/// Number of elements in the field
pub const FIELD_SIZE: usize = 256;
/// Mask selecting a field element out of a wider integer
pub const FIELD_MASK: usize = FIELD_SIZE - 1;
/// Order of the multiplicative group
pub const GROUP_ORDER: usize = FIELD_SIZE - 1;
/// Length of the exponent table (two copies of the group, minus one slot)
pub const EXP_TABLE_SIZE: usize = 2 * GROUP_ORDER;

// low byte of the generator polynomial: x^8 = x^4 + x^3 + x^2 + 1
const GENERATOR_LOW: u8 = 0x1D;

/// Errors raised by field operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("division by the zero field element")]
    DivideByZero,
    #[error("logarithm of the zero field element is undefined")]
    LogOfZero,
    #[error("exponent {0} out of range, expected 0..{EXP_TABLE_SIZE}")]
    ExponentOutOfRange(usize),
}

struct Tables {
    exp: [u8; EXP_TABLE_SIZE],
    log: [u8; FIELD_SIZE],
}

static TABLES: LazyLock<Tables> = LazyLock::new(|| {
    let mut exp = [0u8; EXP_TABLE_SIZE];
    let mut log = [0u8; FIELD_SIZE];

    let mut x: u8 = 1;
    for (i, slot) in exp.iter_mut().take(GROUP_ORDER).enumerate() {
        *slot = x;
        log[x as usize] = i as u8;
        let overflow = x & 0x80 != 0;
        x <<= 1;
        if overflow {
            x ^= GENERATOR_LOW;
        }
    }
    for i in GROUP_ORDER..EXP_TABLE_SIZE {
        exp[i] = exp[i - GROUP_ORDER];
    }

    tracing::trace!("built GF(2^8) tables");
    Tables { exp, log }
});

/// The field GF(2^8) under the generator `x^8 + x^4 + x^3 + x^2 + 1`
///
/// A zero-sized handle; all state lives in the shared tables.
///
/// ```ignore
/// let product = GaloisField256::mul(3, 7);
/// assert_eq!(GaloisField256::div(product, 7)?, 3);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GaloisField256;

impl GaloisField256 {
    /// Number of field elements (256)
    pub const fn size() -> usize {
        FIELD_SIZE
    }

    /// Mask for indexing field elements as bytes (255)
    pub const fn mask() -> usize {
        FIELD_MASK
    }

    /// `alpha^e` for `e` in `0..510`
    pub fn exp(e: usize) -> Result<u8, FieldError> {
        TABLES
            .exp
            .get(e)
            .copied()
            .ok_or(FieldError::ExponentOutOfRange(e))
    }

    /// Discrete logarithm of a nonzero element, in `0..255`
    pub fn log(x: u8) -> Result<usize, FieldError> {
        if x == 0 {
            return Err(FieldError::LogOfZero);
        }
        Ok(TABLES.log[x as usize] as usize)
    }

    /// Field addition (and subtraction)
    #[inline]
    pub const fn add(x: u8, y: u8) -> u8 {
        x ^ y
    }

    /// Field multiplication
    pub fn mul(x: u8, y: u8) -> u8 {
        if x == 0 || y == 0 {
            return 0;
        }
        let tables = &*TABLES;
        tables.exp[tables.log[x as usize] as usize + tables.log[y as usize] as usize]
    }

    /// Field division
    ///
    /// # Errors
    ///
    /// Fails with [`FieldError::DivideByZero`] when `y == 0`, for every `x`.
    pub fn div(x: u8, y: u8) -> Result<u8, FieldError> {
        if y == 0 {
            return Err(FieldError::DivideByZero);
        }
        if x == 0 {
            return Ok(0);
        }
        let tables = &*TABLES;
        Ok(tables.exp
            [tables.log[x as usize] as usize + GROUP_ORDER - tables.log[y as usize] as usize])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exp_table_shape() {
        assert_eq!(GaloisField256::exp(0).unwrap(), 1);
        assert_eq!(GaloisField256::exp(1).unwrap(), 2);
        assert_eq!(GaloisField256::exp(7).unwrap(), 0x80);
        // first reduction: x^8 = x^4 + x^3 + x^2 + 1
        assert_eq!(GaloisField256::exp(8).unwrap(), 0x1D);
        for e in 0..GROUP_ORDER {
            assert_eq!(
                GaloisField256::exp(e).unwrap(),
                GaloisField256::exp(e + GROUP_ORDER).unwrap()
            );
        }
        assert_eq!(
            GaloisField256::exp(EXP_TABLE_SIZE),
            Err(FieldError::ExponentOutOfRange(EXP_TABLE_SIZE))
        );
    }

    #[test]
    fn test_exp_covers_every_nonzero_element() {
        let mut seen = [false; FIELD_SIZE];
        for e in 0..GROUP_ORDER {
            let x = GaloisField256::exp(e).unwrap();
            assert_ne!(x, 0);
            assert!(!seen[x as usize], "element {} repeated", x);
            seen[x as usize] = true;
        }
        assert!(!seen[0]);
    }

    #[test]
    fn test_log_exp_round_trip() {
        for x in 1..=255u8 {
            let e = GaloisField256::log(x).unwrap();
            assert_eq!(GaloisField256::exp(e).unwrap(), x);
        }
        for e in 0..EXP_TABLE_SIZE {
            let x = GaloisField256::exp(e).unwrap();
            assert_eq!(GaloisField256::log(x).unwrap(), e % GROUP_ORDER);
        }
        assert_eq!(GaloisField256::log(0), Err(FieldError::LogOfZero));
    }

    #[test]
    fn test_mul_by_zero() {
        for y in 0..=255u8 {
            assert_eq!(GaloisField256::mul(0, y), 0);
            assert_eq!(GaloisField256::mul(y, 0), 0);
        }
    }

    #[test]
    fn test_mul_identity_and_commutativity() {
        for x in 0..=255u8 {
            assert_eq!(GaloisField256::mul(x, 1), x);
            for y in 0..=255u8 {
                assert_eq!(GaloisField256::mul(x, y), GaloisField256::mul(y, x));
            }
        }
    }

    #[test]
    fn test_mul_matches_carryless_reduction() {
        fn slow_mul(mut a: u8, mut b: u8) -> u8 {
            let mut product = 0u8;
            while b != 0 {
                if b & 1 != 0 {
                    product ^= a;
                }
                let overflow = a & 0x80 != 0;
                a <<= 1;
                if overflow {
                    a ^= GENERATOR_LOW;
                }
                b >>= 1;
            }
            product
        }
        for x in 0..=255u8 {
            for y in 0..=255u8 {
                assert_eq!(GaloisField256::mul(x, y), slow_mul(x, y));
            }
        }
    }

    #[test]
    fn test_div_by_zero_fails() {
        for x in 0..=255u8 {
            assert_eq!(GaloisField256::div(x, 0), Err(FieldError::DivideByZero));
        }
    }

    #[test]
    fn test_div_zero_numerator() {
        for y in 1..=255u8 {
            assert_eq!(GaloisField256::div(0, y).unwrap(), 0);
        }
    }

    #[test]
    fn test_div_inverts_mul() {
        for x in 1..=255u8 {
            assert_eq!(GaloisField256::div(x, x).unwrap(), 1);
            for y in 0..=255u8 {
                let q = GaloisField256::div(y, x).unwrap();
                assert_eq!(GaloisField256::mul(x, q), y);
            }
        }
    }

    #[test]
    fn test_mul_three_by_seven() {
        let product = GaloisField256::mul(3, 7);
        // (x + 1)(x^2 + x + 1) = x^3 + 1
        assert_eq!(product, 9);
        assert_eq!(GaloisField256::div(product, 7).unwrap(), 3);
    }

    #[test]
    fn test_size_and_mask() {
        assert_eq!(GaloisField256::size(), 256);
        assert_eq!(GaloisField256::mask(), 255);
    }
}
