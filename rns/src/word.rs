use std::fmt::Debug;
use std::hash::Hash;

/// Machine word carrying one RNS residue. The engine is generic over the
/// word width so 32-bit parameter sets (two terminal primes standing in
/// for one wide scale prime) and 64-bit sets share one code path.
pub trait Word:
    Copy + Clone + Eq + Ord + Hash + Debug + Default + Send + Sync + 'static
{
    const BITS: u32;
    /// Largest usable prime width; one bit is reserved so lazy sums and
    /// the Shoup reduction stay in range.
    const MAX_PRIME_BITS: u32;

    fn from_u64(v: u64) -> Self;
    fn to_u64(self) -> u64;

    /// Reduces a signed value into `[0, q)`.
    fn from_i64_mod(v: i64, q: Self) -> Self;

    /// Rounds and reduces a real value into `[0, q)`. Exact for
    /// magnitudes below 2^126.
    fn from_f64_mod(v: f64, q: Self) -> Self;

    /// Centered lift into `[-q/2, q/2)`.
    fn centered(self, q: Self) -> i64;

    fn add_mod(self, b: Self, q: Self) -> Self;
    fn sub_mod(self, b: Self, q: Self) -> Self;
    fn neg_mod(self, q: Self) -> Self;
    fn mul_mod(self, b: Self, q: Self) -> Self;
    fn pow_mod(self, e: u64, q: Self) -> Self;

    /// Inverse modulo a prime `q`.
    fn inv_mod(self, q: Self) -> Self;

    /// Precomputed quotient `floor(self << BITS / q)` for `mul_shoup`.
    fn shoup_precompute(self, q: Self) -> Self;

    /// Modular product against a premultiplied constant, one correction.
    fn mul_shoup(self, w: Self, w_shoup: Self, q: Self) -> Self;
}

impl Word for u64 {
    const BITS: u32 = 64;
    const MAX_PRIME_BITS: u32 = 63;

    #[inline(always)]
    fn from_u64(v: u64) -> Self {
        v
    }

    #[inline(always)]
    fn to_u64(self) -> u64 {
        self
    }

    #[inline(always)]
    fn from_i64_mod(v: i64, q: Self) -> Self {
        v.rem_euclid(q as i64) as u64
    }

    #[inline(always)]
    fn from_f64_mod(v: f64, q: Self) -> Self {
        let x = v.round() as i128;
        x.rem_euclid(q as i128) as u64
    }

    #[inline(always)]
    fn centered(self, q: Self) -> i64 {
        if self > q / 2 {
            self as i64 - q as i64
        } else {
            self as i64
        }
    }

    #[inline(always)]
    fn add_mod(self, b: Self, q: Self) -> Self {
        let s = self + b;
        if s >= q { s - q } else { s }
    }

    #[inline(always)]
    fn sub_mod(self, b: Self, q: Self) -> Self {
        if self >= b { self - b } else { self + q - b }
    }

    #[inline(always)]
    fn neg_mod(self, q: Self) -> Self {
        if self == 0 { 0 } else { q - self }
    }

    #[inline(always)]
    fn mul_mod(self, b: Self, q: Self) -> Self {
        ((self as u128 * b as u128) % q as u128) as u64
    }

    fn pow_mod(self, mut e: u64, q: Self) -> Self {
        let mut base = self % q;
        let mut acc: u64 = 1;
        while e > 0 {
            if e & 1 == 1 {
                acc = acc.mul_mod(base, q);
            }
            base = base.mul_mod(base, q);
            e >>= 1;
        }
        acc
    }

    #[inline(always)]
    fn inv_mod(self, q: Self) -> Self {
        debug_assert!(self % q != 0);
        self.pow_mod(q - 2, q)
    }

    #[inline(always)]
    fn shoup_precompute(self, q: Self) -> Self {
        (((self as u128) << 64) / q as u128) as u64
    }

    #[inline(always)]
    fn mul_shoup(self, w: Self, w_shoup: Self, q: Self) -> Self {
        let hi = ((self as u128 * w_shoup as u128) >> 64) as u64;
        let r = self.wrapping_mul(w).wrapping_sub(hi.wrapping_mul(q));
        if r >= q { r - q } else { r }
    }
}

impl Word for u32 {
    const BITS: u32 = 32;
    const MAX_PRIME_BITS: u32 = 31;

    #[inline(always)]
    fn from_u64(v: u64) -> Self {
        v as u32
    }

    #[inline(always)]
    fn to_u64(self) -> u64 {
        self as u64
    }

    #[inline(always)]
    fn from_i64_mod(v: i64, q: Self) -> Self {
        v.rem_euclid(q as i64) as u32
    }

    #[inline(always)]
    fn from_f64_mod(v: f64, q: Self) -> Self {
        let x = v.round() as i128;
        x.rem_euclid(q as i128) as u32
    }

    #[inline(always)]
    fn centered(self, q: Self) -> i64 {
        if self > q / 2 {
            self as i64 - q as i64
        } else {
            self as i64
        }
    }

    #[inline(always)]
    fn add_mod(self, b: Self, q: Self) -> Self {
        let s = self + b;
        if s >= q { s - q } else { s }
    }

    #[inline(always)]
    fn sub_mod(self, b: Self, q: Self) -> Self {
        if self >= b { self - b } else { self + q - b }
    }

    #[inline(always)]
    fn neg_mod(self, q: Self) -> Self {
        if self == 0 { 0 } else { q - self }
    }

    #[inline(always)]
    fn mul_mod(self, b: Self, q: Self) -> Self {
        ((self as u64 * b as u64) % q as u64) as u32
    }

    fn pow_mod(self, mut e: u64, q: Self) -> Self {
        let mut base = self % q;
        let mut acc: u32 = 1;
        while e > 0 {
            if e & 1 == 1 {
                acc = acc.mul_mod(base, q);
            }
            base = base.mul_mod(base, q);
            e >>= 1;
        }
        acc
    }

    #[inline(always)]
    fn inv_mod(self, q: Self) -> Self {
        debug_assert!(self % q != 0);
        self.pow_mod(q as u64 - 2, q)
    }

    #[inline(always)]
    fn shoup_precompute(self, q: Self) -> Self {
        (((self as u64) << 32) / q as u64) as u32
    }

    #[inline(always)]
    fn mul_shoup(self, w: Self, w_shoup: Self, q: Self) -> Self {
        let hi = ((self as u64 * w_shoup as u64) >> 32) as u32;
        let r = self.wrapping_mul(w).wrapping_sub(hi.wrapping_mul(q));
        if r >= q { r - q } else { r }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modular_ops_u64() {
        let q: u64 = 1099511799809;
        assert_eq!(5u64.add_mod(q - 2, q), 3);
        assert_eq!(2u64.sub_mod(5, q), q - 3);
        assert_eq!(3u64.neg_mod(q), q - 3);
        let x = 123456789123u64;
        assert_eq!(x.mul_mod(x.inv_mod(q), q), 1);
        assert_eq!(7u64.pow_mod(0, q), 1);
        assert_eq!(Word::from_i64_mod(-1, q), q - 1);
        assert_eq!((q - 1).centered(q), -1);
        assert_eq!(<u64 as Word>::from_f64_mod(-2.4, q), q - 2);
    }

    #[test]
    fn shoup_matches_plain_mul() {
        let q: u64 = 1099511799809;
        let w: u64 = 987654321987 % q;
        let ws = w.shoup_precompute(q);
        for x in [0u64, 1, q - 1, q / 2, 424242424242 % q] {
            assert_eq!(x.mul_shoup(w, ws, q), x.mul_mod(w, q));
        }
    }

    #[test]
    fn modular_ops_u32() {
        let q: u32 = 536903681;
        let x = 123456789u32 % q;
        assert_eq!(x.mul_mod(x.inv_mod(q), q), 1);
        let w = 87654321u32 % q;
        let ws = w.shoup_precompute(q);
        assert_eq!(x.mul_shoup(w, ws, q), x.mul_mod(w, q));
    }
}
