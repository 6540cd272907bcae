//! Bulk residue-wise kernels. Every polynomial argument is a flat slice
//! of `primes.len() * degree` words laid out prime-major, all in the
//! evaluation domain, so each kernel is a single pass of independent
//! modular lanes.

use itertools::izip;
use rns::ntt::bit_reverse;
use rns::Word;

#[inline]
fn chunks<'a, W>(a: &'a [W], n: usize) -> impl Iterator<Item = &'a [W]> {
    a.chunks_exact(n)
}

#[inline]
fn chunks_mut<'a, W>(a: &'a mut [W], n: usize) -> impl Iterator<Item = &'a mut [W]> {
    a.chunks_exact_mut(n)
}

pub fn add<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], b: &[W]) {
    for (&q, d, x, y) in izip!(primes, chunks_mut(dst, n), chunks(a, n), chunks(b, n)) {
        for (d, &x, &y) in izip!(d, x, y) {
            *d = x.add_mod(y, q);
        }
    }
}

pub fn sub<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], b: &[W]) {
    for (&q, d, x, y) in izip!(primes, chunks_mut(dst, n), chunks(a, n), chunks(b, n)) {
        for (d, &x, &y) in izip!(d, x, y) {
            *d = x.sub_mod(y, q);
        }
    }
}

pub fn neg<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W]) {
    for (&q, d, x) in izip!(primes, chunks_mut(dst, n), chunks(a, n)) {
        for (d, &x) in izip!(d, x) {
            *d = x.neg_mod(q);
        }
    }
}

pub fn mult<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], b: &[W]) {
    for (&q, d, x, y) in izip!(primes, chunks_mut(dst, n), chunks(a, n), chunks(b, n)) {
        for (d, &x, &y) in izip!(d, x, y) {
            *d = x.mul_mod(y, q);
        }
    }
}

/// `dst += a * b`
pub fn mult_accum<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], b: &[W]) {
    for (&q, d, x, y) in izip!(primes, chunks_mut(dst, n), chunks(a, n), chunks(b, n)) {
        for (d, &x, &y) in izip!(d, x, y) {
            *d = d.add_mod(x.mul_mod(y, q), q);
        }
    }
}

/// `dst += b`
pub fn add_assign<W: Word>(primes: &[W], n: usize, dst: &mut [W], b: &[W]) {
    for (&q, d, y) in izip!(primes, chunks_mut(dst, n), chunks(b, n)) {
        for (d, &y) in izip!(d, y) {
            *d = d.add_mod(y, q);
        }
    }
}

/// `dst *= c`, one scalar residue per prime.
pub fn mult_scalar_assign<W: Word>(primes: &[W], n: usize, dst: &mut [W], c: &[W]) {
    for (&q, &cv, d) in izip!(primes, c, chunks_mut(dst, n)) {
        let cs = cv.shoup_precompute(q);
        for d in d {
            *d = d.mul_shoup(cv, cs, q);
        }
    }
}

/// One scalar residue per prime, added to every slot.
pub fn add_scalar<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], c: &[W]) {
    for (&q, &cv, d, x) in izip!(primes, c, chunks_mut(dst, n), chunks(a, n)) {
        for (d, &x) in izip!(d, x) {
            *d = x.add_mod(cv, q);
        }
    }
}

pub fn sub_scalar<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], c: &[W]) {
    for (&q, &cv, d, x) in izip!(primes, c, chunks_mut(dst, n), chunks(a, n)) {
        for (d, &x) in izip!(d, x) {
            *d = x.sub_mod(cv, q);
        }
    }
}

/// `dst = c - a`
pub fn sub_opposite_scalar<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], c: &[W]) {
    for (&q, &cv, d, x) in izip!(primes, c, chunks_mut(dst, n), chunks(a, n)) {
        for (d, &x) in izip!(d, x) {
            *d = cv.sub_mod(x, q);
        }
    }
}

pub fn mult_scalar<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], c: &[W]) {
    for (&q, &cv, d, x) in izip!(primes, c, chunks_mut(dst, n), chunks(a, n)) {
        let cs = cv.shoup_precompute(q);
        for (d, &x) in izip!(d, x) {
            *d = x.mul_shoup(cv, cs, q);
        }
    }
}

/// `dst += a * c`
pub fn mult_scalar_accum<W: Word>(primes: &[W], n: usize, dst: &mut [W], a: &[W], c: &[W]) {
    for (&q, &cv, d, x) in izip!(primes, c, chunks_mut(dst, n), chunks(a, n)) {
        let cs = cv.shoup_precompute(q);
        for (d, &x) in izip!(d, x) {
            *d = d.add_mod(x.mul_shoup(cv, cs, q), q);
        }
    }
}

/// Degree-two product of `(ab, aa)` and `(bb, ba)` into three polynomials.
pub fn tensor<W: Word>(
    primes: &[W],
    n: usize,
    rb: &mut [W],
    ra: &mut [W],
    rr: &mut [W],
    ab: &[W],
    aa: &[W],
    bb: &[W],
    ba: &[W],
) {
    for (&q, rb, ra, rr, ab, aa, bb, ba) in izip!(
        primes,
        chunks_mut(rb, n),
        chunks_mut(ra, n),
        chunks_mut(rr, n),
        chunks(ab, n),
        chunks(aa, n),
        chunks(bb, n),
        chunks(ba, n)
    ) {
        for (rb, ra, rr, &ab, &aa, &bb, &ba) in izip!(rb, ra, rr, ab, aa, bb, ba) {
            *rb = ab.mul_mod(bb, q);
            *ra = ab.mul_mod(ba, q).add_mod(aa.mul_mod(bb, q), q);
            *rr = aa.mul_mod(ba, q);
        }
    }
}

/// Slot permutation realizing the automorphism `X -> X^factor` on
/// evaluation-domain data. Slot `i` of the output takes its value from
/// slot `pi(i)` of the input, identically for every prime.
pub fn make_permutation(log_degree: u32, galois_factor: usize) -> Vec<u32> {
    let n = 1usize << log_degree;
    let two_n = 2 * n;
    debug_assert!(galois_factor % 2 == 1);
    (0..n)
        .map(|i| {
            let e = 2 * bit_reverse(i, log_degree) + 1;
            let src_e = galois_factor * e % two_n;
            bit_reverse((src_e - 1) / 2, log_degree) as u32
        })
        .collect()
}

pub fn permute<W: Word>(num_primes: usize, n: usize, dst: &mut [W], src: &[W], perm: &[u32]) {
    debug_assert_eq!(perm.len(), n);
    for k in 0..num_primes {
        let d = &mut dst[k * n..(k + 1) * n];
        let s = &src[k * n..(k + 1) * n];
        for (d, &p) in d.iter_mut().zip(perm.iter()) {
            *d = s[p as usize];
        }
    }
}

/// `dst += permute(src)`
pub fn permute_accum<W: Word>(
    primes: &[W],
    n: usize,
    dst: &mut [W],
    src: &[W],
    perm: &[u32],
) {
    debug_assert_eq!(perm.len(), n);
    for (k, &q) in primes.iter().enumerate() {
        let d = &mut dst[k * n..(k + 1) * n];
        let s = &src[k * n..(k + 1) * n];
        for (d, &p) in d.iter_mut().zip(perm.iter()) {
            *d = d.add_mod(s[p as usize], q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_of_identity_factor_is_identity() {
        let perm = make_permutation(3, 1);
        assert_eq!(perm, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn permutation_is_bijective() {
        for factor in [5usize, 25, 15] {
            let perm = make_permutation(4, factor);
            let mut seen = vec![false; 16];
            for &p in &perm {
                assert!(!seen[p as usize]);
                seen[p as usize] = true;
            }
        }
    }

    #[test]
    fn tensor_matches_schoolbook() {
        let primes = [97u64];
        let ab = [3u64, 5];
        let aa = [7u64, 11];
        let bb = [13u64, 17];
        let ba = [19u64, 23];
        let mut rb = [0u64; 2];
        let mut ra = [0u64; 2];
        let mut rr = [0u64; 2];
        tensor(&primes, 2, &mut rb, &mut ra, &mut rr, &ab, &aa, &bb, &ba);
        assert_eq!(rb, [39, 85]);
        assert_eq!(ra, [(3 * 19 + 7 * 13) % 97, (5 * 23 + 11 * 17) % 97]);
        assert_eq!(rr, [36, (11 * 23) % 97]);
    }
}
