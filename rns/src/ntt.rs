use crate::prime::Prime;
use crate::word::Word;

/// Negacyclic number-theoretic transform over one prime.
///
/// Twiddles are stored in bit-reversed order so both passes walk them
/// sequentially. The forward pass leaves slot `i` holding the evaluation
/// of the input at `psi^(2*br(i) + 1)`, where `psi` is the primitive
/// `2n`-th root baked into the table; the permutation helpers in the
/// scheme crates rely on exactly this layout.
pub struct NttTable<W: Word> {
    q: W,
    log_n: u32,
    n: usize,
    roots: Vec<W>,
    roots_shoup: Vec<W>,
    inv_roots: Vec<W>,
    inv_roots_shoup: Vec<W>,
    n_inv: W,
    n_inv_shoup: W,
}

#[inline(always)]
pub fn bit_reverse(i: usize, bits: u32) -> usize {
    i.reverse_bits() >> (usize::BITS - bits)
}

impl<W: Word> NttTable<W> {
    pub fn new(prime: &Prime<W>, log_n: u32) -> Self {
        let n = 1usize << log_n;
        let q = prime.q();
        let psi = prime.root_of_unity(2 * n as u64);
        let psi_inv = psi.inv_mod(q);

        let mut roots = vec![W::default(); n];
        let mut inv_roots = vec![W::default(); n];
        let mut pow = W::from_u64(1);
        let mut pow_inv = W::from_u64(1);
        for i in 0..n {
            let r = bit_reverse(i, log_n);
            roots[r] = pow;
            inv_roots[r] = pow_inv;
            pow = pow.mul_mod(psi, q);
            pow_inv = pow_inv.mul_mod(psi_inv, q);
        }
        let roots_shoup = roots.iter().map(|w| w.shoup_precompute(q)).collect();
        let inv_roots_shoup = inv_roots.iter().map(|w| w.shoup_precompute(q)).collect();

        let n_inv = W::from_u64(n as u64).inv_mod(q);
        Self {
            q,
            log_n,
            n,
            roots,
            roots_shoup,
            inv_roots,
            inv_roots_shoup,
            n_inv,
            n_inv_shoup: n_inv.shoup_precompute(q),
        }
    }

    pub fn q(&self) -> W {
        self.q
    }

    pub fn degree(&self) -> usize {
        self.n
    }

    pub fn log_degree(&self) -> u32 {
        self.log_n
    }

    /// Cooley-Tukey pass, coefficients to evaluations.
    pub fn forward_inplace(&self, a: &mut [W]) {
        debug_assert_eq!(a.len(), self.n);
        let q = self.q;
        let mut t = self.n;
        let mut m = 1;
        while m < self.n {
            t >>= 1;
            for i in 0..m {
                let w = self.roots[m + i];
                let ws = self.roots_shoup[m + i];
                let j1 = 2 * i * t;
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t].mul_shoup(w, ws, q);
                    a[j] = u.add_mod(v, q);
                    a[j + t] = u.sub_mod(v, q);
                }
            }
            m <<= 1;
        }
    }

    /// Gentleman-Sande pass, evaluations to coefficients.
    pub fn inverse_inplace(&self, a: &mut [W]) {
        debug_assert_eq!(a.len(), self.n);
        let q = self.q;
        let mut t = 1;
        let mut m = self.n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let w = self.inv_roots[h + i];
                let ws = self.inv_roots_shoup[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = u.add_mod(v, q);
                    a[j + t] = u.sub_mod(v, q).mul_shoup(w, ws, q);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }
        for x in a.iter_mut() {
            *x = x.mul_shoup(self.n_inv, self.n_inv_shoup, q);
        }
    }

    pub fn forward(&self, dst: &mut [W], src: &[W]) {
        dst.copy_from_slice(src);
        self.forward_inplace(dst);
    }

    pub fn inverse(&self, dst: &mut [W], src: &[W]) {
        dst.copy_from_slice(src);
        self.inverse_inplace(dst);
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use num_traits::{ToPrimitive, Zero};
    use rand_core::RngCore;
    use sampling::Source;

    use super::*;

    fn naive_negacyclic(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let qi = BigInt::from(q);
        let mut c = vec![BigInt::zero(); n];
        for i in 0..n {
            for j in 0..n {
                let prod = BigInt::from(a[i]) * BigInt::from(b[j]);
                if i + j < n {
                    c[i + j] += prod;
                } else {
                    c[i + j - n] -= prod;
                }
            }
        }
        c.into_iter()
            .map(|x| {
                let r = ((x % &qi) + &qi) % &qi;
                r.to_u64().unwrap()
            })
            .collect()
    }

    #[test]
    fn roundtrip() {
        let prime = Prime::<u64>::new(1099511799809);
        let table = NttTable::new(&prime, 6);
        let mut source = Source::new([5u8; 32]);
        let a: Vec<u64> = (0..64).map(|_| source.next_u64() % prime.q()).collect();
        let mut b = a.clone();
        table.forward_inplace(&mut b);
        table.inverse_inplace(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn negacyclic_convolution() {
        let prime = Prime::<u64>::new(97);
        let table = NttTable::new(&prime, 3);
        let a = vec![3u64, 1, 4, 1, 5, 9, 2, 6];
        let b = vec![2u64, 7, 1, 8, 2, 8, 1, 8];
        let expected = naive_negacyclic(&a, &b, 97);

        let mut fa = a.clone();
        let mut fb = b.clone();
        table.forward_inplace(&mut fa);
        table.forward_inplace(&mut fb);
        let mut fc: Vec<u64> = fa
            .iter()
            .zip(fb.iter())
            .map(|(x, y)| x.mul_mod(*y, 97))
            .collect();
        table.inverse_inplace(&mut fc);
        assert_eq!(fc, expected);
    }

    #[test]
    fn evaluation_order() {
        // Slot i of the forward output holds A(psi^(2*br(i)+1)).
        let prime = Prime::<u64>::new(17);
        let table = NttTable::new(&prime, 2);
        let psi = prime.root_of_unity(8);
        let a = vec![7u64, 3, 11, 5];
        let mut f = a.clone();
        table.forward_inplace(&mut f);
        for i in 0..4 {
            let e = 2 * bit_reverse(i, 2) as u64 + 1;
            let x = psi.pow_mod(e, 17);
            let mut val = 0u64;
            let mut xp = 1u64;
            for &c in &a {
                val = val.add_mod(c.mul_mod(xp, 17), 17);
                xp = xp.mul_mod(x, 17);
            }
            assert_eq!(f[i], val);
        }
    }

    #[test]
    fn roundtrip_u32() {
        let prime = Prime::<u32>::new(536903681);
        let table = NttTable::new(&prime, 5);
        let mut source = Source::new([9u8; 32]);
        let a: Vec<u32> = (0..32)
            .map(|_| (source.next_u64() % prime.q() as u64) as u32)
            .collect();
        let mut b = a.clone();
        table.forward_inplace(&mut b);
        table.inverse_inplace(&mut b);
        assert_eq!(a, b);
    }
}
