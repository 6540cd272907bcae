use prime_factorization::Factorization;

use crate::word::Word;

/// Validated NTT-friendly prime modulus with the precomputation needed to
/// derive roots of unity of any order dividing `q - 1`.
pub struct Prime<W: Word> {
    q: W,
    generator: W,
}

impl<W: Word> Prime<W> {
    pub fn new(q: W) -> Self {
        let qv = q.to_u64();
        assert!(qv > 2 && qv & 1 == 1, "prime modulus must be odd, got {}", qv);
        assert!(
            64 - qv.leading_zeros() <= W::MAX_PRIME_BITS,
            "prime {} exceeds the {}-bit bound",
            qv,
            W::MAX_PRIME_BITS
        );
        assert!(
            Factorization::run(qv).is_prime,
            "modulus {} is not prime",
            qv
        );

        let mut factors = Factorization::run(qv - 1).factors;
        factors.sort_unstable();
        factors.dedup();

        // Smallest generator of the full multiplicative group.
        let mut g = W::from_u64(2);
        loop {
            let ok = factors
                .iter()
                .all(|&f| g.pow_mod((qv - 1) / f, q).to_u64() != 1);
            if ok {
                break;
            }
            g = W::from_u64(g.to_u64() + 1);
        }

        Self { q, generator: g }
    }

    pub fn q(&self) -> W {
        self.q
    }

    /// Primitive root of unity of the given order.
    pub fn root_of_unity(&self, order: u64) -> W {
        let qv = self.q.to_u64();
        assert!(
            (qv - 1) % order == 0,
            "no root of order {} modulo {}",
            order,
            qv
        );
        self.generator.pow_mod((qv - 1) / order, self.q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_orders() {
        let p = Prime::<u64>::new(1099511799809);
        for log_order in [1u32, 4, 11, 13] {
            let order = 1u64 << log_order;
            let w = p.root_of_unity(order);
            assert_eq!(w.pow_mod(order, p.q()), 1);
            assert_ne!(w.pow_mod(order / 2, p.q()), 1);
        }
    }

    #[test]
    #[should_panic(expected = "not prime")]
    fn composite_rejected() {
        Prime::<u64>::new(1099511799807);
    }

    #[test]
    fn small_word_prime() {
        let p = Prime::<u32>::new(536903681);
        let w = p.root_of_unity(1 << 13);
        assert_eq!(w.pow_mod(1 << 13, p.q()), 1);
    }
}
