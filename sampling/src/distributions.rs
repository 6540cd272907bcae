use rand_core::RngCore;
use rand_distr::{Distribution, Normal};

use crate::source::Source;

/// Rounded gaussian draws with the tail clamped to `max_deviation` sigmas.
pub fn normal_rounded(source: &mut Source, n: usize, sigma: f64, max_deviation: f64) -> Vec<i64> {
    assert!(sigma > 0.0, "normal_rounded: sigma must be positive");
    let bound = sigma * max_deviation;
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..n)
        .map(|_| normal.sample(source).clamp(-bound, bound).round() as i64)
        .collect()
}

/// Ternary coefficient vector with exactly `hamming_weight` nonzero
/// entries, signs uniform. Draws positions without replacement and panics
/// when the space cannot accommodate the weight.
pub fn ternary(source: &mut Source, n: usize, hamming_weight: usize) -> Vec<i64> {
    assert!(
        hamming_weight <= n,
        "ternary: hamming weight {} exceeds {} coefficients",
        hamming_weight,
        n
    );
    let mut coeffs = vec![0i64; n];
    let mut placed = 0;
    while placed < hamming_weight {
        let pos = source.next_u64_below(n as u64) as usize;
        if coeffs[pos] != 0 {
            continue;
        }
        coeffs[pos] = if source.next_u64() & 1 == 0 { 1 } else { -1 };
        placed += 1;
    }
    coeffs
}

/// Uniform draws in `[0, max)`, one per slot.
pub fn uniform(source: &mut Source, n: usize, max: u64) -> Vec<u64> {
    (0..n).map(|_| source.next_u64_below(max)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ternary_weight_and_support() {
        let mut source = Source::new([1u8; 32]);
        let s = ternary(&mut source, 64, 24);
        assert_eq!(s.iter().filter(|&&x| x != 0).count(), 24);
        assert!(s.iter().all(|&x| x == -1 || x == 0 || x == 1));
    }

    #[test]
    #[should_panic(expected = "hamming weight")]
    fn ternary_rejects_overfull_draw() {
        let mut source = Source::new([2u8; 32]);
        ternary(&mut source, 8, 9);
    }

    #[test]
    fn normal_is_clamped() {
        let mut source = Source::new([3u8; 32]);
        let e = normal_rounded(&mut source, 4096, 3.2, 6.0);
        assert!(e.iter().all(|&x| x.unsigned_abs() <= (3.2f64 * 6.0) as u64 + 1));
    }
}
