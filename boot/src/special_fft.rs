//! Matrix form of the canonical-embedding FFT stages. The encoding
//! switches apply these stages to the slots; grouping consecutive stages
//! into one striped matrix trades rotations for levels.
//!
//! The stage products deliberately omit the bit-reversal permutation:
//! the coefficient-to-slot direction leaves the coefficients in
//! bit-reversed slot order and the slot-to-coefficient direction undoes
//! it, so the two encoding switches of one bootstrap cancel the
//! reordering between them.

use ckks::encode::Encoder;
use ckks::Complex64;

use crate::striped_matrix::StripedMatrix;

/// Butterfly stage of width `len` as a striped matrix over `n` slots.
fn forward_stage(enc: &Encoder, n: usize, len: usize) -> StripedMatrix {
    let lenh = len / 2;
    let mut m = StripedMatrix::new(n);
    for i in 0..n {
        let jm = i % len;
        if jm < lenh {
            let w = enc.stage_twiddle(len, jm);
            m.add_entry(0, i, Complex64::new(1.0, 0.0));
            m.add_entry(lenh, i, w);
        } else {
            let w = enc.stage_twiddle(len, jm - lenh);
            m.add_entry(0, i, -w);
            m.add_entry(n - lenh, i, Complex64::new(1.0, 0.0));
        }
    }
    m
}

fn inverse_stage(enc: &Encoder, n: usize, len: usize) -> StripedMatrix {
    let lenh = len / 2;
    let mut m = StripedMatrix::new(n);
    for i in 0..n {
        let jm = i % len;
        if jm < lenh {
            m.add_entry(0, i, Complex64::new(0.5, 0.0));
            m.add_entry(lenh, i, Complex64::new(0.5, 0.0));
        } else {
            let w = enc.stage_twiddle(len, jm - lenh).conj() * 0.5;
            m.add_entry(0, i, -w);
            m.add_entry(n - lenh, i, w);
        }
    }
    m
}

/// Splits `count` items into `phases` contiguous groups, larger groups
/// first.
fn group_sizes(count: usize, phases: usize) -> Vec<usize> {
    assert!(phases >= 1 && phases <= count);
    let base = count / phases;
    let extra = count % phases;
    (0..phases)
        .map(|i| base + usize::from(i < extra))
        .collect()
}

fn compose(stages: &[StripedMatrix]) -> StripedMatrix {
    let mut acc = stages[0].clone();
    for s in &stages[1..] {
        acc = s.mult(&acc);
    }
    acc
}

/// Phase matrices moving packed coefficients into the slots, the inverse
/// stages widest first. `factor` is folded into the first phase; the
/// caller passes the conjugate-split half (and the sparse-gap
/// compensation when fewer than `N/2` slots are used).
pub fn coeff_to_slot_matrices(
    enc: &Encoder,
    num_slots: usize,
    num_phases: usize,
    factor: f64,
) -> Vec<StripedMatrix> {
    let stages: Vec<StripedMatrix> = widths(num_slots)
        .rev()
        .map(|len| inverse_stage(enc, num_slots, len))
        .collect();
    phase_products(stages, num_phases, factor)
}

/// Phase matrices moving slot values back into packed coefficients, the
/// forward stages narrowest first.
pub fn slot_to_coeff_matrices(
    enc: &Encoder,
    num_slots: usize,
    num_phases: usize,
) -> Vec<StripedMatrix> {
    let stages: Vec<StripedMatrix> = widths(num_slots)
        .map(|len| forward_stage(enc, num_slots, len))
        .collect();
    phase_products(stages, num_phases, 1.0)
}

fn widths(num_slots: usize) -> impl DoubleEndedIterator<Item = usize> {
    assert!(num_slots.is_power_of_two() && num_slots >= 2);
    (1..=num_slots.trailing_zeros()).map(|k| 1usize << k)
}

fn phase_products(
    stages: Vec<StripedMatrix>,
    num_phases: usize,
    factor: f64,
) -> Vec<StripedMatrix> {
    let sizes = group_sizes(stages.len(), num_phases);
    let mut out = Vec::with_capacity(num_phases);
    let mut pos = 0;
    for (i, &size) in sizes.iter().enumerate() {
        let mut m = compose(&stages[pos..pos + size]);
        if i == 0 && factor != 1.0 {
            m.mult_scalar(Complex64::new(factor, 0.0));
        }
        out.push(m);
        pos += size;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sampling::Source;

    fn random_vec(source: &mut Source, n: usize) -> Vec<Complex64> {
        (0..n)
            .map(|_| Complex64::new(source.next_f64(-1.0, 1.0), source.next_f64(-1.0, 1.0)))
            .collect()
    }

    fn bit_reverse_vec(v: &[Complex64]) -> Vec<Complex64> {
        let bits = v.len().trailing_zeros();
        let mut out = v.to_vec();
        for i in 0..v.len() {
            out[rns::ntt::bit_reverse(i, bits)] = v[i];
        }
        out
    }

    #[test]
    fn stage_product_matches_encoder_fft() {
        // The slot-to-coefficient stages composed together equal the
        // encoder's butterfly pass, which runs after bit reversal.
        let degree = 64;
        let n = 16;
        let enc = Encoder::new(degree);
        let mut source = Source::new([23u8; 32]);
        let v = random_vec(&mut source, n);

        let phases = slot_to_coeff_matrices(&enc, n, 2);
        let mut got = bit_reverse_vec(&v);
        for p in &phases {
            got = p.apply(&got);
        }

        let mut want = v.clone();
        enc.special_fft(&mut want);
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).norm() < 1e-9);
        }
    }

    #[test]
    fn encoding_switch_round_trip_is_half() {
        let degree = 64;
        let n = 16;
        let enc = Encoder::new(degree);
        let mut source = Source::new([24u8; 32]);
        let v = random_vec(&mut source, n);

        let cts = coeff_to_slot_matrices(&enc, n, 2, 0.5);
        let stc = slot_to_coeff_matrices(&enc, n, 3);
        let mut x = v.clone();
        for p in cts.iter().chain(stc.iter()) {
            x = p.apply(&x);
        }
        for (g, w) in x.iter().zip(v.iter()) {
            assert!((g - w * 0.5).norm() < 1e-9, "got {} want {}", g, w * 0.5);
        }
    }
}
