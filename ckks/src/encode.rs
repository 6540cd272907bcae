//! Canonical-embedding encoder. The special FFT pair evaluates at the
//! odd roots indexed by powers of the Galois generator, so slot
//! rotations become ring automorphisms.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use rns::Word;

pub use num::complex::Complex64;

use crate::container::{Constant, LeveledValue, Plaintext};
use crate::npinfo::NPInfo;
use crate::ntt_engine::NttEngine;
use crate::parameter::{Parameter, GALOIS_GENERATOR};

pub struct Encoder {
    degree: usize,
    // 5^j mod 2N for j in 0..N/2
    rot_group: Vec<usize>,
    // e^(2*pi*i*k/2N) for k in 0..=2N
    ksi: Vec<Complex64>,
}

impl Encoder {
    pub fn new(degree: usize) -> Self {
        let m = 2 * degree;
        let mut rot_group = Vec::with_capacity(degree / 2);
        let mut g = 1usize;
        for _ in 0..degree / 2 {
            rot_group.push(g);
            g = g * GALOIS_GENERATOR as usize % m;
        }
        let ksi = (0..=m)
            .map(|k| {
                let theta = 2.0 * std::f64::consts::PI * k as f64 / m as f64;
                Complex64::new(theta.cos(), theta.sin())
            })
            .collect();
        Self {
            degree,
            rot_group,
            ksi,
        }
    }

    /// Twiddle for butterfly row `j` in a block of width `len`: the same
    /// index formula backs the homomorphic stage matrices.
    pub fn stage_twiddle(&self, len: usize, j: usize) -> Complex64 {
        let m = 2 * self.degree;
        let idx = self.rot_group[j] % (4 * len) * (m / (4 * len));
        self.ksi[idx]
    }

    fn bit_reverse_permute(vals: &mut [Complex64]) {
        let n = vals.len();
        let bits = n.trailing_zeros();
        for i in 0..n {
            let r = rns::ntt::bit_reverse(i, bits);
            if i < r {
                vals.swap(i, r);
            }
        }
    }

    /// Slot values from packed polynomial coefficients.
    pub fn special_fft(&self, vals: &mut [Complex64]) {
        let n = vals.len();
        assert!(n.is_power_of_two() && n <= self.degree / 2);
        Self::bit_reverse_permute(vals);
        let mut len = 2;
        while len <= n {
            let lenh = len >> 1;
            for b0 in (0..n).step_by(len) {
                for j in 0..lenh {
                    let w = self.stage_twiddle(len, j);
                    let u = vals[b0 + j];
                    let v = vals[b0 + j + lenh] * w;
                    vals[b0 + j] = u + v;
                    vals[b0 + j + lenh] = u - v;
                }
            }
            len <<= 1;
        }
    }

    /// Exact inverse of `special_fft`; the 1/n normalization is folded
    /// into the per-stage halving.
    pub fn special_ifft(&self, vals: &mut [Complex64]) {
        let n = vals.len();
        assert!(n.is_power_of_two() && n <= self.degree / 2);
        let mut len = n;
        while len >= 2 {
            let lenh = len >> 1;
            for b0 in (0..n).step_by(len) {
                for j in 0..lenh {
                    let w = self.stage_twiddle(len, j);
                    let u = vals[b0 + j];
                    let v = vals[b0 + j + lenh];
                    vals[b0 + j] = (u + v) * 0.5;
                    vals[b0 + j + lenh] = (u - v) * 0.5 * w.conj();
                }
            }
            len >>= 1;
        }
        Self::bit_reverse_permute(vals);
    }

    pub fn encode<W: Word>(
        &self,
        param: &Parameter<W>,
        ntt: &NttEngine<W>,
        ptxt: &mut Plaintext<W>,
        level: i32,
        num_aux: usize,
        scale: f64,
        msg: &[Complex64],
    ) {
        let n = self.degree;
        let num_slots = msg.len();
        assert!(num_slots.is_power_of_two() && num_slots <= n / 2);
        let np = param.level_to_np(level, num_aux);
        let primes = param.prime_vector(np);
        ptxt.adjust(param, np);
        ptxt.set_scale(scale);
        ptxt.set_num_slots(num_slots);

        let mut vals = msg.to_vec();
        self.special_ifft(&mut vals);

        let gap = (n / 2) / num_slots;
        let mut coeffs = vec![0.0f64; n];
        for (i, v) in vals.iter().enumerate() {
            coeffs[i * gap] = v.re * scale;
            coeffs[i * gap + n / 2] = v.im * scale;
        }

        let mx = ptxt.mx.as_mut_slice();
        for (k, &q) in primes.iter().enumerate() {
            for j in 0..n {
                mx[k * n + j] = W::from_f64_mod(coeffs[j], q);
            }
        }
        ntt.forward_inplace(&primes, mx);
    }

    pub fn decode<W: Word>(
        &self,
        param: &Parameter<W>,
        ntt: &NttEngine<W>,
        msg: &mut Vec<Complex64>,
        ptxt: &Plaintext<W>,
    ) {
        let n = self.degree;
        let np = ptxt.np();
        let num_q = np.num_q();
        assert!(num_q > 0, "cannot decode from the auxiliary-only basis");
        let primes = param.prime_vector(NPInfo::new(np.num_main, np.num_ter, 0));
        let num_slots = ptxt.num_slots();
        let gap = (n / 2) / num_slots;

        let mut coeff = vec![W::default(); num_q * n];
        ntt.inverse(&primes, &mut coeff, &ptxt.mx.as_slice()[..num_q * n]);

        let mut real = vec![0.0f64; n];
        if num_q == 1 {
            let q = primes[0];
            for j in 0..n {
                real[j] = coeff[j].centered(q) as f64 / ptxt.scale();
            }
        } else {
            let lift = CrtLift::new(&primes);
            for j in 0..n {
                real[j] = lift.centered_f64((0..num_q).map(|k| coeff[k * n + j])) / ptxt.scale();
            }
        }

        let mut vals: Vec<Complex64> = (0..num_slots)
            .map(|i| Complex64::new(real[i * gap], real[i * gap + n / 2]))
            .collect();
        self.special_fft(&mut vals);
        *msg = vals;
    }

    /// Scalar constant: same residue in every slot of every prime.
    pub fn encode_constant<W: Word>(
        &self,
        param: &Parameter<W>,
        res: &mut Constant<W>,
        level: i32,
        num_aux: usize,
        scale: f64,
        value: f64,
    ) {
        let np = param.level_to_np(level, num_aux);
        let primes = param.prime_vector(np);
        res.adjust(np);
        res.set_scale(scale);
        let cx = res.cx.as_mut_slice();
        for (k, &q) in primes.iter().enumerate() {
            cx[k] = W::from_f64_mod(value * scale, q);
        }
    }
}

/// Exact CRT reconstruction used on the decode path.
struct CrtLift {
    q_prod: BigInt,
    half: BigInt,
    basis: Vec<BigInt>,
}

impl CrtLift {
    fn new<W: Word>(primes: &[W]) -> Self {
        let q_prod: BigInt = primes
            .iter()
            .fold(BigInt::from(1), |acc, q| acc * BigInt::from(q.to_u64()));
        let basis = primes
            .iter()
            .map(|&qt| {
                let qt_big = BigInt::from(qt.to_u64());
                let ghat = &q_prod / &qt_big;
                let ghat_mod = W::from_u64((&ghat % &qt_big).to_u64().unwrap());
                ghat * BigInt::from(ghat_mod.inv_mod(qt).to_u64())
            })
            .collect();
        let half = &q_prod / 2;
        Self {
            q_prod,
            half,
            basis,
        }
    }

    fn centered_f64<W: Word>(&self, residues: impl Iterator<Item = W>) -> f64 {
        let mut x = BigInt::zero();
        for (r, b) in residues.zip(&self.basis) {
            x += b * BigInt::from(r.to_u64());
        }
        x %= &self.q_prod;
        if x.is_negative() {
            x += &self.q_prod;
        }
        if x > self.half {
            x -= &self.q_prod;
        }
        x.to_f64().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_fft_roundtrip() {
        let enc = Encoder::new(32);
        let mut vals: Vec<Complex64> = (0..16)
            .map(|i| Complex64::new(i as f64 * 0.25 - 1.0, (15 - i) as f64 * 0.125))
            .collect();
        let orig = vals.clone();
        enc.special_ifft(&mut vals);
        enc.special_fft(&mut vals);
        for (a, b) in vals.iter().zip(orig.iter()) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn ifft_output_is_real_for_conjugate_inputs() {
        // Encoding a real-slot message must give real first-half and
        // imaginary second-half coefficients of comparable magnitude.
        let enc = Encoder::new(16);
        let mut vals: Vec<Complex64> = (0..8).map(|i| Complex64::new(i as f64, 0.0)).collect();
        enc.special_ifft(&mut vals);
        let back = {
            let mut v = vals.clone();
            enc.special_fft(&mut v);
            v
        };
        for (i, b) in back.iter().enumerate() {
            assert!((b.re - i as f64).abs() < 1e-10);
            assert!(b.im.abs() < 1e-10);
        }
    }
}
