//! Basis switching: gadget-decomposed ModUp, ModDown, Rescale, and the
//! fused ModDown-and-rescale, one precomputed handler per level.
//!
//! Conversions between prime bases use the floating-point correction
//! variant of approximate RNS extension: digits are lifted centered, the
//! overflow count is recovered from a running `sum(y_t / q_t)`, and the
//! result is exact whenever the source basis is a single prime.

use backend::DeviceVec;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use rns::Word;

use crate::ntt_engine::NttEngine;
use crate::parameter::Parameter;

/// Precomputed approximate conversion from one prime basis to another.
pub struct BasisConv<W: Word> {
    src_primes: Vec<W>,
    dst_primes: Vec<W>,
    // (G/q_t)^-1 mod q_t, Shoup form
    ghat_inv: Vec<W>,
    ghat_inv_shoup: Vec<W>,
    // [dst][src]: (G/q_t) mod p
    ghat_mod: Vec<Vec<W>>,
    // G mod p
    g_mod: Vec<W>,
    inv_src: Vec<f64>,
}

impl<W: Word> BasisConv<W> {
    pub fn new(src_primes: &[W], dst_primes: &[W]) -> Self {
        let ghat_inv: Vec<W> = src_primes
            .iter()
            .map(|&qt| {
                let mut prod = W::from_u64(1);
                for &qs in src_primes {
                    if qs != qt {
                        prod = prod.mul_mod(W::from_u64(qs.to_u64() % qt.to_u64()), qt);
                    }
                }
                prod.inv_mod(qt)
            })
            .collect();
        let ghat_inv_shoup = src_primes
            .iter()
            .zip(&ghat_inv)
            .map(|(&qt, &gi)| gi.shoup_precompute(qt))
            .collect();
        let ghat_mod: Vec<Vec<W>> = dst_primes
            .iter()
            .map(|&p| {
                src_primes
                    .iter()
                    .map(|&qt| {
                        let mut prod = W::from_u64(1);
                        for &qs in src_primes {
                            if qs != qt {
                                prod = prod.mul_mod(W::from_u64(qs.to_u64() % p.to_u64()), p);
                            }
                        }
                        prod
                    })
                    .collect()
            })
            .collect();
        let g_mod: Vec<W> = dst_primes
            .iter()
            .map(|&p| {
                let mut prod = W::from_u64(1);
                for &qs in src_primes {
                    prod = prod.mul_mod(W::from_u64(qs.to_u64() % p.to_u64()), p);
                }
                prod
            })
            .collect();
        Self {
            src_primes: src_primes.to_vec(),
            dst_primes: dst_primes.to_vec(),
            ghat_inv,
            ghat_inv_shoup,
            ghat_mod,
            g_mod,
            inv_src: src_primes.iter().map(|q| 1.0 / q.to_u64() as f64).collect(),
        }
    }

    pub fn num_src(&self) -> usize {
        self.src_primes.len()
    }

    pub fn num_dst(&self) -> usize {
        self.dst_primes.len()
    }

    /// Converts `num_src` coefficient-domain polynomials into `num_dst`
    /// coefficient-domain polynomials over the destination primes.
    pub fn convert(&self, n: usize, dst: &mut [W], src: &[W]) {
        let ns = self.src_primes.len();
        let nd = self.dst_primes.len();
        debug_assert_eq!(src.len(), ns * n);
        debug_assert_eq!(dst.len(), nd * n);
        let mut digits = vec![0i64; ns];
        for j in 0..n {
            let mut frac = 0.0f64;
            for t in 0..ns {
                let qt = self.src_primes[t];
                let d = src[t * n + j].mul_shoup(
                    self.ghat_inv[t],
                    self.ghat_inv_shoup[t],
                    qt,
                );
                let c = d.centered(qt);
                digits[t] = c;
                frac += c as f64 * self.inv_src[t];
            }
            let v = frac.round() as i64;
            for (k, &p) in self.dst_primes.iter().enumerate() {
                let mut acc = W::default();
                for t in 0..ns {
                    let dt = W::from_i64_mod(digits[t], p);
                    acc = acc.add_mod(dt.mul_mod(self.ghat_mod[k][t], p), p);
                }
                let corr = W::from_i64_mod(v, p).mul_mod(self.g_mod[k], p);
                dst[k * n + j] = acc.sub_mod(corr, p);
            }
        }
    }
}

/// Exact centered lift from a small basis into a larger one, used by the
/// bootstrap mod-raise. Cost is per-coefficient big-integer CRT; the
/// source basis is the level-0 chain, so this stays off the hot path.
pub struct ExactLift<W: Word> {
    src_primes: Vec<W>,
    dst_primes: Vec<W>,
    crt_basis: Vec<BigInt>,
    q_prod: BigInt,
}

impl<W: Word> ExactLift<W> {
    pub fn new(src_primes: &[W], dst_primes: &[W]) -> Self {
        let q_prod: BigInt = src_primes
            .iter()
            .fold(BigInt::from(1), |acc, q| acc * BigInt::from(q.to_u64()));
        let crt_basis = src_primes
            .iter()
            .map(|&qt| {
                let qt_big = BigInt::from(qt.to_u64());
                let ghat = &q_prod / &qt_big;
                let ghat_mod = (&ghat % &qt_big).to_u64().map(W::from_u64).unwrap();
                let inv = ghat_mod.inv_mod(qt).to_u64();
                ghat * BigInt::from(inv)
            })
            .collect();
        Self {
            src_primes: src_primes.to_vec(),
            dst_primes: dst_primes.to_vec(),
            crt_basis,
            q_prod,
        }
    }

    pub fn lift(&self, n: usize, dst: &mut [W], src: &[W]) {
        let ns = self.src_primes.len();
        let nd = self.dst_primes.len();
        debug_assert_eq!(src.len(), ns * n);
        debug_assert_eq!(dst.len(), nd * n);
        let half = &self.q_prod / 2;
        for j in 0..n {
            let mut x = BigInt::zero();
            for t in 0..ns {
                x += &self.crt_basis[t] * BigInt::from(src[t * n + j].to_u64());
            }
            x %= &self.q_prod;
            if x > half {
                x -= &self.q_prod;
            }
            for (k, &p) in self.dst_primes.iter().enumerate() {
                let pv = BigInt::from(p.to_u64());
                let mut r = &x % &pv;
                if r.is_negative() {
                    r += &pv;
                }
                dst[k * n + j] = W::from_u64(r.to_u64().unwrap());
            }
        }
    }
}

struct RescaleTables<W: Word> {
    // the lower basis, a prefix of this level's Q basis
    kept_primes: Vec<W>,
    drop_conv: BasisConv<W>,
    // product of dropped primes, inverted per kept prime
    d_inv: Vec<W>,
    d_inv_shoup: Vec<W>,
    // fused variant: source basis aux ++ dropped
    pd_conv: BasisConv<W>,
    pd_inv: Vec<W>,
    pd_inv_shoup: Vec<W>,
}

/// Per-level basis-switch handler.
pub struct ModSwitch<W: Word> {
    degree: usize,
    level: i32,
    alpha: usize,
    beta: usize,
    q_primes: Vec<W>,
    qp_primes: Vec<W>,
    digit_convs: Vec<BasisConv<W>>,
    digit_ranges: Vec<(usize, usize)>,
    digit_dst_pos: Vec<Vec<usize>>,
    p_mod_q: Vec<W>,
    p_mod_q_shoup: Vec<W>,
    p_inv_mod_q: Vec<W>,
    p_inv_mod_q_shoup: Vec<W>,
    down_conv: BasisConv<W>,
    rescale_tables: Option<RescaleTables<W>>,
}

impl<W: Word> ModSwitch<W> {
    pub fn new(param: &Parameter<W>, level: i32) -> Self {
        let degree = param.degree();
        let alpha = param.alpha();
        let beta = param.beta(level);
        let q_primes = param.prime_vector(param.level_to_np(level, 0));
        let qp_primes = param.prime_vector(param.level_to_np(level, alpha));
        let num_q = q_primes.len();
        let aux = &qp_primes[num_q..];

        let mut digit_convs = Vec::with_capacity(beta);
        let mut digit_ranges = Vec::with_capacity(beta);
        let mut digit_dst_pos = Vec::with_capacity(beta);
        for j in 0..beta {
            let s0 = j * alpha;
            let s1 = ((j + 1) * alpha).min(num_q);
            let group = &q_primes[s0..s1];
            let mut dst_pos = Vec::new();
            let mut dst_primes = Vec::new();
            for (pos, &q) in qp_primes.iter().enumerate() {
                if !(s0..s1).contains(&pos) {
                    dst_pos.push(pos);
                    dst_primes.push(q);
                }
            }
            digit_convs.push(BasisConv::new(group, &dst_primes));
            digit_ranges.push((s0, s1));
            digit_dst_pos.push(dst_pos);
        }

        let p_mod_q: Vec<W> = q_primes
            .iter()
            .map(|&q| {
                aux.iter().fold(W::from_u64(1), |acc, &p| {
                    acc.mul_mod(W::from_u64(p.to_u64() % q.to_u64()), q)
                })
            })
            .collect();
        let p_inv_mod_q: Vec<W> = p_mod_q
            .iter()
            .zip(&q_primes)
            .map(|(&pm, &q)| pm.inv_mod(q))
            .collect();
        let shoup = |v: &[W]| -> Vec<W> {
            v.iter()
                .zip(&q_primes)
                .map(|(&x, &q)| x.shoup_precompute(q))
                .collect()
        };
        let p_mod_q_shoup = shoup(&p_mod_q);
        let p_inv_mod_q_shoup = shoup(&p_inv_mod_q);

        let down_conv = BasisConv::new(aux, &q_primes);

        let rescale_tables = if level > 0 {
            let kept_primes = param.prime_vector(param.level_to_np(level - 1, 0));
            // Parameter::new guarantees the lower basis prefixes this one.
            debug_assert!(q_primes[..kept_primes.len()] == kept_primes[..]);
            let dropped: Vec<W> = q_primes[kept_primes.len()..].to_vec();
            assert!(!dropped.is_empty());

            let inv_prod = |group: &[W]| -> (Vec<W>, Vec<W>) {
                let inv: Vec<W> = kept_primes
                    .iter()
                    .map(|&q| {
                        group
                            .iter()
                            .fold(W::from_u64(1), |acc, &d| {
                                acc.mul_mod(W::from_u64(d.to_u64() % q.to_u64()), q)
                            })
                            .inv_mod(q)
                    })
                    .collect();
                let sh = inv
                    .iter()
                    .zip(&kept_primes)
                    .map(|(&x, &q)| x.shoup_precompute(q))
                    .collect();
                (inv, sh)
            };
            let (d_inv, d_inv_shoup) = inv_prod(&dropped);
            let mut aux_dropped: Vec<W> = aux.to_vec();
            aux_dropped.extend(&dropped);
            let (pd_inv, pd_inv_shoup) = inv_prod(&aux_dropped);

            Some(RescaleTables {
                drop_conv: BasisConv::new(&dropped, &kept_primes),
                pd_conv: BasisConv::new(&aux_dropped, &kept_primes),
                kept_primes,
                d_inv,
                d_inv_shoup,
                pd_inv,
                pd_inv_shoup,
            })
        } else {
            None
        };

        Self {
            degree,
            level,
            alpha,
            beta,
            q_primes,
            qp_primes,
            digit_convs,
            digit_ranges,
            digit_dst_pos,
            p_mod_q,
            p_mod_q_shoup,
            p_inv_mod_q,
            p_inv_mod_q_shoup,
            down_conv,
            rescale_tables,
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn beta(&self) -> usize {
        self.beta
    }

    pub fn num_q(&self) -> usize {
        self.q_primes.len()
    }

    pub fn num_qp(&self) -> usize {
        self.qp_primes.len()
    }

    pub fn q_primes(&self) -> &[W] {
        &self.q_primes
    }

    pub fn qp_primes(&self) -> &[W] {
        &self.qp_primes
    }

    /// Gadget decomposition with basis extension: `num_q` evaluation-
    /// domain components in, `beta` polynomials over the full Q+P basis
    /// out. Component positions inside each digit keep the source values.
    pub fn mod_up(&self, ntt: &NttEngine<W>, digits: &mut Vec<DeviceVec<W>>, src: &[W]) {
        let n = self.degree;
        debug_assert_eq!(src.len(), self.num_q() * n);
        digits.resize_with(self.beta, || DeviceVec::new(0));
        for j in 0..self.beta {
            let (s0, s1) = self.digit_ranges[j];
            let group_primes = &self.q_primes[s0..s1];
            let mut coeff = vec![W::default(); (s1 - s0) * n];
            ntt.inverse(group_primes, &mut coeff, &src[s0 * n..s1 * n]);

            let conv = &self.digit_convs[j];
            let mut ext = vec![W::default(); conv.num_dst() * n];
            conv.convert(n, &mut ext, &coeff);

            let dst = &mut digits[j];
            dst.resize_discard(self.num_qp() * n);
            let data = dst.as_mut_slice();
            data[s0 * n..s1 * n].copy_from_slice(&src[s0 * n..s1 * n]);
            for (k, &pos) in self.digit_dst_pos[j].iter().enumerate() {
                let chunk = &mut data[pos * n..(pos + 1) * n];
                chunk.copy_from_slice(&ext[k * n..(k + 1) * n]);
                ntt.table(self.qp_primes[pos]).forward_inplace(chunk);
            }
        }
    }

    /// Removes the auxiliary basis: `(src - lift(aux part)) * P^-1`.
    pub fn mod_down(&self, ntt: &NttEngine<W>, dst: &mut [W], src: &[W]) {
        let n = self.degree;
        let num_q = self.num_q();
        debug_assert_eq!(src.len(), self.num_qp() * n);
        debug_assert_eq!(dst.len(), num_q * n);

        let aux_primes = &self.qp_primes[num_q..];
        let mut coeff = vec![W::default(); self.alpha * n];
        ntt.inverse(aux_primes, &mut coeff, &src[num_q * n..]);
        let mut ext = vec![W::default(); num_q * n];
        self.down_conv.convert(n, &mut ext, &coeff);
        ntt.forward_inplace(&self.q_primes, &mut ext);

        for (i, &q) in self.q_primes.iter().enumerate() {
            let pi = self.p_inv_mod_q[i];
            let ps = self.p_inv_mod_q_shoup[i];
            for j in 0..n {
                let idx = i * n + j;
                dst[idx] = src[idx].sub_mod(ext[idx], q).mul_shoup(pi, ps, q);
            }
        }
    }

    /// Drops this level's rescaling primes, dividing the value by their
    /// product.
    pub fn rescale(&self, ntt: &NttEngine<W>, dst: &mut [W], src: &[W]) {
        let rt = self
            .rescale_tables
            .as_ref()
            .expect("rescale from level 0 is invalid");
        let n = self.degree;
        debug_assert_eq!(src.len(), self.num_q() * n);
        let nk = rt.kept_primes.len();

        let mut coeff = vec![W::default(); (self.num_q() - nk) * n];
        ntt.inverse(&self.q_primes[nk..], &mut coeff, &src[nk * n..]);
        let mut ext = vec![W::default(); nk * n];
        rt.drop_conv.convert(n, &mut ext, &coeff);
        ntt.forward_inplace(&rt.kept_primes, &mut ext);

        self.finish_division(dst, src, rt, &ext, &rt.d_inv, &rt.d_inv_shoup);
    }

    /// Fused ModDown + rescale over the union basis P and the dropped
    /// primes; numerically identical to the two-step path.
    pub fn mod_down_rescale(&self, ntt: &NttEngine<W>, dst: &mut [W], src: &[W]) {
        let rt = self
            .rescale_tables
            .as_ref()
            .expect("rescale from level 0 is invalid");
        let n = self.degree;
        let num_q = self.num_q();
        debug_assert_eq!(src.len(), self.num_qp() * n);
        let nk = rt.kept_primes.len();

        let num_union = self.alpha + num_q - nk;
        let mut coeff = vec![W::default(); num_union * n];
        let aux_primes = &self.qp_primes[num_q..];
        ntt.inverse(aux_primes, &mut coeff[..self.alpha * n], &src[num_q * n..]);
        ntt.inverse(
            &self.q_primes[nk..],
            &mut coeff[self.alpha * n..],
            &src[nk * n..num_q * n],
        );
        let mut ext = vec![W::default(); nk * n];
        rt.pd_conv.convert(n, &mut ext, &coeff);
        ntt.forward_inplace(&rt.kept_primes, &mut ext);

        self.finish_division(dst, src, rt, &ext, &rt.pd_inv, &rt.pd_inv_shoup);
    }

    fn finish_division(
        &self,
        dst: &mut [W],
        src: &[W],
        rt: &RescaleTables<W>,
        ext: &[W],
        inv: &[W],
        inv_shoup: &[W],
    ) {
        let n = self.degree;
        debug_assert_eq!(dst.len(), rt.kept_primes.len() * n);
        for (d, &q) in rt.kept_primes.iter().enumerate() {
            let iv = inv[d];
            let is = inv_shoup[d];
            for j in 0..n {
                dst[d * n + j] = src[d * n + j]
                    .sub_mod(ext[d * n + j], q)
                    .mul_shoup(iv, is, q);
            }
        }
    }

    /// Multiplies the Q part by `P mod q` and zeroes the auxiliary part,
    /// so a plain polynomial can be added into a raised accumulator.
    pub fn pseudo_mod_up(&self, dst: &mut [W], src: &[W]) {
        let n = self.degree;
        let num_q = self.num_q();
        debug_assert_eq!(src.len(), num_q * n);
        debug_assert_eq!(dst.len(), self.num_qp() * n);
        for (i, &q) in self.q_primes.iter().enumerate() {
            let pm = self.p_mod_q[i];
            let ps = self.p_mod_q_shoup[i];
            for j in 0..n {
                dst[i * n + j] = src[i * n + j].mul_shoup(pm, ps, q);
            }
        }
        dst[num_q * n..].fill(W::default());
    }

    /// Product of this level's rescaling primes, for scale bookkeeping.
    pub fn dropped_prime_prod(&self) -> f64 {
        match &self.rescale_tables {
            Some(rt) => self.q_primes[rt.kept_primes.len()..]
                .iter()
                .map(|q| q.to_u64() as f64)
                .product(),
            None => 1.0,
        }
    }
}
