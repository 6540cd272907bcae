//! Secret-key holder: key generation, encryption and decryption. The
//! evaluating party never sees this type; everything it needs crosses
//! over as `EvaluationKey`s.

use fnv::FnvHashMap;
use rns::Word;
use sampling::{normal_rounded, ternary, uniform, Source};

use crate::container::{Ciphertext, EvaluationKey, LeveledValue, Plaintext};
use crate::context::Context;
use crate::elementwise;
use crate::encode::Complex64;
use crate::evk::{
    EvkMap, EvkRequest, CONJUGATION_KEY, DENSE_TO_SPARSE_KEY, MULTIPLICATION_KEY,
    SPARSE_TO_DENSE_KEY,
};
use crate::npinfo::NPInfo;

const SIGMA: f64 = 3.2;
const MAX_DEVIATION: f64 = 6.0;

/// Per-prime evaluation-domain image of a secret polynomial.
type SecretTable<W> = FnvHashMap<u64, Vec<W>>;

pub struct Client<W: Word> {
    degree: usize,
    key_np: NPInfo,
    source: Source,
    dense: SecretTable<W>,
    sparse: SecretTable<W>,
}

impl<W: Word> Client<W> {
    pub fn new(ctx: &Context<W>) -> Self {
        Self::new_seed(ctx, sampling::new_seed())
    }

    pub fn new_seed(ctx: &Context<W>, seed: [u8; 32]) -> Self {
        let param = ctx.param();
        let n = param.degree();
        let mut source = Source::new(seed);
        let dense_coeffs = ternary(&mut source, n, param.dense_hamming_weight());
        let sparse_coeffs = ternary(&mut source, n, param.sparse_hamming_weight());

        // Both secrets are tabulated over every prime the parameter set
        // can touch, so any level can encrypt and decrypt directly.
        let mut all = param.prime_vector(param.level_to_np(param.max_level(), param.alpha()));
        for l in 0..param.max_level() {
            all.extend(param.prime_vector(param.level_to_np(l, 0)));
        }
        let mut dense = SecretTable::default();
        let mut sparse = SecretTable::default();
        for &q in &all {
            let qv = q.to_u64();
            if dense.contains_key(&qv) {
                continue;
            }
            dense.insert(qv, to_eval(ctx, q, &dense_coeffs));
            sparse.insert(qv, to_eval(ctx, q, &sparse_coeffs));
        }
        Self {
            degree: n,
            key_np: ctx.evk_np(),
            source,
            dense,
            sparse,
        }
    }

    // ---- encryption -------------------------------------------------

    /// Fresh encryption under the dense secret at the plaintext's basis.
    pub fn encrypt(&mut self, ctx: &Context<W>, res: &mut Ciphertext<W>, ptxt: &Plaintext<W>) {
        let param = ctx.param();
        let np = ptxt.np();
        let primes = param.prime_vector(np);
        let n = self.degree;
        res.adjust(param, np);

        let e = normal_rounded(&mut self.source, n, SIGMA, MAX_DEVIATION);
        let mx = ptxt.mx.as_slice();
        let bx = res.bx.as_mut_slice();
        let ax = res.ax.as_mut_slice();
        for (k, &q) in primes.iter().enumerate() {
            let s = &self.dense[&q.to_u64()];
            let mut eq: Vec<W> = e.iter().map(|&v| W::from_i64_mod(v, q)).collect();
            ctx.ntt().table(q).forward_inplace(&mut eq);
            let a = uniform(&mut self.source, n, q.to_u64());
            for j in 0..n {
                let av = W::from_u64(a[j]);
                let idx = k * n + j;
                ax[idx] = av;
                bx[idx] = eq[j]
                    .add_mod(mx[idx], q)
                    .sub_mod(av.mul_mod(s[j], q), q);
            }
        }
        res.set_scale(ptxt.scale());
        res.set_num_slots(ptxt.num_slots());
    }

    pub fn decrypt(&self, ctx: &Context<W>, res: &mut Plaintext<W>, ct: &Ciphertext<W>) {
        let param = ctx.param();
        let np = ct.np();
        let primes = param.prime_vector(np);
        let n = self.degree;
        res.adjust(param, np);

        let bx = ct.bx.as_slice();
        let ax = ct.ax.as_slice();
        let mx = res.mx.as_mut_slice();
        for (k, &q) in primes.iter().enumerate() {
            let s = &self.dense[&q.to_u64()];
            for j in 0..n {
                let idx = k * n + j;
                mx[idx] = bx[idx].add_mod(ax[idx].mul_mod(s[j], q), q);
            }
        }
        if ct.has_rx() {
            let rx = ct.rx.as_slice();
            for (k, &q) in primes.iter().enumerate() {
                let s = &self.dense[&q.to_u64()];
                for j in 0..n {
                    let idx = k * n + j;
                    let s2 = s[j].mul_mod(s[j], q);
                    mx[idx] = mx[idx].add_mod(rx[idx].mul_mod(s2, q), q);
                }
            }
        }
        res.set_scale(ct.scale());
        res.set_num_slots(ct.num_slots());
    }

    pub fn encrypt_msg(
        &mut self,
        ctx: &Context<W>,
        res: &mut Ciphertext<W>,
        msg: &[Complex64],
        level: i32,
    ) {
        let mut ptxt = Plaintext::empty();
        ctx.encode(&mut ptxt, level, ctx.param().scale(level), msg);
        self.encrypt(ctx, res, &ptxt);
    }

    pub fn decrypt_msg(&self, ctx: &Context<W>, ct: &Ciphertext<W>) -> Vec<Complex64> {
        let mut ptxt = Plaintext::empty();
        self.decrypt(ctx, &mut ptxt, ct);
        let mut msg = Vec::new();
        ctx.decode(&mut msg, &ptxt);
        msg
    }

    // ---- key generation ---------------------------------------------

    pub fn prepare_multiplication_key(&mut self, ctx: &Context<W>, evk_map: &mut EvkMap<W>) {
        let under = self.dense.clone();
        let target = self.map_secret(ctx, |q, s| {
            s.iter().map(|&v| v.mul_mod(v, q)).collect()
        });
        let evk = self.switching_key(ctx, &under, &target);
        evk_map.insert(MULTIPLICATION_KEY, evk);
    }

    pub fn prepare_conjugation_key(&mut self, ctx: &Context<W>, evk_map: &mut EvkMap<W>) {
        let factor = ctx.param().conjugation_factor();
        let under = self.permuted_secret(ctx, factor);
        let target = self.dense.clone();
        let evk = self.switching_key(ctx, &under, &target);
        evk_map.insert(CONJUGATION_KEY, evk);
    }

    pub fn prepare_rotation_key(
        &mut self,
        ctx: &Context<W>,
        evk_map: &mut EvkMap<W>,
        rot_dist: usize,
    ) {
        let param = ctx.param();
        assert!(rot_dist > 0 && rot_dist < param.num_slots_max());
        // The key switch runs before the slot permutation, so it moves
        // the ciphertext onto the inverse automorphism image of the
        // secret: the key encrypts the secret itself under that image.
        let g = param.galois_factor(rot_dist);
        let g_inv = invert_odd(g, 2 * self.degree);
        let under = self.permuted_secret(ctx, g_inv);
        let target = self.dense.clone();
        let evk = self.switching_key(ctx, &under, &target);
        evk_map.insert(rot_dist as i64, evk);
    }

    pub fn prepare_rotation_keys(
        &mut self,
        ctx: &Context<W>,
        evk_map: &mut EvkMap<W>,
        req: &EvkRequest,
    ) {
        for (rot_dist, _) in req.iter() {
            if !evk_map.contains(rot_dist) {
                self.prepare_rotation_key(ctx, evk_map, rot_dist as usize);
            }
        }
    }

    pub fn prepare_dense_to_sparse_key(&mut self, ctx: &Context<W>, evk_map: &mut EvkMap<W>) {
        let under = self.sparse.clone();
        let target = self.dense.clone();
        let evk = self.switching_key(ctx, &under, &target);
        evk_map.insert(DENSE_TO_SPARSE_KEY, evk);
    }

    pub fn prepare_sparse_to_dense_key(&mut self, ctx: &Context<W>, evk_map: &mut EvkMap<W>) {
        let under = self.dense.clone();
        let target = self.sparse.clone();
        let evk = self.switching_key(ctx, &under, &target);
        evk_map.insert(SPARSE_TO_DENSE_KEY, evk);
    }

    fn map_secret(
        &self,
        ctx: &Context<W>,
        f: impl Fn(W, &[W]) -> Vec<W>,
    ) -> SecretTable<W> {
        let key_primes = ctx.param().prime_vector(self.key_np);
        key_primes
            .iter()
            .map(|&q| (q.to_u64(), f(q, &self.dense[&q.to_u64()])))
            .collect()
    }

    fn permuted_secret(&self, ctx: &Context<W>, factor: usize) -> SecretTable<W> {
        let perm = elementwise::make_permutation(ctx.param().log_degree(), factor);
        self.map_secret(ctx, |_, s| {
            perm.iter().map(|&p| s[p as usize]).collect()
        })
    }

    /// Gadget key encrypting `s_target` under `s_under`: digit `j`
    /// carries `P * s_target` on its group primes. Switching with it
    /// moves a ciphertext from decrypting under `s_target` to decrypting
    /// under `s_under`.
    fn switching_key(
        &mut self,
        ctx: &Context<W>,
        s_under: &SecretTable<W>,
        s_target: &SecretTable<W>,
    ) -> EvaluationKey<W> {
        let param = ctx.param();
        let n = self.degree;
        let np = self.key_np;
        let key_primes = param.prime_vector(np);
        let num_q = np.num_q();
        let alpha = param.alpha();
        let beta = param.dnum();

        let p_mod: Vec<W> = key_primes
            .iter()
            .map(|&q| {
                param.aux_primes().iter().fold(W::from_u64(1), |acc, &p| {
                    acc.mul_mod(W::from_u64(p.to_u64() % q.to_u64()), q)
                })
            })
            .collect();

        let mut evk = param.new_evaluation_key(np, beta);
        for j in 0..beta {
            let s0 = j * alpha;
            let s1 = ((j + 1) * alpha).min(num_q);
            let e = normal_rounded(&mut self.source, n, SIGMA, MAX_DEVIATION);
            let bx = evk.bx[j].as_mut_slice();
            let ax = evk.ax[j].as_mut_slice();
            for (k, &q) in key_primes.iter().enumerate() {
                let s = &s_under[&q.to_u64()];
                let mut eq: Vec<W> = e.iter().map(|&v| W::from_i64_mod(v, q)).collect();
                ctx.ntt().table(q).forward_inplace(&mut eq);
                let a = uniform(&mut self.source, n, q.to_u64());
                let st = if (s0..s1).contains(&k) {
                    Some(&s_target[&q.to_u64()])
                } else {
                    None
                };
                for i in 0..n {
                    let av = W::from_u64(a[i]);
                    let idx = k * n + i;
                    ax[idx] = av;
                    let mut b = eq[i].sub_mod(av.mul_mod(s[i], q), q);
                    if let Some(st) = st {
                        b = b.add_mod(p_mod[k].mul_mod(st[i], q), q);
                    }
                    bx[idx] = b;
                }
            }
        }
        evk
    }
}

fn to_eval<W: Word>(ctx: &Context<W>, q: W, coeffs: &[i64]) -> Vec<W> {
    let mut v: Vec<W> = coeffs.iter().map(|&c| W::from_i64_mod(c, q)).collect();
    ctx.ntt().table(q).forward_inplace(&mut v);
    v
}

/// Inverse of an odd unit modulo the power of two `m`.
fn invert_odd(g: usize, m: usize) -> usize {
    debug_assert!(g % 2 == 1);
    let mut x = g;
    // Newton iteration doubles the valid bits each round.
    for _ in 0..m.trailing_zeros() {
        x = x.wrapping_mul(2usize.wrapping_sub(g.wrapping_mul(x))) % m;
    }
    (x + m) % m
}
