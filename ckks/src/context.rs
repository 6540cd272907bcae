//! Evaluation context: owns the parameter set, transform tables and
//! per-level basis-switch handlers, and exposes the homomorphic
//! operation surface. All preconditions abort; there are no recoverable
//! errors at this layer.

use backend::DeviceVec;
use rns::Word;

use crate::container::{Ciphertext, Constant, EvaluationKey, LeveledValue, Plaintext};
use crate::elementwise;
use crate::encode::{Complex64, Encoder};
use crate::modswitch::ModSwitch;
use crate::multi_level::MultiLevelCiphertext;
use crate::npinfo::NPInfo;
use crate::ntt_engine::NttEngine;
use crate::parameter::Parameter;

const SCALE_TOLERANCE: f64 = 1e-6;

pub struct Context<W: Word> {
    param: Parameter<W>,
    ntt: NttEngine<W>,
    encoder: Encoder,
    mod_switch: Vec<ModSwitch<W>>,
    // value-preserving constants for one-level drops, indexed by level
    level_down_consts: Vec<Constant<W>>,
    evk_np: NPInfo,
    // per level: position of each Q+P prime inside the key basis
    evk_index: Vec<Vec<usize>>,
}

impl<W: Word> Context<W> {
    pub fn new(param: Parameter<W>) -> Self {
        let ntt = NttEngine::new(&param);
        let encoder = Encoder::new(param.degree());
        let mod_switch: Vec<ModSwitch<W>> = (0..=param.max_level())
            .map(|l| ModSwitch::new(&param, l))
            .collect();

        let evk_np = NPInfo::new(param.max_num_main(), param.max_num_ter(), param.alpha());
        let key_primes = param.prime_vector(evk_np);
        // Every level's Q basis prefixes the key's, so digit groups align
        // and only the auxiliary tail moves position.
        let evk_index = (0..=param.max_level())
            .map(|l| {
                let qp = param.prime_vector(param.level_to_np(l, param.alpha()));
                qp.iter()
                    .map(|p| key_primes.iter().position(|k| k == p).unwrap())
                    .collect()
            })
            .collect();

        let mut ctx = Self {
            param,
            ntt,
            encoder,
            mod_switch,
            level_down_consts: Vec::new(),
            evk_np,
            evk_index,
        };
        let mut consts = vec![Constant::empty()];
        for l in 1..=ctx.param.max_level() {
            let mut c = Constant::empty();
            ctx.encoder
                .encode_constant(&ctx.param, &mut c, l, 0, ctx.param.scale(l), 1.0);
            consts.push(c);
        }
        ctx.level_down_consts = consts;
        ctx
    }

    pub fn param(&self) -> &Parameter<W> {
        &self.param
    }

    pub fn ntt(&self) -> &NttEngine<W> {
        &self.ntt
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn mod_switch(&self, level: i32) -> &ModSwitch<W> {
        &self.mod_switch[level as usize]
    }

    pub fn evk_np(&self) -> NPInfo {
        self.evk_np
    }

    pub fn level_of(&self, v: &impl LeveledValue) -> i32 {
        self.param.np_to_level(&v.np())
    }

    pub fn assert_same_scale(&self, s1: f64, s2: f64) {
        assert!(
            (s1 / s2 - 1.0).abs() < SCALE_TOLERANCE,
            "scale mismatch: {} vs {}",
            s1,
            s2
        );
    }

    fn assert_clean_pair(&self, a: &Ciphertext<W>, b: &Ciphertext<W>) {
        assert_eq!(a.np(), b.np(), "operand bases differ");
        assert!(!a.has_rx() && !b.has_rx(), "operand carries an unrelinearized part");
    }

    // ---- encode / decode convenience -------------------------------

    pub fn encode(
        &self,
        ptxt: &mut Plaintext<W>,
        level: i32,
        scale: f64,
        msg: &[Complex64],
    ) {
        self.encoder
            .encode(&self.param, &self.ntt, ptxt, level, 0, scale, msg);
    }

    pub fn decode(&self, msg: &mut Vec<Complex64>, ptxt: &Plaintext<W>) {
        self.encoder.decode(&self.param, &self.ntt, msg, ptxt);
    }

    pub fn encode_constant(&self, res: &mut Constant<W>, level: i32, scale: f64, value: f64) {
        self.encoder
            .encode_constant(&self.param, res, level, 0, scale, value);
    }

    // ---- linear operations -----------------------------------------

    pub fn copy(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>) {
        res.adjust(&self.param, a.np());
        res.bx.copy_from(&a.bx);
        res.ax.copy_from(&a.ax);
        if a.has_rx() {
            res.prepare_rx();
            res.rx.copy_from(&a.rx);
        }
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn add(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Ciphertext<W>) {
        self.assert_clean_pair(a, b);
        self.assert_same_scale(a.scale(), b.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::add(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), b.bx.as_slice());
        elementwise::add(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice(), b.ax.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots().max(b.num_slots()));
    }

    pub fn sub(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Ciphertext<W>) {
        self.assert_clean_pair(a, b);
        self.assert_same_scale(a.scale(), b.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::sub(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), b.bx.as_slice());
        elementwise::sub(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice(), b.ax.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots().max(b.num_slots()));
    }

    pub fn add_assign(&self, res: &mut Ciphertext<W>, b: &Ciphertext<W>) {
        assert_eq!(res.np(), b.np(), "operand bases differ");
        self.assert_same_scale(res.scale(), b.scale());
        let primes = self.param.prime_vector(res.np());
        let n = self.param.degree();
        elementwise::add_assign(&primes, n, res.bx.as_mut_slice(), b.bx.as_slice());
        elementwise::add_assign(&primes, n, res.ax.as_mut_slice(), b.ax.as_slice());
    }

    pub fn neg(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>) {
        assert!(!a.has_rx());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::neg(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice());
        elementwise::neg(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn add_pt(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Plaintext<W>) {
        assert_eq!(a.np(), b.np());
        self.assert_same_scale(a.scale(), b.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::add(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), b.mx.as_slice());
        res.ax.copy_from(&a.ax);
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn sub_pt(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Plaintext<W>) {
        assert_eq!(a.np(), b.np());
        self.assert_same_scale(a.scale(), b.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::sub(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), b.mx.as_slice());
        res.ax.copy_from(&a.ax);
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    /// `res = b - a`
    pub fn sub_opposite_pt(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Plaintext<W>) {
        assert_eq!(a.np(), b.np());
        self.assert_same_scale(a.scale(), b.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::sub(&primes, n, res.bx.as_mut_slice(), b.mx.as_slice(), a.bx.as_slice());
        elementwise::neg(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn add_const(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, c: &Constant<W>) {
        assert_eq!(a.np(), c.np());
        self.assert_same_scale(a.scale(), c.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::add_scalar(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), c.cx.as_slice());
        res.ax.copy_from(&a.ax);
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn sub_const(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, c: &Constant<W>) {
        assert_eq!(a.np(), c.np());
        self.assert_same_scale(a.scale(), c.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::sub_scalar(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), c.cx.as_slice());
        res.ax.copy_from(&a.ax);
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    /// `res = c - a`
    pub fn sub_opposite_const(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, c: &Constant<W>) {
        assert_eq!(a.np(), c.np());
        self.assert_same_scale(a.scale(), c.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::sub_opposite_scalar(
            &primes,
            n,
            res.bx.as_mut_slice(),
            a.bx.as_slice(),
            c.cx.as_slice(),
        );
        elementwise::neg(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    // ---- multiplications -------------------------------------------

    /// Tensor product; the result carries the degree-two part `rx` until
    /// relinearized.
    pub fn mult(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Ciphertext<W>) {
        self.assert_clean_pair(a, b);
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        res.prepare_rx();
        elementwise::tensor(
            &primes,
            n,
            res.bx.as_mut_slice(),
            res.ax.as_mut_slice(),
            res.rx.as_mut_slice(),
            a.bx.as_slice(),
            a.ax.as_slice(),
            b.bx.as_slice(),
            b.ax.as_slice(),
        );
        res.set_scale(a.scale() * b.scale());
        res.set_num_slots(a.num_slots().max(b.num_slots()));
    }

    pub fn mult_pt(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Plaintext<W>) {
        assert_eq!(a.np(), b.np());
        assert!(!a.has_rx());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::mult(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), b.mx.as_slice());
        elementwise::mult(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice(), b.mx.as_slice());
        res.set_scale(a.scale() * b.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn mult_const(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, c: &Constant<W>) {
        assert_eq!(a.np(), c.np());
        assert!(!a.has_rx());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        elementwise::mult_scalar(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), c.cx.as_slice());
        elementwise::mult_scalar(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice(), c.cx.as_slice());
        res.set_scale(a.scale() * c.scale());
        res.set_num_slots(a.num_slots());
    }

    pub fn mult_const_assign(&self, res: &mut Ciphertext<W>, c: &Constant<W>) {
        assert_eq!(res.np(), c.np());
        let primes = self.param.prime_vector(res.np());
        let n = self.param.degree();
        elementwise::mult_scalar_assign(&primes, n, res.bx.as_mut_slice(), c.cx.as_slice());
        elementwise::mult_scalar_assign(&primes, n, res.ax.as_mut_slice(), c.cx.as_slice());
        res.set_scale(res.scale() * c.scale());
    }

    /// `res += a * b`; the caller's declared result scale must already
    /// equal the product scale.
    pub fn mad_pt(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Plaintext<W>) {
        assert_eq!(res.np(), a.np());
        assert_eq!(a.np(), b.np());
        self.assert_same_scale(res.scale(), a.scale() * b.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        elementwise::mult_accum(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice(), b.mx.as_slice());
        elementwise::mult_accum(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice(), b.mx.as_slice());
    }

    pub fn mad_const(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, c: &Constant<W>) {
        assert_eq!(res.np(), a.np());
        assert_eq!(a.np(), c.np());
        self.assert_same_scale(res.scale(), a.scale() * c.scale());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        elementwise::mult_scalar_accum(
            &primes,
            n,
            res.bx.as_mut_slice(),
            a.bx.as_slice(),
            c.cx.as_slice(),
        );
        elementwise::mult_scalar_accum(
            &primes,
            n,
            res.ax.as_mut_slice(),
            a.ax.as_slice(),
            c.cx.as_slice(),
        );
    }

    /// True when both levels' bases contain the shared lower basis, so a
    /// cross-level tensor can run on restricted views.
    pub fn is_mult_unsafe_compatible(&self, l1: i32, l2: i32) -> bool {
        let t = l1.min(l2);
        if t < 0 {
            return false;
        }
        let target = self.param.prime_vector(self.param.level_to_np(t, 0));
        for l in [l1, l2] {
            let v = self.param.prime_vector(self.param.level_to_np(l, 0));
            if !target.iter().all(|p| v.contains(p)) {
                return false;
            }
        }
        true
    }

    /// Tensor product of operands at different levels, evaluated at the
    /// lower one. Skips scale compatibility checks.
    pub fn mult_unsafe(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Ciphertext<W>) {
        let la = self.level_of(a);
        let lb = self.level_of(b);
        assert!(
            self.is_mult_unsafe_compatible(la, lb),
            "levels {} and {} do not share a basis",
            la,
            lb
        );
        let t = la.min(lb);
        let np = self.param.level_to_np(t, 0);
        let primes = self.param.prime_vector(np);
        let n = self.param.degree();

        let restrict = |src: &DeviceVec<W>, src_np: NPInfo| -> DeviceVec<W> {
            let src_primes = self.param.prime_vector(src_np);
            let mut out = DeviceVec::new(primes.len() * n);
            for (d, p) in primes.iter().enumerate() {
                let s = src_primes.iter().position(|x| x == p).unwrap();
                out.as_mut_slice()[d * n..(d + 1) * n]
                    .copy_from_slice(&src.as_slice()[s * n..(s + 1) * n]);
            }
            out
        };
        let ab = restrict(&a.bx, a.np());
        let aa = restrict(&a.ax, a.np());
        let bb = restrict(&b.bx, b.np());
        let ba = restrict(&b.ax, b.np());

        res.adjust(&self.param, np);
        res.prepare_rx();
        elementwise::tensor(
            &primes,
            n,
            res.bx.as_mut_slice(),
            res.ax.as_mut_slice(),
            res.rx.as_mut_slice(),
            ab.as_slice(),
            aa.as_slice(),
            bb.as_slice(),
            ba.as_slice(),
        );
        res.set_scale(a.scale() * b.scale());
        res.set_num_slots(a.num_slots().max(b.num_slots()));
    }

    /// `res += a ⊗ b` on the shared basis; identical to `mult_unsafe`
    /// followed by a three-polynomial accumulate. Skips scale checks the
    /// same way `mult_unsafe` does.
    pub fn mad_unsafe(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, b: &Ciphertext<W>) {
        let mut t = Ciphertext::empty();
        self.mult_unsafe(&mut t, a, b);
        assert_eq!(res.np(), t.np(), "accumulator basis differs");
        assert!(res.has_rx(), "accumulator lacks the degree-two part");
        let primes = self.param.prime_vector(t.np());
        let n = self.param.degree();
        elementwise::add_assign(&primes, n, res.bx.as_mut_slice(), t.bx.as_slice());
        elementwise::add_assign(&primes, n, res.ax.as_mut_slice(), t.ax.as_slice());
        elementwise::add_assign(&primes, n, res.rx.as_mut_slice(), t.rx.as_slice());
    }

    pub fn mult_imaginary_unit(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>) {
        assert!(!a.has_rx());
        let primes = self.param.prime_vector(a.np());
        let n = self.param.degree();
        res.adjust(&self.param, a.np());
        for (k, &q) in primes.iter().enumerate() {
            let iu = self.ntt.imaginary_unit(q);
            let r = k * n..(k + 1) * n;
            elementwise::mult(
                &[q],
                n,
                &mut res.bx.as_mut_slice()[r.clone()],
                &a.bx.as_slice()[r.clone()],
                iu,
            );
            elementwise::mult(
                &[q],
                n,
                &mut res.ax.as_mut_slice()[r.clone()],
                &a.ax.as_slice()[r],
                iu,
            );
        }
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    // ---- automorphisms ---------------------------------------------

    /// Applies the slot permutation of `X -> X^g` to both polynomials in
    /// place. Only valid right after the matching key switch.
    fn permute_inplace(&self, ct: &mut Ciphertext<W>, galois_factor: usize) {
        assert!(!ct.has_rx());
        let n = self.param.degree();
        let num = ct.np().num_total();
        let perm = elementwise::make_permutation(self.param.log_degree(), galois_factor);
        let tmp = ct.bx.to_host();
        elementwise::permute::<W>(num, n, ct.bx.as_mut_slice(), &tmp, &perm);
        let tmp = ct.ax.to_host();
        elementwise::permute::<W>(num, n, ct.ax.as_mut_slice(), &tmp, &perm);
    }

    pub fn permute(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, rot_dist: usize) {
        self.copy(res, a);
        self.permute_inplace(res, self.param.galois_factor(rot_dist));
    }

    pub fn permute_conjugate(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>) {
        self.copy(res, a);
        self.permute_inplace(res, self.param.conjugation_factor());
    }

    // ---- key switching ---------------------------------------------

    fn evk_index_at(&self, level: i32) -> &[usize] {
        &self.evk_index[level as usize]
    }

    /// Gadget-decomposes one evaluation-domain polynomial of the level's
    /// Q basis into raised digits.
    pub fn mod_up_poly(&self, level: i32, poly: &[W]) -> Vec<DeviceVec<W>> {
        let mut digits = Vec::new();
        self.mod_switch(level).mod_up(&self.ntt, &mut digits, poly);
        digits
    }

    /// Inner products of raised digits with the key, accumulated into
    /// raised-basis polynomials.
    pub fn key_mult_digits(
        &self,
        level: i32,
        digits: &[DeviceVec<W>],
        evk: &EvaluationKey<W>,
        acc_b: &mut [W],
        acc_a: &mut [W],
    ) {
        assert_eq!(evk.np(), self.evk_np, "key basis mismatch");
        let ms = self.mod_switch(level);
        assert!(evk.beta() >= ms.beta(), "key has too few digits");
        let kidx = self.evk_index_at(level);
        let n = self.param.degree();
        for (j, digit) in digits.iter().enumerate().take(ms.beta()) {
            let dj = digit.as_slice();
            let kb = evk.bx[j].as_slice();
            let ka = evk.ax[j].as_slice();
            for (pos, &q) in ms.qp_primes().iter().enumerate() {
                let kpos = kidx[pos];
                let d = &dj[pos * n..(pos + 1) * n];
                elementwise::mult_accum(
                    &[q],
                    n,
                    &mut acc_b[pos * n..(pos + 1) * n],
                    d,
                    &kb[kpos * n..(kpos + 1) * n],
                );
                elementwise::mult_accum(
                    &[q],
                    n,
                    &mut acc_a[pos * n..(pos + 1) * n],
                    d,
                    &ka[kpos * n..(kpos + 1) * n],
                );
            }
        }
    }

    /// Switches the `ax` part of `a` under `evk`; `bx` passes through.
    pub fn mult_key(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, evk: &EvaluationKey<W>) {
        assert!(!a.has_rx());
        let level = self.level_of(a);
        let ms = self.mod_switch(level);
        let n = self.param.degree();

        let digits = self.mod_up_poly(level, a.ax.as_slice());
        let mut acc_b = vec![W::default(); ms.num_qp() * n];
        let mut acc_a = vec![W::default(); ms.num_qp() * n];
        self.key_mult_digits(level, &digits, evk, &mut acc_b, &mut acc_a);

        res.adjust(&self.param, a.np());
        ms.mod_down(&self.ntt, res.bx.as_mut_slice(), &acc_b);
        ms.mod_down(&self.ntt, res.ax.as_mut_slice(), &acc_a);
        let primes = self.param.prime_vector(a.np());
        elementwise::add_assign(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    /// Folds the degree-two part back into a two-polynomial ciphertext.
    pub fn relinearize(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, evk: &EvaluationKey<W>) {
        assert!(a.has_rx(), "nothing to relinearize");
        let level = self.level_of(a);
        let ms = self.mod_switch(level);
        let n = self.param.degree();

        let digits = self.mod_up_poly(level, a.rx.as_slice());
        let mut acc_b = vec![W::default(); ms.num_qp() * n];
        let mut acc_a = vec![W::default(); ms.num_qp() * n];
        self.key_mult_digits(level, &digits, evk, &mut acc_b, &mut acc_a);

        res.adjust(&self.param, a.np());
        ms.mod_down(&self.ntt, res.bx.as_mut_slice(), &acc_b);
        ms.mod_down(&self.ntt, res.ax.as_mut_slice(), &acc_a);
        let primes = self.param.prime_vector(a.np());
        elementwise::add_assign(&primes, n, res.bx.as_mut_slice(), a.bx.as_slice());
        elementwise::add_assign(&primes, n, res.ax.as_mut_slice(), a.ax.as_slice());
        res.set_scale(a.scale());
        res.set_num_slots(a.num_slots());
    }

    /// Relinearize and rescale in one basis conversion. The two-poly
    /// parts enter the raised accumulator through `pseudo_mod_up`, so
    /// the fused conversion sees the same value the unfused path would.
    pub fn relinearize_rescale(
        &self,
        res: &mut Ciphertext<W>,
        a: &Ciphertext<W>,
        evk: &EvaluationKey<W>,
    ) {
        assert!(a.has_rx(), "nothing to relinearize");
        let level = self.level_of(a);
        assert!(level > 0, "cannot rescale below level 0");
        let ms = self.mod_switch(level);
        let n = self.param.degree();

        let digits = self.mod_up_poly(level, a.rx.as_slice());
        let mut acc_b = vec![W::default(); ms.num_qp() * n];
        let mut acc_a = vec![W::default(); ms.num_qp() * n];
        self.key_mult_digits(level, &digits, evk, &mut acc_b, &mut acc_a);

        let mut raised = vec![W::default(); ms.num_qp() * n];
        ms.pseudo_mod_up(&mut raised, a.bx.as_slice());
        elementwise::add_assign(ms.qp_primes(), n, &mut acc_b, &raised);
        ms.pseudo_mod_up(&mut raised, a.ax.as_slice());
        elementwise::add_assign(ms.qp_primes(), n, &mut acc_a, &raised);

        res.adjust(&self.param, self.param.level_to_np(level - 1, 0));
        ms.mod_down_rescale(&self.ntt, res.bx.as_mut_slice(), &acc_b);
        ms.mod_down_rescale(&self.ntt, res.ax.as_mut_slice(), &acc_a);
        res.set_scale(a.scale() / self.param.rescale_prime_prod(level));
        res.set_num_slots(a.num_slots());
    }

    pub fn rescale(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>) {
        assert!(!a.has_rx());
        let level = self.level_of(a);
        assert!(level > 0, "cannot rescale below level 0");
        let ms = self.mod_switch(level);
        res.adjust(&self.param, self.param.level_to_np(level - 1, 0));
        ms.rescale(&self.ntt, res.bx.as_mut_slice(), a.bx.as_slice());
        ms.rescale(&self.ntt, res.ax.as_mut_slice(), a.ax.as_slice());
        res.set_scale(a.scale() / self.param.rescale_prime_prod(level));
        res.set_num_slots(a.num_slots());
    }

    pub fn hmult(
        &self,
        res: &mut Ciphertext<W>,
        a: &Ciphertext<W>,
        b: &Ciphertext<W>,
        evk: &EvaluationKey<W>,
    ) {
        let mut t = Ciphertext::empty();
        self.mult(&mut t, a, b);
        self.relinearize(res, &t, evk);
    }

    pub fn hmult_rescale(
        &self,
        res: &mut Ciphertext<W>,
        a: &Ciphertext<W>,
        b: &Ciphertext<W>,
        evk: &EvaluationKey<W>,
    ) {
        let mut t = Ciphertext::empty();
        self.mult(&mut t, a, b);
        self.relinearize_rescale(res, &t, evk);
    }

    pub fn hrot(
        &self,
        res: &mut Ciphertext<W>,
        a: &Ciphertext<W>,
        evk: &EvaluationKey<W>,
        rot_dist: usize,
    ) {
        if rot_dist % self.param.num_slots_max() == 0 {
            self.copy(res, a);
            return;
        }
        self.mult_key(res, a, evk);
        self.permute_inplace(res, self.param.galois_factor(rot_dist));
    }

    pub fn hconj(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, evk: &EvaluationKey<W>) {
        self.mult_key(res, a, evk);
        self.permute_inplace(res, self.param.conjugation_factor());
    }

    pub fn hrot_add(
        &self,
        res: &mut Ciphertext<W>,
        a: &Ciphertext<W>,
        b: &Ciphertext<W>,
        evk: &EvaluationKey<W>,
        rot_dist: usize,
    ) {
        self.hrot(res, a, evk, rot_dist);
        self.add_assign(res, b);
    }

    pub fn hconj_add(
        &self,
        res: &mut Ciphertext<W>,
        a: &Ciphertext<W>,
        b: &Ciphertext<W>,
        evk: &EvaluationKey<W>,
    ) {
        self.hconj(res, a, evk);
        self.add_assign(res, b);
    }

    // ---- level management ------------------------------------------

    /// Drops to `target_level` one rescale at a time through the unit
    /// constants, preserving the encoded value and the scale schedule.
    pub fn level_down(&self, res: &mut Ciphertext<W>, a: &Ciphertext<W>, target_level: i32) {
        let level = self.level_of(a);
        assert!(target_level >= 0 && target_level <= level);
        self.copy(res, a);
        for l in ((target_level + 1)..=level).rev() {
            self.mult_const_assign(res, &self.level_down_consts[l as usize]);
            let mut next = Ciphertext::empty();
            self.rescale(&mut next, res);
            *res = next;
        }
    }

    /// Extends a multi-level ciphertext down to `min_level`.
    pub fn add_lower_levels_until(&self, mlct: &mut MultiLevelCiphertext<W>, min_level: i32) {
        assert!(min_level >= 0);
        while mlct.min_level() > min_level {
            let l = mlct.min_level() - 1;
            let next = {
                let prev = mlct.at_level(l + 1);
                let mut t = Ciphertext::empty();
                self.level_down(&mut t, prev, l);
                t
            };
            mlct.insert(l, next);
        }
    }
}
