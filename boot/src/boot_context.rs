//! The bootstrapping pipeline: drop to the base level, raise the
//! modulus, move coefficients into the slots, reduce modulo the base
//! prime product with the sine approximation, and move the slots back.
//! Plans are prepared per slot count; rotation, conjugation and
//! multiplication keys are requested up front and owned by the caller.

use std::collections::BTreeMap;

use ckks::modswitch::ExactLift;
use ckks::{Ciphertext, Constant, Context, EvkMap, EvkRequest, LeveledValue, Parameter};
use rns::Word;

use crate::boot_parameter::BootParameter;
use crate::eval_mod::EvalMod;
use crate::linear_transform::LinearTransform;
use crate::special_fft::{coeff_to_slot_matrices, slot_to_coeff_matrices};

pub struct BootContext<W: Word> {
    ctx: Context<W>,
    bp: BootParameter,
    eval_mod: EvalMod,
    scale_up: f64,
    // product of the base-level primes
    q0: f64,
    exact_lift: ExactLift<W>,
    cts: BTreeMap<usize, Vec<LinearTransform<W>>>,
    stc: BTreeMap<usize, Vec<LinearTransform<W>>>,
    min_ks: bool,
}

impl<W: Word> BootContext<W> {
    pub fn new(param: Parameter<W>, bp: BootParameter) -> Self {
        let ctx = Context::new(param);
        let param = ctx.param();
        assert!(
            param.max_level() >= bp.total_depth() as i32 + 1,
            "parameter set too shallow for bootstrapping"
        );

        let base_primes = param.prime_vector(param.level_to_np(0, 0));
        let top_primes = param.prime_vector(param.level_to_np(param.max_level(), 0));
        let q0: f64 = base_primes.iter().map(|q| q.to_u64() as f64).product();
        let exact_lift = ExactLift::new(&base_primes, &top_primes);

        // Messages sit 2^lmr below q0. The scaled signal reaching the
        // modular reduction is m * base_scale / q0; if q0 runs far past
        // base_scale * 2^lmr that signal drops below the reduction's
        // approximation noise and the output is pure noise.
        let scale_up = (q0 / (param.base_scale() * 2f64.powi(bp.log_message_ratio() as i32)))
            .round();
        assert!(scale_up >= 1.0, "base level too small for the message ratio");
        assert!(
            scale_up <= 2.0,
            "base prime product {:e} exceeds base_scale * 2^log_message_ratio",
            q0
        );
        let eval_mod = EvalMod::new(&bp, param.base_scale(), scale_up);

        Self {
            ctx,
            bp,
            eval_mod,
            scale_up,
            q0,
            exact_lift,
            cts: BTreeMap::new(),
            stc: BTreeMap::new(),
            min_ks: false,
        }
    }

    pub fn ctx(&self) -> &Context<W> {
        &self.ctx
    }

    pub fn boot_parameter(&self) -> &BootParameter {
        &self.bp
    }

    pub fn scale_up(&self) -> f64 {
        self.scale_up
    }

    /// Restricts linear transforms to the two-key rotation set.
    pub fn set_min_ks(&mut self, min_ks: bool) {
        self.min_ks = min_ks;
    }

    /// Builds the encoding-switch plans for one slot count. The
    /// coefficient-to-slot side carries the conjugate-split half and the
    /// sparse-gap compensation.
    pub fn prepare_special_fft(&mut self, num_slots: usize) {
        let param = self.ctx.param();
        let top = param.max_level();
        let mut factor = 0.5;
        if num_slots < param.num_slots_max() {
            factor *= 2.0 * num_slots as f64 / param.degree() as f64;
        }

        let m_cts = coeff_to_slot_matrices(
            self.ctx.encoder(),
            num_slots,
            self.bp.num_cts_phases(),
            factor,
        );
        let m_stc =
            slot_to_coeff_matrices(self.ctx.encoder(), num_slots, self.bp.num_stc_phases());

        let cts_plans: Vec<LinearTransform<W>> = m_cts
            .iter()
            .enumerate()
            .map(|(i, m)| LinearTransform::new(&self.ctx, m, top - i as i32))
            .collect();
        let stc_top = top - self.bp.num_cts_phases() as i32 - self.eval_mod.depth() as i32;
        let stc_plans: Vec<LinearTransform<W>> = m_stc
            .iter()
            .enumerate()
            .map(|(i, m)| LinearTransform::new(&self.ctx, m, stc_top - i as i32))
            .collect();

        self.cts.insert(num_slots, cts_plans);
        self.stc.insert(num_slots, stc_plans);
    }

    /// Rotation distances `boot` will use for this slot count. The
    /// multiplication and conjugation keys (and the sparse-secret pair
    /// when enabled) are requested separately by the key owner.
    pub fn add_required_rotations(&self, num_slots: usize, req: &mut EvkRequest) {
        let cts = self.plans(&self.cts, num_slots);
        let stc = self.plans(&self.stc, num_slots);
        for plan in cts.iter().chain(stc.iter()) {
            plan.rotations(self.min_ks, req);
        }
        let param = self.ctx.param();
        let mut dist = num_slots;
        while dist < param.num_slots_max() {
            req.add_request(dist as i64, param.max_level());
            dist *= 2;
        }
    }

    fn plans<'a>(
        &self,
        map: &'a BTreeMap<usize, Vec<LinearTransform<W>>>,
        num_slots: usize,
    ) -> &'a [LinearTransform<W>] {
        map.get(&num_slots).unwrap_or_else(|| {
            panic!("bootstrapping for {} slots was never prepared", num_slots)
        })
    }

    /// Lifts a base-level ciphertext into the full basis, preserving the
    /// centered coefficient values.
    pub fn mod_up_to_max(&self, ct: &Ciphertext<W>) -> Ciphertext<W> {
        let param = self.ctx.param();
        assert_eq!(self.ctx.level_of(ct), 0);
        assert!(!ct.has_rx());
        let n = param.degree();
        let src_primes = param.prime_vector(param.level_to_np(0, 0));
        let top_np = param.level_to_np(param.max_level(), 0);
        let dst_primes = param.prime_vector(top_np);

        let mut res = Ciphertext::empty();
        res.adjust(param, top_np);
        let mut coeffs = vec![W::default(); src_primes.len() * n];
        let mut lifted = vec![W::default(); dst_primes.len() * n];
        for (src, dst) in [(&ct.bx, &mut res.bx), (&ct.ax, &mut res.ax)] {
            self.ctx.ntt().inverse(&src_primes, &mut coeffs, src.as_slice());
            self.exact_lift.lift(n, &mut lifted, &coeffs);
            dst.copy_from_host(&lifted);
            self.ctx.ntt().forward_inplace(&dst_primes, dst.as_mut_slice());
        }
        res.set_scale(ct.scale());
        res.set_num_slots(ct.num_slots());
        res
    }

    /// Refreshes `ct` to the highest level the pipeline leaves intact.
    /// Slot magnitudes must stay within the prepared message ratio.
    pub fn boot(&self, evk_map: &EvkMap<W>, res: &mut Ciphertext<W>, ct: &Ciphertext<W>) {
        let param = self.ctx.param();
        let num_slots = ct.num_slots();
        let cts_plans = self.plans(&self.cts, num_slots);
        let stc_plans = self.plans(&self.stc, num_slots);

        let mut base = Ciphertext::empty();
        if self.ctx.level_of(ct) > 0 {
            self.ctx.level_down(&mut base, ct, 0);
        } else {
            self.ctx.copy(&mut base, ct);
        }
        self.ctx.assert_same_scale(base.scale(), param.base_scale());

        // The raise decrypts under whichever secret the base ciphertext
        // used; switching to the sparse secret first keeps the lifted
        // integer part small.
        if param.use_sse() {
            let mut t = Ciphertext::empty();
            self.ctx.mult_key(&mut t, &base, evk_map.dense_to_sparse_key());
            base = t;
        }
        let mut raised = self.mod_up_to_max(&base);
        if param.use_sse() {
            let mut t = Ciphertext::empty();
            self.ctx.mult_key(&mut t, &raised, evk_map.sparse_to_dense_key());
            raised = t;
        }

        let mut c = Constant::empty();
        self.ctx
            .encode_constant(&mut c, param.max_level(), 1.0, self.scale_up);
        self.ctx.mult_const_assign(&mut raised, &c);

        // Fold the replicated sparse gaps on top of each other.
        let mut dist = num_slots;
        while dist < param.num_slots_max() {
            let mut t = Ciphertext::empty();
            self.ctx
                .hrot_add(&mut t, &raised, &raised, evk_map.rotation_key(dist as i64), dist);
            raised = t;
            dist *= 2;
        }

        let mut acc = raised;
        for plan in cts_plans {
            acc = plan.evaluate(&self.ctx, evk_map, &acc, self.min_ks);
        }
        let s = acc.scale();
        acc.set_scale(s * self.q0);

        // Split into two real-slot ciphertexts, reduce, recombine.
        let mut conj = Ciphertext::empty();
        self.ctx.hconj(&mut conj, &acc, evk_map.conjugation_key());
        let mut y1 = Ciphertext::empty();
        self.ctx.add(&mut y1, &acc, &conj);
        let mut diff = Ciphertext::empty();
        self.ctx.sub(&mut diff, &conj, &acc);
        let mut y2 = Ciphertext::empty();
        self.ctx.mult_imaginary_unit(&mut y2, &diff);

        let r1 = self.eval_mod.apply(&self.ctx, evk_map, &y1);
        let r2 = self.eval_mod.apply(&self.ctx, evk_map, &y2);
        let mut r2i = Ciphertext::empty();
        self.ctx.mult_imaginary_unit(&mut r2i, &r2);
        let mut slots = Ciphertext::empty();
        self.ctx.add(&mut slots, &r1, &r2i);
        let s = slots.scale();
        slots.set_scale(s / self.q0);

        let mut acc = slots;
        for plan in stc_plans {
            acc = plan.evaluate(&self.ctx, evk_map, &acc, self.min_ks);
        }
        let s = acc.scale();
        acc.set_scale(s * param.base_scale());
        self.ctx.copy(res, &acc);
    }
}
