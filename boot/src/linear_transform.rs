//! Slot-wise linear maps in baby-step giant-step form. The striped
//! matrix is regrouped as `sum_g rot_g(sum_b rot_{-g}(d_{g+b}) * rot_b(v))`,
//! so the baby rotations share one gadget decomposition and each giant
//! step needs a single key switch on the inner sum.

use std::collections::{BTreeMap, BTreeSet};

use ckks::elementwise;
use ckks::{Ciphertext, Context, EvkMap, EvkRequest, LeveledValue, Plaintext};
use rns::Word;

use crate::hoist::HoistHandler;
use crate::striped_matrix::StripedMatrix;

pub struct LinearTransform<W: Word> {
    level: i32,
    num_slots: usize,
    bs: usize,
    // giant step -> baby step -> diagonal rotated back by the giant step
    pt_map: BTreeMap<usize, BTreeMap<usize, Plaintext<W>>>,
}

impl<W: Word> LinearTransform<W> {
    pub fn new(ctx: &Context<W>, matrix: &StripedMatrix, level: i32) -> Self {
        let n = matrix.dim();
        assert!(n <= ctx.param().num_slots_max());
        assert!(level >= 1, "the evaluation rescales once");

        let mut bs = 1usize;
        while bs * bs < matrix.num_diags() && bs < n {
            bs *= 2;
        }

        let scale = ctx.param().scale(level);
        let mut pt_map: BTreeMap<usize, BTreeMap<usize, Plaintext<W>>> = BTreeMap::new();
        for (k, diag) in matrix.iter() {
            let g = k / bs * bs;
            let b = k % bs;
            let msg: Vec<_> = (0..n).map(|i| diag[(i + n - g) % n]).collect();
            let mut pt = Plaintext::empty();
            ctx.encode(&mut pt, level, scale, &msg);
            pt_map.entry(g).or_default().insert(b, pt);
        }

        Self {
            level,
            num_slots: n,
            bs,
            pt_map,
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Records the rotation keys `evaluate` will ask for.
    pub fn rotations(&self, min_ks: bool, req: &mut EvkRequest) {
        let has_baby = self.pt_map.values().any(|g| g.keys().any(|&b| b > 0));
        let has_giant = self.pt_map.keys().any(|&g| g > 0);
        if min_ks {
            if has_baby {
                req.add_request(1, self.level);
            }
            if has_giant {
                req.add_request(self.bs as i64, self.level);
            }
        } else {
            for group in self.pt_map.values() {
                for &b in group.keys() {
                    if b > 0 {
                        req.add_request(b as i64, self.level);
                    }
                }
            }
            for &g in self.pt_map.keys() {
                if g > 0 {
                    req.add_request(g as i64, self.level);
                }
            }
        }
    }

    /// Applies the map and rescales once. The result's declared scale is
    /// `ct.scale * scale(level) / rescale_prime_prod(level)`.
    pub fn evaluate(
        &self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        ct: &Ciphertext<W>,
        min_ks: bool,
    ) -> Ciphertext<W> {
        assert_eq!(ctx.level_of(ct), self.level);
        assert!(!ct.has_rx());
        if min_ks {
            self.evaluate_min_keys(ctx, evk_map, ct)
        } else {
            self.evaluate_hoisted(ctx, evk_map, ct)
        }
    }

    fn evaluate_hoisted(
        &self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        ct: &Ciphertext<W>,
    ) -> Ciphertext<W> {
        let param = ctx.param();
        let ms = ctx.mod_switch(self.level);
        let n = param.degree();

        let handler = HoistHandler::new(ctx, ct);
        let baby_set: BTreeSet<usize> = self
            .pt_map
            .values()
            .flat_map(|g| g.keys().copied())
            .collect();
        let babies: BTreeMap<usize, Ciphertext<W>> = baby_set
            .into_iter()
            .map(|b| (b, handler.rotate(ctx, evk_map, ct, b)))
            .collect();

        let mut acc_b = vec![W::default(); ms.num_qp() * n];
        let mut acc_a = vec![W::default(); ms.num_qp() * n];
        let mut raised = vec![W::default(); ms.num_qp() * n];

        for (&g, group) in &self.pt_map {
            let mut inner_b = vec![W::default(); ms.num_q() * n];
            let mut inner_a = vec![W::default(); ms.num_q() * n];
            for (b, pt) in group {
                let rot = &babies[b];
                elementwise::mult_accum(
                    ms.q_primes(),
                    n,
                    &mut inner_b,
                    rot.bx.as_slice(),
                    pt.mx.as_slice(),
                );
                elementwise::mult_accum(
                    ms.q_primes(),
                    n,
                    &mut inner_a,
                    rot.ax.as_slice(),
                    pt.mx.as_slice(),
                );
            }

            if g == 0 {
                ms.pseudo_mod_up(&mut raised, &inner_b);
                elementwise::add_assign(ms.qp_primes(), n, &mut acc_b, &raised);
                ms.pseudo_mod_up(&mut raised, &inner_a);
                elementwise::add_assign(ms.qp_primes(), n, &mut acc_a, &raised);
            } else {
                let digits = ctx.mod_up_poly(self.level, &inner_a);
                let mut sw_b = vec![W::default(); ms.num_qp() * n];
                let mut sw_a = vec![W::default(); ms.num_qp() * n];
                ctx.key_mult_digits(
                    self.level,
                    &digits,
                    evk_map.rotation_key(g as i64),
                    &mut sw_b,
                    &mut sw_a,
                );
                ms.pseudo_mod_up(&mut raised, &inner_b);
                elementwise::add_assign(ms.qp_primes(), n, &mut sw_b, &raised);
                let perm =
                    elementwise::make_permutation(param.log_degree(), param.galois_factor(g));
                elementwise::permute_accum(ms.qp_primes(), n, &mut acc_b, &sw_b, &perm);
                elementwise::permute_accum(ms.qp_primes(), n, &mut acc_a, &sw_a, &perm);
            }
        }

        let mut res = Ciphertext::empty();
        res.adjust(param, param.level_to_np(self.level - 1, 0));
        ms.mod_down_rescale(ctx.ntt(), res.bx.as_mut_slice(), &acc_b);
        ms.mod_down_rescale(ctx.ntt(), res.ax.as_mut_slice(), &acc_a);
        res.set_scale(ct.scale() * param.scale(self.level) / param.rescale_prime_prod(self.level));
        res.set_num_slots(self.num_slots.max(ct.num_slots()));
        res
    }

    /// Two-key variant: baby steps chain the unit rotation, giant steps
    /// fold through repeated `bs` rotations in Horner order.
    fn evaluate_min_keys(
        &self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        ct: &Ciphertext<W>,
    ) -> Ciphertext<W> {
        let param = ctx.param();
        let max_baby = self
            .pt_map
            .values()
            .flat_map(|g| g.keys().copied())
            .max()
            .unwrap_or(0);

        let mut babies: Vec<Ciphertext<W>> = Vec::with_capacity(max_baby + 1);
        let mut first = Ciphertext::empty();
        ctx.copy(&mut first, ct);
        babies.push(first);
        for b in 1..=max_baby {
            let mut next = Ciphertext::empty();
            ctx.hrot(&mut next, &babies[b - 1], evk_map.rotation_key(1), 1);
            babies.push(next);
        }

        let inner = |group: &BTreeMap<usize, Plaintext<W>>| -> Ciphertext<W> {
            let mut acc = Ciphertext::empty();
            let mut started = false;
            for (b, pt) in group {
                if !started {
                    ctx.mult_pt(&mut acc, &babies[*b], pt);
                    started = true;
                } else {
                    ctx.mad_pt(&mut acc, &babies[*b], pt);
                }
            }
            acc
        };

        let mut giants: Vec<usize> = self.pt_map.keys().copied().collect();
        giants.reverse();
        let mut cur_g = giants[0];
        let mut acc = inner(&self.pt_map[&cur_g]);
        for &g in &giants[1..] {
            while cur_g > g {
                let mut rotated = Ciphertext::empty();
                ctx.hrot(&mut rotated, &acc, evk_map.rotation_key(self.bs as i64), self.bs);
                acc = rotated;
                cur_g -= self.bs;
            }
            ctx.add_assign(&mut acc, &inner(&self.pt_map[&g]));
        }
        while cur_g > 0 {
            let mut rotated = Ciphertext::empty();
            ctx.hrot(&mut rotated, &acc, evk_map.rotation_key(self.bs as i64), self.bs);
            acc = rotated;
            cur_g -= self.bs;
        }

        let mut res = Ciphertext::empty();
        ctx.rescale(&mut res, &acc);
        res.set_num_slots(self.num_slots.max(ct.num_slots()));
        // same declared scale as the hoisted path
        ctx.assert_same_scale(
            res.scale(),
            ct.scale() * param.scale(self.level) / param.rescale_prime_prod(self.level),
        );
        res
    }
}
