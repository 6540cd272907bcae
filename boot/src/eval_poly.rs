//! Chebyshev-basis polynomial evaluation compiled into a
//! multiply-and-recurse tree. A polynomial of degree `d` splits as
//! `p = q * T_m + r` at the largest power of two `m <= d`; leaves below
//! the threshold evaluate as linear combinations of precomputed basis
//! ciphertexts. Consumed levels are fixed by the compiled shape, so the
//! required depth is known before any ciphertext exists.

use std::collections::{BTreeMap, BTreeSet};

use ckks::{Ciphertext, Constant, Context, EvkMap, LeveledValue, MultiLevelCiphertext};
use rns::Word;

const ZERO_COEFF_THRESHOLD: f64 = 1e-9;

enum Node {
    /// Chebyshev coefficients `c_0..c_{d}`, `d < threshold`.
    Leaf(Vec<f64>),
    /// `q * T_m + r`
    Mul {
        m: usize,
        q: Box<Node>,
        r: Box<Node>,
    },
}

pub struct EvalPoly {
    coeffs: Vec<f64>,
    tree: Node,
    basis_indices: BTreeSet<usize>,
    // levels below the input at which each basis element appears
    basis_depth: BTreeMap<usize, usize>,
    depth: usize,
}

/// Levels consumed by a degree-`degree` evaluation with the given leaf
/// threshold.
pub fn eval_poly_depth(degree: usize, threshold: usize) -> usize {
    EvalPoly::compile(&vec![1.0; degree + 1], threshold).depth()
}

impl EvalPoly {
    pub fn compile(coeffs: &[f64], threshold: usize) -> Self {
        assert!(threshold >= 2 && threshold.is_power_of_two());
        let mut trimmed = coeffs.to_vec();
        while trimmed.len() > 1
            && trimmed.last().map_or(false, |c| c.abs() < ZERO_COEFF_THRESHOLD)
        {
            trimmed.pop();
        }

        let mut basis_indices = BTreeSet::new();
        let tree = build(trimmed.clone(), threshold, &mut basis_indices);
        let basis_depth = basis_closure(&basis_indices);
        let depth = node_depth(&tree, &basis_depth);
        Self {
            coeffs: trimmed,
            tree,
            basis_indices,
            basis_depth,
            depth,
        }
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Reference evaluation through the three-term recurrence.
    pub fn plain_evaluate(&self, x: f64) -> f64 {
        let mut acc = self.coeffs[0];
        let mut t_prev = 1.0;
        let mut t_cur = x;
        for &c in &self.coeffs[1..] {
            acc += c * t_cur;
            let t_next = 2.0 * x * t_cur - t_prev;
            t_prev = t_cur;
            t_cur = t_next;
        }
        acc
    }

    /// Evaluates at a ciphertext holding the Chebyshev argument, on the
    /// scale schedule. Consumes `depth()` levels.
    pub fn evaluate<W: Word>(
        &self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        x: &Ciphertext<W>,
    ) -> Ciphertext<W> {
        let l_in = ctx.level_of(x);
        ctx.assert_same_scale(x.scale(), ctx.param().scale(l_in));
        let target = l_in - self.depth as i32;
        assert!(
            target >= 0,
            "degree {} evaluation needs {} levels, input has {}",
            self.degree(),
            self.depth,
            l_in
        );
        let mut basis = BasisMap::build(ctx, evk_map, x, &self.basis_indices, &self.basis_depth);
        eval_node(ctx, evk_map, &mut basis, &self.tree, target)
    }
}

fn build(coeffs: Vec<f64>, threshold: usize, indices: &mut BTreeSet<usize>) -> Node {
    let d = coeffs.len() - 1;
    if d < threshold {
        for (k, c) in coeffs.iter().enumerate().skip(1) {
            if c.abs() >= ZERO_COEFF_THRESHOLD {
                indices.insert(k);
            }
        }
        return Node::Leaf(coeffs);
    }

    // Largest power of two not above the degree; the quotient degree
    // d - m stays below m.
    let m = 1usize << (usize::BITS - 1 - d.leading_zeros());
    indices.insert(m);

    // T_{m+j} = 2 T_m T_j - T_{m-j}
    let mut q = Vec::with_capacity(d - m + 1);
    q.push(coeffs[m]);
    for j in 1..=d - m {
        q.push(2.0 * coeffs[m + j]);
    }
    let mut r = coeffs[..m].to_vec();
    for j in 1..=d - m {
        r[m - j] -= coeffs[m + j];
    }
    Node::Mul {
        m,
        q: Box::new(build(q, threshold, indices)),
        r: Box::new(build(r, threshold, indices)),
    }
}

fn basis_closure(indices: &BTreeSet<usize>) -> BTreeMap<usize, usize> {
    let mut depth = BTreeMap::new();
    depth.insert(1, 0);
    for &idx in indices {
        ensure_depth(idx, &mut depth);
    }
    depth
}

fn ensure_depth(idx: usize, depth: &mut BTreeMap<usize, usize>) -> usize {
    if let Some(&d) = depth.get(&idx) {
        return d;
    }
    let d = if idx % 2 == 0 {
        ensure_depth(idx / 2, depth) + 1
    } else {
        let a = ensure_depth(idx / 2 + 1, depth);
        let b = ensure_depth(idx / 2, depth);
        a.max(b) + 1
    };
    depth.insert(idx, d);
    d
}

fn node_depth(node: &Node, basis_depth: &BTreeMap<usize, usize>) -> usize {
    match node {
        Node::Leaf(coeffs) => {
            let used = coeffs
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, c)| c.abs() >= ZERO_COEFF_THRESHOLD)
                .map(|(k, _)| basis_depth[&k])
                .max();
            match used {
                Some(d) => d + 1,
                None => 0,
            }
        }
        Node::Mul { m, q, r } => {
            let dq = node_depth(q, basis_depth) + 1;
            let dr = node_depth(r, basis_depth);
            let dm = basis_depth[m] + 1;
            dq.max(dr).max(dm)
        }
    }
}

/// Chebyshev basis ciphertexts, each held at every level a consumer has
/// asked for.
struct BasisMap<W: Word> {
    cts: BTreeMap<usize, MultiLevelCiphertext<W>>,
    num_slots: usize,
}

impl<W: Word> BasisMap<W> {
    fn build(
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        x: &Ciphertext<W>,
        indices: &BTreeSet<usize>,
        basis_depth: &BTreeMap<usize, usize>,
    ) -> Self {
        let mut map = Self {
            cts: BTreeMap::new(),
            num_slots: x.num_slots(),
        };
        let l_in = ctx.level_of(x);
        let mut x1 = Ciphertext::empty();
        ctx.copy(&mut x1, x);
        map.cts.insert(1, MultiLevelCiphertext::new(l_in, x1));
        for &idx in indices {
            map.ensure(ctx, evk_map, idx, basis_depth, l_in);
        }
        map
    }

    fn ensure(
        &mut self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        idx: usize,
        basis_depth: &BTreeMap<usize, usize>,
        l_in: i32,
    ) {
        if self.cts.contains_key(&idx) {
            return;
        }
        let natural = |i: usize| l_in - basis_depth[&i] as i32;
        let ct = if idx % 2 == 0 {
            let half = idx / 2;
            self.ensure(ctx, evk_map, half, basis_depth, l_in);
            let xa = self.owned(ctx, half, natural(half));
            double_angle_step(ctx, evk_map, &xa, &xa, Some(1.0))
        } else {
            let a = idx / 2 + 1;
            let b = idx / 2;
            self.ensure(ctx, evk_map, a, basis_depth, l_in);
            self.ensure(ctx, evk_map, b, basis_depth, l_in);
            let level = natural(a).min(natural(b));
            let xa = self.owned(ctx, a, level);
            let xb = self.owned(ctx, b, level);
            // 2 T_a T_b - T_{a-b}, and a - b = 1 here
            let t = double_angle_step(ctx, evk_map, &xa, &xb, None);
            let x1 = self.owned(ctx, 1, ctx.level_of(&t));
            let mut res = Ciphertext::empty();
            ctx.sub(&mut res, &t, &x1);
            res
        };
        let level = ctx.level_of(&ct);
        debug_assert_eq!(level, natural(idx));
        self.cts.insert(idx, MultiLevelCiphertext::new(level, ct));
    }

    fn at(&mut self, ctx: &Context<W>, idx: usize, level: i32) -> &Ciphertext<W> {
        let mlct = self
            .cts
            .get_mut(&idx)
            .unwrap_or_else(|| panic!("basis element {} was never built", idx));
        assert!(
            mlct.max_level() >= level,
            "basis element {} starts below level {}",
            idx,
            level
        );
        ctx.add_lower_levels_until(mlct, level);
        mlct.at_level(level)
    }

    fn owned(&mut self, ctx: &Context<W>, idx: usize, level: i32) -> Ciphertext<W> {
        let mut out = Ciphertext::empty();
        ctx.copy(&mut out, self.at(ctx, idx, level));
        out
    }
}

/// `2 a b` rescaled one level down, minus `sub` when given (the constant
/// for the power-of-two doubling identity `T_{2k} = 2 T_k^2 - 1`).
pub(crate) fn double_angle_step<W: Word>(
    ctx: &Context<W>,
    evk_map: &EvkMap<W>,
    a: &Ciphertext<W>,
    b: &Ciphertext<W>,
    sub: Option<f64>,
) -> Ciphertext<W> {
    let mut prod = Ciphertext::empty();
    ctx.mult(&mut prod, a, b);
    let mut low = Ciphertext::empty();
    ctx.relinearize_rescale(&mut low, &prod, evk_map.multiplication_key());
    let mut dbl = Ciphertext::empty();
    ctx.add(&mut dbl, &low, &low);
    match sub {
        Some(v) => {
            let mut c = Constant::empty();
            ctx.encode_constant(&mut c, ctx.level_of(&dbl), dbl.scale(), v);
            let mut res = Ciphertext::empty();
            ctx.sub_const(&mut res, &dbl, &c);
            res
        }
        None => dbl,
    }
}

fn eval_node<W: Word>(
    ctx: &Context<W>,
    evk_map: &EvkMap<W>,
    basis: &mut BasisMap<W>,
    node: &Node,
    target: i32,
) -> Ciphertext<W> {
    match node {
        Node::Leaf(coeffs) => {
            let mut res = Ciphertext::empty();
            let mut started = false;
            let scale_hi = ctx.param().scale(target + 1);
            for (k, &ck) in coeffs.iter().enumerate().skip(1) {
                if ck.abs() < ZERO_COEFF_THRESHOLD {
                    continue;
                }
                let mut c = Constant::empty();
                ctx.encode_constant(&mut c, target + 1, scale_hi, ck);
                if !started {
                    let tk = basis.at(ctx, k, target + 1);
                    ctx.mult_const(&mut res, tk, &c);
                    started = true;
                } else {
                    let tk = basis.at(ctx, k, target + 1);
                    ctx.mad_const(&mut res, tk, &c);
                }
            }
            let c0 = coeffs[0];
            if started {
                let mut low = Ciphertext::empty();
                ctx.rescale(&mut low, &res);
                res = low;
            } else {
                // Constant polynomial: a transparent zero at the target.
                res.adjust(ctx.param(), ctx.param().level_to_np(target, 0));
                res.bx.zero();
                res.ax.zero();
                res.set_scale(ctx.param().scale(target));
                res.set_num_slots(basis.num_slots);
            }
            if c0.abs() >= ZERO_COEFF_THRESHOLD {
                let mut c = Constant::empty();
                ctx.encode_constant(&mut c, target, res.scale(), c0);
                let mut shifted = Ciphertext::empty();
                ctx.add_const(&mut shifted, &res, &c);
                res = shifted;
            }
            res
        }
        Node::Mul { m, q, r } => {
            let qc = eval_node(ctx, evk_map, basis, q, target + 1);
            let mut prod = Ciphertext::empty();
            {
                let tm = basis.at(ctx, *m, target + 1);
                ctx.mult(&mut prod, &qc, tm);
            }
            let mut res = Ciphertext::empty();
            ctx.relinearize_rescale(&mut res, &prod, evk_map.multiplication_key());
            let rc = eval_node(ctx, evk_map, basis, r, target);
            ctx.add_assign(&mut res, &rc);
            res
        }
    }
}
