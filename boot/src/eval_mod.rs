//! Homomorphic modular reduction. After the modulus raise the slots hold
//! `(m + q0 I) * S_up / q0` for a small integer `I`; scaling into the
//! interval `[-1, 1]`, evaluating the Chebyshev cosine seed and doubling
//! the angle turns that into `sin(2 pi v) / (2 pi) ~ m S_up / q0`.

use ckks::{Ciphertext, Constant, Context, EvkMap, LeveledValue};
use rns::Word;

use crate::boot_parameter::BootParameter;
use crate::eval_poly::{double_angle_step, EvalPoly};

pub struct EvalMod {
    poly: EvalPoly,
    initial_k: usize,
    double_angle_constants: Vec<f64>,
    base_scale: f64,
    scale_up: f64,
}

impl EvalMod {
    /// `base_scale` is the plaintext scale the bootstrapped ciphertext
    /// returns to, `scale_up` the factor applied before the raise.
    pub fn new(bp: &BootParameter, base_scale: f64, scale_up: f64) -> Self {
        let poly = EvalPoly::compile(bp.chebyshev_coeffs(), bp.poly_threshold());
        let double_angle_constants = (0..bp.num_double_angle())
            .map(|k| bp.double_angle_constant(k))
            .collect();
        Self {
            poly,
            initial_k: bp.initial_k(),
            double_angle_constants,
            base_scale,
            scale_up,
        }
    }

    /// Levels consumed below the input.
    pub fn depth(&self) -> usize {
        1 + self.poly.depth() + self.double_angle_constants.len()
    }

    /// Input slots hold `v * scale_up / base_scale` under the declared
    /// scale; output slots hold `sin(2 pi v) / (2 pi)`.
    pub fn apply<W: Word>(
        &self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        ct: &Ciphertext<W>,
    ) -> Ciphertext<W> {
        let l = ctx.level_of(ct);
        assert!(
            l >= self.depth() as i32,
            "modular reduction needs {} levels, input has {}",
            self.depth(),
            l
        );
        let param = ctx.param();
        let k = self.initial_k as f64;

        // Move onto the Chebyshev interval: x = (v - 1/4) / K. The
        // constant scale is chosen so the rescale lands exactly on the
        // schedule.
        let beta = self.base_scale / (self.scale_up * k);
        let const_scale = param.scale(l - 1) * param.rescale_prime_prod(l) / ct.scale();
        let mut c = Constant::empty();
        ctx.encode_constant(&mut c, l, const_scale, beta);
        let mut scaled = Ciphertext::empty();
        ctx.mult_const(&mut scaled, ct, &c);
        let mut x = Ciphertext::empty();
        ctx.rescale(&mut x, &scaled);

        let mut c4k = Constant::empty();
        ctx.encode_constant(&mut c4k, l - 1, x.scale(), 1.0 / (4.0 * k));
        let mut centered = Ciphertext::empty();
        ctx.sub_const(&mut centered, &x, &c4k);

        let mut g = self.poly.evaluate(ctx, evk_map, &centered);
        for &da in &self.double_angle_constants {
            g = double_angle_step(ctx, evk_map, &g, &g, Some(da));
        }
        g
    }
}
