//! Rotations sharing one gadget decomposition. Raising the digits of
//! `ax` is the dominant cost of a key switch; a handler decomposes it
//! once and every rotation distance reuses the digits.

use backend::DeviceVec;
use ckks::elementwise;
use ckks::{Ciphertext, Context, EvkMap, LeveledValue};
use rns::Word;

pub struct HoistHandler<W: Word> {
    level: i32,
    digits: Vec<DeviceVec<W>>,
}

impl<W: Word> HoistHandler<W> {
    pub fn new(ctx: &Context<W>, ct: &Ciphertext<W>) -> Self {
        assert!(!ct.has_rx());
        let level = ctx.level_of(ct);
        Self {
            level,
            digits: ctx.mod_up_poly(level, ct.ax.as_slice()),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn digits(&self) -> &[DeviceVec<W>] {
        &self.digits
    }

    /// Key switch from the precomputed digits followed by the slot
    /// permutation. `src` must be the ciphertext the digits came from.
    pub fn rotate(
        &self,
        ctx: &Context<W>,
        evk_map: &EvkMap<W>,
        src: &Ciphertext<W>,
        rot_dist: usize,
    ) -> Ciphertext<W> {
        let mut res = Ciphertext::empty();
        if rot_dist % ctx.param().num_slots_max() == 0 {
            ctx.copy(&mut res, src);
            return res;
        }
        assert_eq!(ctx.level_of(src), self.level);
        let ms = ctx.mod_switch(self.level);
        let n = ctx.param().degree();

        let mut acc_b = vec![W::default(); ms.num_qp() * n];
        let mut acc_a = vec![W::default(); ms.num_qp() * n];
        ctx.key_mult_digits(
            self.level,
            &self.digits,
            evk_map.rotation_key(rot_dist as i64),
            &mut acc_b,
            &mut acc_a,
        );

        let mut switched = Ciphertext::empty();
        switched.adjust(ctx.param(), src.np());
        ms.mod_down(ctx.ntt(), switched.bx.as_mut_slice(), &acc_b);
        ms.mod_down(ctx.ntt(), switched.ax.as_mut_slice(), &acc_a);
        let primes = ctx.param().prime_vector(src.np());
        elementwise::add_assign(&primes, n, switched.bx.as_mut_slice(), src.bx.as_slice());
        switched.set_scale(src.scale());
        switched.set_num_slots(src.num_slots());

        ctx.permute(&mut res, &switched, rot_dist);
        res
    }
}
