use std::collections::BTreeSet;

use rns::Word;

use crate::npinfo::NPInfo;

pub const GALOIS_GENERATOR: u64 = 5;

/// Plain-data description of a parameter set. Prime lists are given as
/// `u64` literals regardless of the word width; `Parameter::new` narrows
/// them after validating the width bound.
#[derive(Clone, Debug)]
pub struct ParameterLiteral {
    pub log_degree: u32,
    pub base_scale: f64,
    pub default_encryption_level: i32,
    /// `(num_main, num_ter)` per level; index is the level.
    pub level_config: Vec<(usize, usize)>,
    pub main_primes: Vec<u64>,
    pub ter_primes: Vec<u64>,
    pub aux_primes: Vec<u64>,
    /// Extra `(main, ter)` primes granted to level 0 only.
    pub additional_base: (usize, usize),
    pub dense_hamming_weight: usize,
    pub sparse_hamming_weight: usize,
    pub use_sse: bool,
}

/// Immutable parameter set: ring degree, prime chains, the level
/// configuration, and the derived scale schedule.
///
/// The scale schedule satisfies `scale(l)^2 = scale(l-1) * rpp(l)` where
/// `rpp(l)` is the product of the primes dropped when rescaling from
/// level `l`, so a multiply-then-rescale lands back on the schedule.
pub struct Parameter<W: Word> {
    log_degree: u32,
    degree: usize,
    base_scale: f64,
    default_encryption_level: i32,
    max_level: i32,
    level_config: Vec<(usize, usize)>,
    main_primes: Vec<W>,
    ter_primes: Vec<W>,
    aux_primes: Vec<W>,
    scale: Vec<f64>,
    rescale_prime_prod: Vec<f64>,
    galois_factors: Vec<usize>,
    dense_hamming_weight: usize,
    sparse_hamming_weight: usize,
    use_sse: bool,
}

impl<W: Word> Parameter<W> {
    pub fn new(lit: &ParameterLiteral) -> Self {
        assert!(lit.log_degree >= 2, "ring degree too small");
        assert!(lit.base_scale > 1.0, "base scale must exceed 1");
        assert!(!lit.level_config.is_empty(), "no levels configured");
        assert!(!lit.aux_primes.is_empty(), "at least one auxiliary prime required");

        let narrow = |v: &[u64]| -> Vec<W> {
            v.iter()
                .map(|&q| {
                    assert!(
                        64 - q.leading_zeros() <= W::MAX_PRIME_BITS,
                        "prime {} exceeds the word bound",
                        q
                    );
                    W::from_u64(q)
                })
                .collect()
        };
        let main_primes = narrow(&lit.main_primes);
        let ter_primes = narrow(&lit.ter_primes);
        let aux_primes = narrow(&lit.aux_primes);

        let mut level_config = lit.level_config.clone();
        level_config[0].0 += lit.additional_base.0;
        level_config[0].1 += lit.additional_base.1;

        let max_level = level_config.len() as i32 - 1;
        for &(m, t) in &level_config {
            assert!(m >= 1, "every level needs at least one main prime");
            assert!(m <= main_primes.len() && t <= ter_primes.len());
        }
        {
            let mut seen = BTreeSet::new();
            for &cfg in &level_config {
                assert!(seen.insert(cfg), "duplicate level configuration {:?}", cfg);
            }
        }
        assert!(
            (0..=max_level).contains(&lit.default_encryption_level),
            "default encryption level out of range"
        );

        let degree = 1usize << lit.log_degree;
        let two_n = 2 * degree as u64;
        let mut galois_factors = Vec::with_capacity(degree / 2 + 1);
        let mut g: u64 = 1;
        for _ in 0..=degree / 2 {
            galois_factors.push(g as usize);
            g = g * GALOIS_GENERATOR % two_n;
        }

        let mut param = Self {
            log_degree: lit.log_degree,
            degree,
            base_scale: lit.base_scale,
            default_encryption_level: lit.default_encryption_level,
            max_level,
            level_config,
            main_primes,
            ter_primes,
            aux_primes,
            scale: Vec::new(),
            rescale_prime_prod: Vec::new(),
            galois_factors,
            dense_hamming_weight: lit.dense_hamming_weight,
            sparse_hamming_weight: lit.sparse_hamming_weight,
            use_sse: lit.use_sse,
        };

        // Every level's basis must prefix the top one: rescaling can only
        // drop primes, and the evaluation key's digit groups are laid out
        // over the top basis.
        let top: Vec<W> = param.prime_vector(param.level_to_np(max_level, 0));
        for l in 0..=max_level {
            let q = param.prime_vector(param.level_to_np(l, 0));
            assert!(
                q[..] == top[..q.len()],
                "level {} basis is not a prefix of the top-level basis",
                l
            );
        }

        let mut scale = vec![0.0; (max_level + 1) as usize];
        let mut rpp = vec![1.0; (max_level + 1) as usize];
        scale[0] = lit.base_scale;
        for l in 1..=max_level {
            let cur: BTreeSet<u64> = param
                .prime_vector(param.level_to_np(l, 0))
                .iter()
                .map(|q| q.to_u64())
                .collect();
            let below: BTreeSet<u64> = param
                .prime_vector(param.level_to_np(l - 1, 0))
                .iter()
                .map(|q| q.to_u64())
                .collect();
            let dropped: Vec<u64> = cur.difference(&below).copied().collect();
            assert!(
                !dropped.is_empty(),
                "level {} drops no prime when rescaling",
                l
            );
            let prod: f64 = dropped.iter().map(|&q| q as f64).product();
            rpp[l as usize] = prod;
            scale[l as usize] = (scale[l as usize - 1] * prod).sqrt();
        }
        param.scale = scale;
        param.rescale_prime_prod = rpp;
        param
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn log_degree(&self) -> u32 {
        self.log_degree
    }

    pub fn num_slots_max(&self) -> usize {
        self.degree / 2
    }

    pub fn base_scale(&self) -> f64 {
        self.base_scale
    }

    pub fn max_level(&self) -> i32 {
        self.max_level
    }

    pub fn default_encryption_level(&self) -> i32 {
        self.default_encryption_level
    }

    pub fn alpha(&self) -> usize {
        self.aux_primes.len()
    }

    pub fn dnum(&self) -> usize {
        self.max_num_q().div_ceil(self.alpha())
    }

    pub fn beta(&self, level: i32) -> usize {
        self.num_q(level).div_ceil(self.alpha())
    }

    pub fn num_main(&self, level: i32) -> usize {
        self.level_config[level as usize].0
    }

    pub fn num_ter(&self, level: i32) -> usize {
        self.level_config[level as usize].1
    }

    pub fn num_q(&self, level: i32) -> usize {
        if level < 0 {
            0
        } else {
            let (m, t) = self.level_config[level as usize];
            m + t
        }
    }

    pub fn max_num_main(&self) -> usize {
        self.level_config.iter().map(|c| c.0).max().unwrap_or(0)
    }

    pub fn max_num_ter(&self) -> usize {
        self.level_config.iter().map(|c| c.1).max().unwrap_or(0)
    }

    pub fn max_num_q(&self) -> usize {
        self.num_q(self.max_level)
    }

    /// Basis of the given level plus `num_aux` auxiliary primes. Level -1
    /// is the auxiliary-only basis used while a value lives in the raised
    /// part of a key switch.
    pub fn level_to_np(&self, level: i32, num_aux: usize) -> NPInfo {
        assert!(num_aux <= self.alpha(), "num_aux exceeds the auxiliary chain");
        if level < 0 {
            assert_eq!(level, -1, "negative levels other than -1 are invalid");
            return NPInfo::new(0, 0, num_aux);
        }
        assert!(level <= self.max_level, "level {} out of range", level);
        let (m, t) = self.level_config[level as usize];
        NPInfo::new(m, t, num_aux)
    }

    pub fn np_to_level(&self, np: &NPInfo) -> i32 {
        if np.num_main == 0 && np.num_ter == 0 {
            return -1;
        }
        for (l, &(m, t)) in self.level_config.iter().enumerate() {
            if m == np.num_main && t == np.num_ter {
                return l as i32;
            }
        }
        panic!("no level matches basis {:?}", np);
    }

    pub fn assert_valid_np(&self, np: &NPInfo) {
        self.np_to_level(np);
        assert!(np.num_aux <= self.alpha());
    }

    /// Primes of a basis: terminal primes in reverse, then main, then
    /// auxiliary.
    pub fn prime_vector(&self, np: NPInfo) -> Vec<W> {
        let mut v = Vec::with_capacity(np.num_total());
        v.extend(self.ter_primes[..np.num_ter].iter().rev());
        v.extend(&self.main_primes[..np.num_main]);
        v.extend(&self.aux_primes[..np.num_aux]);
        v
    }

    pub fn aux_primes(&self) -> &[W] {
        &self.aux_primes
    }

    pub fn scale(&self, level: i32) -> f64 {
        assert!((0..=self.max_level).contains(&level));
        self.scale[level as usize]
    }

    pub fn rescale_prime_prod(&self, level: i32) -> f64 {
        assert!((1..=self.max_level).contains(&level));
        self.rescale_prime_prod[level as usize]
    }

    pub fn galois_factor(&self, rot_dist: usize) -> usize {
        self.galois_factors[rot_dist % (self.degree / 2)]
    }

    pub fn conjugation_factor(&self) -> usize {
        2 * self.degree - 1
    }

    pub fn dense_hamming_weight(&self) -> usize {
        self.dense_hamming_weight
    }

    pub fn set_dense_hamming_weight(&mut self, h: usize) {
        assert!(h > 0 && h <= self.degree);
        self.dense_hamming_weight = h;
    }

    pub fn sparse_hamming_weight(&self) -> usize {
        self.sparse_hamming_weight
    }

    pub fn set_sparse_hamming_weight(&mut self, h: usize) {
        assert!(h > 0 && h <= self.degree);
        self.sparse_hamming_weight = h;
    }

    pub fn use_sse(&self) -> bool {
        self.use_sse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal() -> ParameterLiteral {
        ParameterLiteral {
            log_degree: 4,
            base_scale: (1u64 << 25) as f64,
            default_encryption_level: 1,
            level_config: vec![(1, 0), (2, 0), (3, 0)],
            main_primes: vec![35184372121601, 1099511799809, 1099511922689],
            ter_primes: vec![],
            aux_primes: vec![1125899906949121],
            additional_base: (0, 0),
            dense_hamming_weight: 8,
            sparse_hamming_weight: 4,
            use_sse: false,
        }
    }

    #[test]
    fn level_np_roundtrip() {
        let p = Parameter::<u64>::new(&literal());
        for l in -1..=p.max_level() {
            let np = p.level_to_np(l, 0);
            assert_eq!(p.np_to_level(&np), l);
        }
        assert_eq!(p.level_to_np(-1, 1), NPInfo::new(0, 0, 1));
    }

    #[test]
    fn scale_schedule_identity() {
        let p = Parameter::<u64>::new(&literal());
        for l in 1..=p.max_level() {
            let lhs = p.scale(l) * p.scale(l) / p.rescale_prime_prod(l);
            let rhs = p.scale(l - 1);
            assert!((lhs / rhs - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn galois_factors_are_generator_powers() {
        let p = Parameter::<u64>::new(&literal());
        assert_eq!(p.galois_factor(0), 1);
        assert_eq!(p.galois_factor(1), 5);
        assert_eq!(p.galois_factor(2), 25);
        assert_eq!(p.conjugation_factor(), 31);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn level_above_max_rejected() {
        let p = Parameter::<u64>::new(&literal());
        p.level_to_np(3, 0);
    }

    #[test]
    #[should_panic(expected = "not a prefix")]
    fn primes_gained_below_rejected() {
        // Level 0 holds a terminal prime the upper levels lack; no exact
        // rescale into that basis exists.
        let mut lit = literal();
        lit.level_config = vec![(1, 1), (2, 0), (3, 0)];
        lit.ter_primes = vec![1099512004609];
        Parameter::<u64>::new(&lit);
    }

    #[test]
    fn additional_base_widens_level_zero() {
        let mut lit = literal();
        lit.level_config = vec![(1, 0), (3, 0)];
        lit.additional_base = (1, 0);
        let p = Parameter::<u64>::new(&lit);
        assert_eq!(p.num_q(0), 2);
        assert_eq!(p.np_to_level(&NPInfo::new(2, 0, 0)), 0);
        let q0 = p.prime_vector(p.level_to_np(0, 0));
        let q1 = p.prime_vector(p.level_to_np(1, 0));
        assert_eq!(q0[..], q1[..2]);
    }
}
