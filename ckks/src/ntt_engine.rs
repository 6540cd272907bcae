use fnv::FnvHashMap;
use rns::{NttTable, Prime, Word};

use crate::parameter::Parameter;

/// Per-prime transform dispatch. Tables are built once for every prime a
/// parameter set can touch; polynomial arguments are flat prime-major
/// slices as in `elementwise`.
pub struct NttEngine<W: Word> {
    degree: usize,
    tables: FnvHashMap<u64, NttTable<W>>,
    imaginary_unit: FnvHashMap<u64, Vec<W>>,
}

impl<W: Word> NttEngine<W> {
    pub fn new(param: &Parameter<W>) -> Self {
        let degree = param.degree();
        let log_n = param.log_degree();
        let max_np = param.level_to_np(param.max_level(), param.alpha());
        let mut all = param.prime_vector(max_np);
        for l in 0..param.max_level() {
            all.extend(param.prime_vector(param.level_to_np(l, 0)));
        }

        let mut tables = FnvHashMap::default();
        let mut imaginary_unit = FnvHashMap::default();
        for q in all {
            let qv = q.to_u64();
            if tables.contains_key(&qv) {
                continue;
            }
            let table = NttTable::new(&Prime::new(q), log_n);
            // X^(N/2) in the evaluation domain multiplies each chosen
            // embedding slot by the imaginary unit.
            let mut iu = vec![W::default(); degree];
            iu[degree / 2] = W::from_u64(1);
            table.forward_inplace(&mut iu);
            imaginary_unit.insert(qv, iu);
            tables.insert(qv, table);
        }
        Self {
            degree,
            tables,
            imaginary_unit,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn table(&self, q: W) -> &NttTable<W> {
        self.tables
            .get(&q.to_u64())
            .unwrap_or_else(|| panic!("no NTT table for prime {}", q.to_u64()))
    }

    pub fn imaginary_unit(&self, q: W) -> &[W] {
        &self.imaginary_unit[&q.to_u64()]
    }

    pub fn forward_inplace(&self, primes: &[W], a: &mut [W]) {
        let n = self.degree;
        for (&q, chunk) in primes.iter().zip(a.chunks_exact_mut(n)) {
            self.table(q).forward_inplace(chunk);
        }
    }

    pub fn inverse_inplace(&self, primes: &[W], a: &mut [W]) {
        let n = self.degree;
        for (&q, chunk) in primes.iter().zip(a.chunks_exact_mut(n)) {
            self.table(q).inverse_inplace(chunk);
        }
    }

    pub fn inverse(&self, primes: &[W], dst: &mut [W], src: &[W]) {
        let n = self.degree;
        for ((&q, d), s) in primes
            .iter()
            .zip(dst.chunks_exact_mut(n))
            .zip(src.chunks_exact(n))
        {
            self.table(q).inverse(d, s);
        }
    }
}
