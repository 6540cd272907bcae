use std::collections::BTreeMap;

use ckks::Complex64;

const PRUNE_THRESHOLD: f64 = 1e-12;

/// Square matrix stored by nonzero (generalized) diagonals, the shape
/// slot-wise linear maps take: `(M v)[i] = sum_k d_k[i] * v[(i + k) % n]`.
#[derive(Clone)]
pub struct StripedMatrix {
    dim: usize,
    diags: BTreeMap<usize, Vec<Complex64>>,
}

impl StripedMatrix {
    pub fn new(dim: usize) -> Self {
        assert!(dim.is_power_of_two());
        Self {
            dim,
            diags: BTreeMap::new(),
        }
    }

    pub fn identity(dim: usize) -> Self {
        let mut m = Self::new(dim);
        m.set_diag(0, vec![Complex64::new(1.0, 0.0); dim]);
        m
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_diags(&self) -> usize {
        self.diags.len()
    }

    pub fn set_diag(&mut self, idx: usize, values: Vec<Complex64>) {
        assert_eq!(values.len(), self.dim);
        self.diags.insert(idx % self.dim, values);
    }

    pub fn diag(&self, idx: usize) -> Option<&Vec<Complex64>> {
        self.diags.get(&(idx % self.dim))
    }

    pub fn add_entry(&mut self, diag_idx: usize, row: usize, value: Complex64) {
        let dim = self.dim;
        let d = self
            .diags
            .entry(diag_idx % dim)
            .or_insert_with(|| vec![Complex64::new(0.0, 0.0); dim]);
        d[row] += value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Vec<Complex64>)> {
        self.diags.iter().map(|(&k, v)| (k, v))
    }

    pub fn mult_scalar(&mut self, c: Complex64) {
        for v in self.diags.values_mut() {
            for x in v.iter_mut() {
                *x *= c;
            }
        }
    }

    /// Composition `self * rhs`, with `rhs` applied first.
    pub fn mult(&self, rhs: &StripedMatrix) -> StripedMatrix {
        assert_eq!(self.dim, rhs.dim);
        let n = self.dim;
        let mut out = StripedMatrix::new(n);
        for (a, va) in self.iter() {
            for (b, vb) in rhs.iter() {
                for i in 0..n {
                    let v = va[i] * vb[(i + a) % n];
                    if v.norm_sqr() > 0.0 {
                        out.add_entry(a + b, i, v);
                    }
                }
            }
        }
        out.prune();
        out
    }

    fn prune(&mut self) {
        self.diags
            .retain(|_, v| v.iter().any(|x| x.norm() > PRUNE_THRESHOLD));
    }

    pub fn apply(&self, v: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(v.len(), self.dim);
        let n = self.dim;
        let mut out = vec![Complex64::new(0.0, 0.0); n];
        for (k, d) in self.iter() {
            for i in 0..n {
                out[i] += d[i] * v[(i + k) % n];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sampling::Source;

    fn random_sparse(source: &mut Source, n: usize, diags: &[usize]) -> StripedMatrix {
        let mut m = StripedMatrix::new(n);
        for &d in diags {
            let v = (0..n)
                .map(|_| Complex64::new(source.next_f64(-1.0, 1.0), source.next_f64(-1.0, 1.0)))
                .collect();
            m.set_diag(d, v);
        }
        m
    }

    #[test]
    fn composition_matches_sequential_application() {
        let mut source = Source::new([21u8; 32]);
        let n = 16;
        let a = random_sparse(&mut source, n, &[0, 1, 14]);
        let b = random_sparse(&mut source, n, &[0, 2, 8]);
        let v: Vec<Complex64> = (0..n)
            .map(|_| Complex64::new(source.next_f64(-1.0, 1.0), source.next_f64(-1.0, 1.0)))
            .collect();
        let direct = a.mult(&b).apply(&v);
        let sequential = a.apply(&b.apply(&v));
        for (x, y) in direct.iter().zip(sequential.iter()) {
            assert!((x - y).norm() < 1e-10);
        }
    }

    #[test]
    fn identity_is_neutral() {
        let mut source = Source::new([22u8; 32]);
        let n = 8;
        let a = random_sparse(&mut source, n, &[0, 3, 5]);
        let id = StripedMatrix::identity(n);
        let v: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new(i as f64, -(i as f64)))
            .collect();
        let left = id.mult(&a).apply(&v);
        let right = a.apply(&v);
        for (x, y) in left.iter().zip(right.iter()) {
            assert!((x - y).norm() < 1e-12);
        }
    }
}
