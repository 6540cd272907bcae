/// Prime-count triple describing the RNS basis of a container:
/// main primes, terminal primes, and auxiliary (key-switching) primes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NPInfo {
    pub num_main: usize,
    pub num_ter: usize,
    pub num_aux: usize,
}

impl NPInfo {
    pub fn new(num_main: usize, num_ter: usize, num_aux: usize) -> Self {
        Self {
            num_main,
            num_ter,
            num_aux,
        }
    }

    /// Number of base primes, excluding the auxiliary ones.
    pub fn num_q(&self) -> usize {
        self.num_main + self.num_ter
    }

    pub fn num_total(&self) -> usize {
        self.num_main + self.num_ter + self.num_aux
    }

    pub fn is_subset_of(&self, other: &NPInfo) -> bool {
        self.num_main <= other.num_main
            && self.num_ter <= other.num_ter
            && self.num_aux <= other.num_aux
    }

    pub fn is_superset_of(&self, other: &NPInfo) -> bool {
        other.is_subset_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_ordering() {
        let np = NPInfo::new(3, 2, 4);
        assert_eq!(np.num_q(), 5);
        assert_eq!(np.num_total(), 9);
        assert!(NPInfo::new(2, 2, 0).is_subset_of(&np));
        assert!(!NPInfo::new(4, 0, 0).is_subset_of(&np));
        assert!(np.is_superset_of(&NPInfo::default()));
    }
}
