/// Linear buffer with the shape of an accelerator-resident allocation.
/// Storage is host memory; the engine crates only ever touch it through
/// explicit resize/copy calls and slice access, so the call sites stay
/// valid for a device-backed swap-in.
#[derive(Default)]
pub struct DeviceVec<W> {
    data: Vec<W>,
}

impl<W: Copy + Default> DeviceVec<W> {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![W::default(); size],
        }
    }

    pub fn from_host(src: &[W]) -> Self {
        Self { data: src.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resizes without preserving contents.
    pub fn resize_discard(&mut self, size: usize) {
        if self.data.len() != size {
            self.data.clear();
            self.data.resize(size, W::default());
        }
    }

    pub fn zero(&mut self) {
        self.data.fill(W::default());
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn copy_from(&mut self, src: &DeviceVec<W>) {
        self.resize_discard(src.len());
        self.data.copy_from_slice(&src.data);
    }

    pub fn copy_from_host(&mut self, src: &[W]) {
        self.resize_discard(src.len());
        self.data.copy_from_slice(src);
    }

    pub fn to_host(&self) -> Vec<W> {
        self.data.clone()
    }

    pub fn as_slice(&self) -> &[W] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [W] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_and_copy() {
        let mut v = DeviceVec::<u64>::new(8);
        v.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let host = v.to_host();
        assert_eq!(host, [1, 2, 3, 4, 5, 6, 7, 8]);
        v.resize_discard(4);
        assert_eq!(v.len(), 4);
        v.copy_from_host(&host);
        assert_eq!(v.len(), 8);
        v.zero();
        assert!(v.as_slice().iter().all(|&x| x == 0));
    }
}
