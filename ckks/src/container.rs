use backend::DeviceVec;
use rns::Word;

use crate::npinfo::NPInfo;
use crate::parameter::Parameter;

/// Common surface of the leveled containers. The set of implementors is
/// closed; operations dispatch on concrete types, not trait objects.
pub trait LeveledValue {
    fn np(&self) -> NPInfo;
    fn scale(&self) -> f64;
    fn set_scale(&mut self, scale: f64);
}

/// Scalar constant: one residue per prime of the basis.
pub struct Constant<W: Word> {
    pub cx: DeviceVec<W>,
    np: NPInfo,
    scale: f64,
}

/// Encoded message polynomial, stored in the evaluation (NTT) domain.
pub struct Plaintext<W: Word> {
    pub mx: DeviceVec<W>,
    np: NPInfo,
    scale: f64,
    num_slots: usize,
    degree: usize,
}

/// Two- or three-polynomial ciphertext in the evaluation domain. The
/// third polynomial `rx` exists only between a tensor product and the
/// relinearization that consumes it.
pub struct Ciphertext<W: Word> {
    pub bx: DeviceVec<W>,
    pub ax: DeviceVec<W>,
    pub rx: DeviceVec<W>,
    np: NPInfo,
    scale: f64,
    num_slots: usize,
    degree: usize,
}

/// Gadget-decomposed key-switching key: `beta` ciphertext pairs over the
/// full key basis.
pub struct EvaluationKey<W: Word> {
    pub bx: Vec<DeviceVec<W>>,
    pub ax: Vec<DeviceVec<W>>,
    np: NPInfo,
    degree: usize,
}

impl<W: Word> Constant<W> {
    pub fn empty() -> Self {
        Self {
            cx: DeviceVec::new(0),
            np: NPInfo::default(),
            scale: 1.0,
        }
    }

    pub fn adjust(&mut self, np: NPInfo) {
        self.cx.resize_discard(np.num_total());
        self.np = np;
    }
}

impl<W: Word> Plaintext<W> {
    pub fn empty() -> Self {
        Self {
            mx: DeviceVec::new(0),
            np: NPInfo::default(),
            scale: 1.0,
            num_slots: 0,
            degree: 0,
        }
    }

    pub fn adjust(&mut self, param: &Parameter<W>, np: NPInfo) {
        self.degree = param.degree();
        self.mx.resize_discard(np.num_total() * self.degree);
        self.np = np;
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn set_num_slots(&mut self, num_slots: usize) {
        self.num_slots = num_slots;
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl<W: Word> Ciphertext<W> {
    pub fn empty() -> Self {
        Self {
            bx: DeviceVec::new(0),
            ax: DeviceVec::new(0),
            rx: DeviceVec::new(0),
            np: NPInfo::default(),
            scale: 1.0,
            num_slots: 0,
            degree: 0,
        }
    }

    /// Resizes both polynomials for the given basis, dropping `rx`.
    pub fn adjust(&mut self, param: &Parameter<W>, np: NPInfo) {
        self.degree = param.degree();
        let size = np.num_total() * self.degree;
        self.bx.resize_discard(size);
        self.ax.resize_discard(size);
        self.rx.clear();
        self.np = np;
    }

    pub fn has_rx(&self) -> bool {
        !self.rx.is_empty()
    }

    pub fn prepare_rx(&mut self) {
        self.rx.resize_discard(self.bx.len());
    }

    pub fn remove_rx(&mut self) {
        self.rx.clear();
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn set_num_slots(&mut self, num_slots: usize) {
        self.num_slots = num_slots;
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl<W: Word> EvaluationKey<W> {
    pub fn empty() -> Self {
        Self {
            bx: Vec::new(),
            ax: Vec::new(),
            np: NPInfo::default(),
            degree: 0,
        }
    }

    pub fn adjust(&mut self, param: &Parameter<W>, np: NPInfo, beta: usize) {
        self.degree = param.degree();
        let size = np.num_total() * self.degree;
        self.bx = (0..beta).map(|_| DeviceVec::new(size)).collect();
        self.ax = (0..beta).map(|_| DeviceVec::new(size)).collect();
        self.np = np;
    }

    pub fn beta(&self) -> usize {
        self.bx.len()
    }

    pub fn np(&self) -> NPInfo {
        self.np
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

macro_rules! impl_leveled {
    ($ty:ident, $scale:ident) => {
        impl<W: Word> LeveledValue for $ty<W> {
            fn np(&self) -> NPInfo {
                self.np
            }

            fn scale(&self) -> f64 {
                self.$scale
            }

            fn set_scale(&mut self, scale: f64) {
                self.$scale = scale;
            }
        }
    };
}

impl_leveled!(Constant, scale);
impl_leveled!(Plaintext, scale);
impl_leveled!(Ciphertext, scale);

impl<W: Word> Parameter<W> {
    pub fn new_ciphertext(&self, np: NPInfo) -> Ciphertext<W> {
        let mut ct = Ciphertext::empty();
        ct.adjust(self, np);
        ct
    }

    pub fn new_plaintext(&self, np: NPInfo) -> Plaintext<W> {
        let mut pt = Plaintext::empty();
        pt.adjust(self, np);
        pt
    }

    pub fn new_constant(&self, np: NPInfo) -> Constant<W> {
        let mut c = Constant::empty();
        c.adjust(np);
        c
    }

    pub fn new_evaluation_key(&self, np: NPInfo, beta: usize) -> EvaluationKey<W> {
        let mut evk = EvaluationKey::empty();
        evk.adjust(self, np, beta);
        evk
    }
}
