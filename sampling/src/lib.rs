pub mod distributions;
pub mod source;

pub use distributions::{normal_rounded, ternary, uniform};
pub use source::{new_seed, Source};
