//! Bootstrapping for the approximate arithmetic engine: modulus raising,
//! homomorphic encoding switches and the sine-based modular reduction,
//! rebuilt on the leveled operation surface of the `ckks` crate.

pub mod boot_context;
pub mod boot_parameter;
pub mod eval_mod;
pub mod eval_poly;
pub mod hoist;
pub mod linear_transform;
pub mod special_fft;
pub mod striped_matrix;

pub use boot_context::BootContext;
pub use boot_parameter::BootParameter;
pub use eval_mod::EvalMod;
pub use eval_poly::{eval_poly_depth, EvalPoly};
pub use hoist::HoistHandler;
pub use linear_transform::LinearTransform;
pub use striped_matrix::StripedMatrix;
