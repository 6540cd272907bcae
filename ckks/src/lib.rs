pub mod client;
pub mod container;
pub mod context;
pub mod elementwise;
pub mod encode;
pub mod evk;
pub mod modswitch;
pub mod multi_level;
pub mod npinfo;
pub mod ntt_engine;
pub mod parameter;

pub use client::Client;
pub use container::{Ciphertext, Constant, EvaluationKey, LeveledValue, Plaintext};
pub use context::Context;
pub use encode::Complex64;
pub use evk::{EvkMap, EvkRequest};
pub use multi_level::MultiLevelCiphertext;
pub use npinfo::NPInfo;
pub use parameter::{Parameter, ParameterLiteral};
