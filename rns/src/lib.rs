pub mod ntt;
pub mod prime;
pub mod word;

pub use ntt::NttTable;
pub use prime::Prime;
pub use word::Word;
