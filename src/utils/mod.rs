pub mod diagnostics;
pub mod hash;
pub mod interner;

pub use diagnostics::CodingErrors;
pub use hash::{fx_hash_key, hash_combine};
pub use interner::Symbol;
