pub mod abi;
pub mod error;
pub mod heap;
pub mod session;
pub mod value;

pub use abi::{RawValue, Tag};
pub use value::Value;
