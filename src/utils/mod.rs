pub mod byte_size;
pub mod logger;
pub mod validator;

pub use byte_size::format_bytes;
