mod buffer;
mod process;
mod stream;
mod types;
mod value;

pub use buffer::BufferStream;
pub use process::*;
pub use stream::*;
pub use types::PrimitiveType;
pub use value::{Number, Value, apply_mask};
