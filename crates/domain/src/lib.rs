pub mod datetime;
pub mod errors;
pub mod hexagram;
pub mod overtime;
pub mod todo;

pub use errors::*;
pub use hexagram::*;
pub use overtime::*;
pub use todo::*;
