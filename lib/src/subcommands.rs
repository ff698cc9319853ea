pub use toy::*;
pub use train::*;

pub mod toy;
pub mod train;
