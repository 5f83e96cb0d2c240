pub mod features;
pub mod records;
pub mod types;

pub use features::*;
pub use records::*;
pub use types::*;
