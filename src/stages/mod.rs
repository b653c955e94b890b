pub mod chunker;
pub mod evaluation;
pub mod generation;
pub mod refinement;

pub use chunker::*;
pub use evaluation::*;
pub use generation::*;
pub use refinement::*;
