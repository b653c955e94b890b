pub mod evaluation;
pub mod refinement;
pub mod session;
pub mod theme;
pub mod transcript;

pub use evaluation::*;
pub use refinement::*;
pub use session::*;
pub use theme::*;
pub use transcript::*;
