pub mod line;
pub mod page;
pub mod segment;
pub mod session;

pub use line::*;
pub use page::*;
pub use segment::*;
pub use session::*;
