pub mod stage0_markup;
pub mod stage1_segment;
pub mod stage2_dates;
pub mod stage3_persist;

pub use stage0_markup::*;
pub use stage1_segment::*;
pub use stage2_dates::*;
pub use stage3_persist::*;
