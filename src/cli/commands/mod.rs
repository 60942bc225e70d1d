//! Command execution functions.

mod flash;
mod images;
mod scan;

pub use flash::{FlashRequest, flash};
pub use images::images;
pub use scan::scan;
