pub mod filter;
pub mod walk;

pub use filter::FileFilter;
pub use walk::{enumerate, ScanScope};
