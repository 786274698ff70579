pub mod pivots;
pub mod refine;
pub mod select;
pub mod store;

pub use pivots::detect_pivots;
pub use refine::{refine_pivot, RefineError};
pub use select::select_zones;
pub use store::ZoneStore;
