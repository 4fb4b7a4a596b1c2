pub mod units;

pub use units::{apply_unit_scale, contains_any_ignore_case, contains_ignore_case};
