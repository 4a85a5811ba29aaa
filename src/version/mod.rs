//! Version comparison for Mozilla-style application versions
//!
//! - [`code`]: parsing, order keys and canonical display form
//! - [`list`]: sorted, deduplicated release lists

pub mod code;
pub mod list;

pub use code::{AlphaKind, Version, VersionRecord, compare, order_key, simplify};
pub use list::{ReleaseList, SortOrder, version_list};
