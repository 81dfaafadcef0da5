//! The type algebra: the data-type sum, categories, conversions, and the
//! interning repository of canonical type instances.

pub mod conversion;
pub mod data_type;
pub mod repository;

pub use conversion::Ternary;
pub use data_type::{DataType, TypeCategory, is_equality_comparable, is_order_comparable};
pub use repository::{TypeRepository, default_repository};
