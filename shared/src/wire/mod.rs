pub mod error;
pub mod pv_data;
pub mod pv_type;
pub mod wire_type;

pub use wire_type::WireType;
