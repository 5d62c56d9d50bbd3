mod device;
mod error;

pub use device::Device;
pub use error::{DeviceError, InitError};
