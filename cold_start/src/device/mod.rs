pub mod device_definitions;
pub mod device_interop;
mod device_lowlevel;
pub mod device_types;

pub use device_interop::{AdbGateway, DeviceGateway};
pub use device_types::{CaptureMode, DeviceError};
