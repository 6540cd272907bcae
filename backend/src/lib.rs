pub mod device_vec;

pub use device_vec::DeviceVec;
