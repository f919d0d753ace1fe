pub mod device;
pub mod response;
