pub mod device_controller;
pub mod evaluation_controller;
pub mod health_controller;
