pub mod deployment_service;
pub mod functional_service_base;
