pub mod broker;
pub mod devices;
