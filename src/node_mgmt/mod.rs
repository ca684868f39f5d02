pub mod address;
pub mod drivers;
pub mod gateway;
pub mod taplinker;

mod controller;
mod node;

pub use controller::{Controller, ControllerOpts, Flow};
pub use node::{Node, NodeDef, NodeKind, Nodes};
