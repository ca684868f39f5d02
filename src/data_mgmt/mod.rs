pub mod models;
pub mod snapshot;

mod lenient;
