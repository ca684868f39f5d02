pub mod kvpath;
pub mod linktap_api;
pub mod mqtt;
pub mod polyglot;
