// No unsafe here!
#![forbid(unsafe_code)]

#[macro_use]
extern crate lazy_static;
extern crate serde;

// Shared (structs) between binaries
pub mod shared_interface;
pub mod cli;

// Encoding and schema alignment
pub mod schema;
pub mod encoding;
pub mod reconcile;

// Scaling and classification
pub mod inference;

// Rendering and export
pub mod report;
