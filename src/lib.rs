//! Pantry tracker application: configuration, the SQLite and filesystem
//! stores behind `pantry-server`, and the HTTP clients the `pantry` CLI uses
//! to reach them.

pub mod config;
pub mod db;
pub mod remote;
pub mod server;
