//! Toggle a CodeCarbon emissions tracker process and surface its status.

pub mod config;
pub mod constants;
pub mod extension;
pub mod output;
pub mod printer;
pub mod process;
pub mod python;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;
pub mod ui;
