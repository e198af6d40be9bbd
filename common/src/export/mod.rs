//! Export core modules shared by the CLI and library users.

#[cfg(feature = "excel")]
pub mod excel_core;
