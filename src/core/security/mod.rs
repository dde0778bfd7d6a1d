// Security module for local path confinement
//
// Uploads read local files and downloads may write them. Both are restricted
// to the configured root directory so a tool call cannot reach arbitrary
// locations on the host.

pub mod path_validator;

pub use path_validator::{PathSecurityError, validate_destination, validate_path};
