//! Error catalog and definitions for ghinfra
//!
//! Subsystem error enums (`LoadError`, `PlanError`, `SinkError`) live next to
//! the code that raises them and map onto the catalog via `error_code()`.
//!
//! # Error Code Ranges
//!
//! | Range      | Category     | Description                              |
//! |------------|--------------|------------------------------------------|
//! | E001-E099  | Config       | Operator file and repository descriptors |
//! | E100-E199  | Resolution   | Access resolution and identity planning  |
//! | E200-E299  | Provisioning | Provisioning sink failures               |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
