//! # Rillflow Core
//!
//! Core types for the Rillflow flow-routing library.
//!
//! This crate provides:
//! - `Element`: trait bounding raster cell value types
//! - `Error` / `Result`: shared error type
//! - `policy`: no-data detection/marking and domain validation policies

pub mod element;
pub mod error;
pub mod policy;

pub use element::{Element, MaterialElement};
pub use error::{Error, Result};
pub use policy::{DomainMode, NoData};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::element::{Element, MaterialElement};
    pub use crate::error::{Error, Result};
    pub use crate::policy::{DomainMode, NoData};
}
