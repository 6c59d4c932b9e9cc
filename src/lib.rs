#![forbid(unsafe_code)]

//! appsweep: remove a desktop application together with the support files it
//! leaves behind, without ever touching system or personal-data locations.
//!
//! Four pieces, leaf-first:
//! 1. **Safety classifier**: pure path → deletable verdict from fixed root rules
//! 2. **Bundle locator**: finds the primary bundle and its identifier
//! 3. **Artifact scanner**: walks library directories for name/identifier matches
//! 4. **Deletion executor**: reclassifies and removes, one artifact at a time
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use appsweep::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use appsweep::core::config::Config;
//! use appsweep::scanner::protection::{RootRuleClassifier, SafetyClassifier};
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod scanner;
pub mod uninstall;
