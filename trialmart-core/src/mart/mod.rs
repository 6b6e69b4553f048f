//! Derived layers built from the raw event table
//!
//! - [`staging`]: 1:1 surrogate-keyed copy of `behavioral_events`
//! - [`goals`]: per-organization goal flags in `trial_goals`
//! - [`activation`]: organizations with every goal reached
//!
//! Each builder replaces its table wholesale inside one transaction and
//! returns the number of rows written. Builders must run in the order
//! above; each reads only the layer before it.

pub mod activation;
pub mod goals;
pub mod staging;
