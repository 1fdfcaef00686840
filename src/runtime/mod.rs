//! # Runtime
//!
//! Controller runtime: initialization, watch loop, index watch and error policy.

pub mod error_policy;
pub mod index_watch;
pub mod initialization;
pub mod watch_loop;
