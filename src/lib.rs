//! zuulscan - Netflix Zuul admin filter upload scanner
//!
//! Checks Zuul instances for the unauthenticated filter upload remote code
//! execution described in the nflx-2016-003 security advisory. A passive
//! check classifies a target from a single empty upload and can be run over
//! many targets at once; an active check uploads a verification filter and
//! confirms execution through the filter registry, in-band polling, or an
//! out-of-band callback.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod oob;
pub mod registry;
pub mod scanner;
