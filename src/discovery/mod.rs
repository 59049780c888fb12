//! Channel discovery: the probe-and-reconcile loop.
//!
//! For every eligible channel, on every pass:
//! - select it (type, exclusion list, base URL policy)
//! - resolve its candidate models (forced list, `/v1/models`, or fallback)
//! - health-check each candidate with a short completion call
//! - persist the survivors as the channel's model list and ability rows

pub mod poller;
pub mod prober;
pub mod reconcile;
pub mod selector;
