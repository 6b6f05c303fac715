//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: pending URLs guarded by the `VisitedSet`
//! - `CrawlSession`: frontier, content database and counters owned by one crawl

mod frontier;
mod session;

pub use frontier::{Frontier, FrontierEntry, VisitedSet};
pub use session::{CrawlSession, CrawlStats};
