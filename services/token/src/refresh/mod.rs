//! Token refresh.

pub mod refresher;

pub use refresher::RefreshEngine;
