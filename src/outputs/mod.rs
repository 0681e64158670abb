//! Report rendering and persistence.
//!
//! - [`report`]: assembles included entries into the dated digest text
//! - [`store`]: writes one artifact per calendar day, replacing any earlier run
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 20261017_trending_news_report.txt
//! └── 20261018_trending_news_report.txt
//! ```

pub mod report;
pub mod store;
