//! Inputs to the pipeline.
//!
//! - [`trends`]: the day's ranked trend terms, read from a text file
//! - [`newsapi`]: the news search service resolving a term to one article

pub mod newsapi;
pub mod trends;
