//! Gator - a personal RSS feed aggregator
//!
//! This crate tracks RSS feeds per user, periodically fetches them and stores
//! the items as posts that can be browsed from the command line.

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod interval;

pub use error::{Error, Result};
