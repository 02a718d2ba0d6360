//! assetscope - find, compress and safely delete game-ad image assets
//!
//! This crate scans a project's asset directories, extracts references to
//! those assets from scripts, stylesheets and markup, and classifies every
//! asset as used or unused. Used assets can be sent to a compression
//! service; unused ones are deleted only through a two-step
//! plan-then-confirm manifest workflow.

pub mod analysis;
pub mod classify;
pub mod compress;
pub mod config;
pub mod deletion;
pub mod export;
pub mod inventory;
pub mod issues;
pub mod logger;
pub mod pipeline;
pub mod report;
pub mod ui;
