//! Asset inventory for assetscope.
//!
//! Enumerates image and font files under the project's asset roots with their
//! sizes. The inventory is the left-hand side of classification: every asset
//! found here ends up either used or unused.

pub mod assets;

pub use assets::{normalize_path, relative_path, Asset, AssetInventory, AssetStatus};
