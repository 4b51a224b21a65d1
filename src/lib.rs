//! # sitemap-gen
//!
//! Streams an XML product/offer feed into sitemaps.org sitemap files.
//!
//! One or more selector expressions pick the address nodes out of the feed.
//! Their matches are pulled lazily, selector after selector, cut into
//! batches of at most 50,000 entries, and each batch becomes one
//! `sitemap[N].xml` file (optionally with a `.xml.gz` twin). When more than one
//! file is produced a `sitemap-index.xml` lists them all.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────┐   ┌───────────┐
//! │   Source   │──▶│  Selectors   │──▶│ Batches  │──▶│  Writer   │
//! │ XML / .gz  │   │ lazy, merged │   │ ≤ 50,000 │   │ xml + gz  │
//! └────────────┘   └──────────────┘   └──────────┘   └─────┬─────┘
//!                                                          ▼
//!                                                   ┌─────────────┐
//!                                                   │    Index    │
//!                                                   │ (2+ files)  │
//!                                                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sitemap-gen generate --source feed.xml.gz --output-dir public/sitemaps \
//!     --selector '//offer/url' --gzip --base-url https://shop.example/sitemaps
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Generation parameters, TOML loading, validation |
//! | [`error`] | Error taxonomy |
//! | [`source`] | Source document parsing (plain or gzip) |
//! | [`selector`] | Selector language and resolver |
//! | [`extract`] | Merged extraction sequence |
//! | [`batch`] | Batch partitioning |
//! | [`models`] | Core data types |
//! | [`sitemap`] | Sitemap documents and XML serialization |
//! | [`export`] | Sitemap file writing |
//! | [`index`] | Sitemap index accumulation |
//! | [`generate`] | Run orchestration |
//! | [`stats`] | Run report |
//! | [`progress`] | Progress reporting |
//! | [`logging`] | Tracing setup |

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod generate;
pub mod index;
pub mod logging;
pub mod models;
pub mod progress;
pub mod selector;
pub mod sitemap;
pub mod source;
pub mod stats;

pub use error::{Error, Result};
