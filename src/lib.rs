//! citydb: GeoNames dumps to a normalized SQLite search database
//!
//! This crate turns the flat GeoNames reference files (`countryInfo.txt`,
//! `countryinfo_alts.txt`, `cities15000.txt`) into a relational database of countries,
//! states, timezones, cities and their search aliases:
//!
//! 1. **Read** -- Countries are loaded eagerly; cities are streamed one line at a time
//!    with their country codes resolved to full country records
//! 2. **Derive aliases** -- Every name (plus optional foreign-language names) is expanded
//!    into accent-stripped and punctuation-free spellings, deduplicated case-insensitively
//! 3. **Load** -- A single pass inserts every entity exactly once, reusing surrogate ids
//!    through in-memory caches, and links cities to countries, states and aliases
//! 4. **Publish** -- The database is staged in a temporary file and renamed into place
//!    only after the load has committed
//!
//! # Key Modules
//!
//! - [`text`] -- Accent stripping and the character filters
//! - [`alias`] -- Alias derivation
//! - [`source`] -- Tab-separated readers for the country and city dumps
//! - [`models`] -- Source records and typed surrogate ids
//! - [`schema`] -- Tables, indexes and search views
//! - [`store`] -- Typed inserts over a SQLite connection
//! - [`loader`] -- Deduplicating single-pass loader
//! - [`build`] -- End-to-end build with atomic publish
//! - [`config`] -- File names, column offsets and constants
//!
//! # Example Usage
//!
//! ```bash
//! # Build out/cities.sqlite3 from data/
//! citydb build -d data -o out
//!
//! # Include foreign-language names (out/cities-full.sqlite3)
//! citydb build -d data -o out --full
//! ```

pub mod alias;
pub mod build;
pub mod config;
pub mod loader;
pub mod models;
pub mod schema;
pub mod source;
pub mod store;
pub mod text;
