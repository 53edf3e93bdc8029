//! cnes-rs
//!
//! A lightweight Rust library for retrieving, aggregating, comparing, and
//! exporting Brazilian CNES/SUS health-establishment and hospital-bed data.
//! Pairs with the `cnes` CLI.
//!
//! ### Features
//! - Fetch establishment counts and bed indicators by year, month, UF, and
//!   bed type, with pagination handled for you
//! - Fold per-state figures into macro-region summaries with
//!   population-weighted coverage ratios
//! - Compare bed indicators across years: headline deltas, trend series,
//!   comparison tables
//! - Export tables as BOM-prefixed CSV or XLSX, and charts as PNG/SVG
//!
//! ### Example
//! ```no_run
//! use cnes_rs::{BedsQuery, CancelToken, Client};
//!
//! let client = Client::default();
//! let filtro = BedsQuery::for_year(2023);
//! let comparison = cnes_rs::compare::fetch_comparison(
//!     &client,
//!     &[2020, 2023],
//!     &filtro,
//!     &CancelToken::new(),
//! );
//! if let Some(kpis) = comparison.kpis() {
//!     println!("Total de leitos: {:+.1}%", kpis.total_leitos.delta_pct);
//! }
//! cnes_rs::export::save_csv(&comparison.indicator_table(), "indicadores.csv")?;
//! # Ok::<(), cnes_rs::export::ExportError>(())
//! ```

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod compare;
pub mod config;
pub mod export;
pub mod models;
pub mod regions;
pub mod viz;

pub use api::{CancelToken, Client};
pub use models::{BedIndicators, BedsByRegion, BedsByState, BedsQuery, EstablishmentCount};
pub use regions::Region;
