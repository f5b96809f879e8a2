//! Core entry point for the dashboard_report crate.
//!
//! Renders a customer/product dashboard snapshot into a fixed-layout A4 PDF.

pub mod aggregate;
pub mod chart;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod model;
pub mod render;
pub mod report;

pub use error::ReportError;
pub use model::{ChartImage, Customer, CustomerProductLink, Product, Snapshot};
pub use report::{export_dashboard, DashboardReport, RenderedReport, DEFAULT_OUTPUT_FILE};
