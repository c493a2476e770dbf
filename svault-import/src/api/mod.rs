//! HTTP API handlers for svault-import

pub mod health;
pub mod import;
pub mod ui;

pub use health::health_routes;
pub use import::import_routes;
pub use ui::ui_routes;
