//! Terminal UI for volcano-pilot.
//!
//! [`App`] owns the views and the event loop; `components` holds one module
//! per screen. Nothing in here talks to the gateway directly except through
//! `gateway_rs::GatewayClient` handed in at startup.

pub mod action;
pub mod app;
pub mod audit;
pub mod components;
pub mod tui;
pub mod ui_ext;

pub use app::App;
pub use audit::AuditLogger;
