//! Terminal UI for the panel binary

pub mod panel_view;

pub use panel_view::{render_panel, PanelLayout, PanelStatus, PanelViewState};
