//! Figures.
//!
//! Every function builds and returns its own [`Figure`]; nothing here keeps
//! drawing state between calls or mutates its inputs.  A figure is rendered
//! only when the caller asks for it ([`Figure::render_svg`],
//! [`Figure::save_svg`]).
//!
//! | Function               | Figure                                              |
//! |------------------------|-----------------------------------------------------|
//! | [`plot_erp`]           | one subject, regular vs random, PO7/PO8 mean        |
//! | [`plot_average_erp`]   | grand average, same layout                          |
//! | [`plot_tfr`]           | 2×2 joint plots, condition × hemisphere             |
//! | [`plot_topomap`]       | 2×1 rows of scalp maps, one row per condition       |
//! | [`plot_raw`] ...       | diagnostics for the debug-image path                |

pub mod colormap;
pub mod diagnostics;
pub mod erp;
pub mod figure;
pub mod tfr;
pub mod topomap;

pub use colormap::Colormap;
pub use diagnostics::{plot_ica_components, plot_ica_scores, plot_raw, plot_sensors};
pub use erp::{plot_average_erp, plot_erp, ERP_PICKS};
pub use figure::{BarPanel, Cell, Figure, Grid, HeatmapPanel, LinePanel, Panel, Series, TopomapPanel};
pub use tfr::{joint_panel, plot_tfr, TFR_BASELINE, TFR_MARKERS, TFR_PICKS};
pub use topomap::{interpolate_idw, plot_topomap, DEFAULT_TOPOMAP_TIMES};
