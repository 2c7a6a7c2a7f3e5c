//! Retained figure description and its `plotters` renderer.
//!
//! A [`Figure`] is plain data: a title, a pixel size and a tree of
//! [`Panel`]s.  Building one never touches a drawing backend, so plot
//! functions stay pure and figures can be inspected in tests; drawing
//! happens in [`Figure::draw`] on any `plotters` backend, and
//! [`Figure::render_svg`] / [`Figure::save_svg`] use the SVG one.
use std::path::Path;

use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::colormap::Colormap;
use super::topomap::{head_outline, interpolate_idw};
use crate::error::{PipelineError, Result};

type DrawResult<T, DB> = std::result::Result<T, DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

pub(crate) const FONT: &str = "sans-serif";

#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    /// Width and height in pixels.
    pub size: (u32, u32),
    pub panel: Panel,
}

#[derive(Debug, Clone)]
pub enum Panel {
    Lines(LinePanel),
    Heatmap(HeatmapPanel),
    Topomap(TopomapPanel),
    Bars(BarPanel),
    Grid(Grid),
}

#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub color: [u8; 3],
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct LinePanel {
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    /// Draw the `x = 0` and `y = 0` guides.
    pub zero_lines: bool,
    pub legend: bool,
    /// Free text at data coordinates.
    pub annotations: Vec<(f64, f64, String)>,
}

#[derive(Debug, Clone)]
pub struct HeatmapPanel {
    pub x_label: String,
    pub y_label: String,
    /// Cell centres along x (e.g. times).
    pub x: Vec<f64>,
    /// Cell centres along y (e.g. frequencies).
    pub y: Vec<f64>,
    /// `[y, x]`
    pub values: Array2<f64>,
    pub vmin: f64,
    pub vmax: f64,
    pub colormap: Colormap,
    /// Marked `(x, y)` points.
    pub markers: Vec<(f64, f64)>,
    pub colorbar_label: String,
}

#[derive(Debug, Clone)]
pub struct TopomapPanel {
    /// Projected sensor positions in metres.
    pub positions: Vec<[f64; 2]>,
    /// Sensor values; `None` draws the layout only.
    pub values: Option<Vec<f64>>,
    pub names: Option<Vec<String>>,
    pub vmin: f64,
    pub vmax: f64,
    pub colormap: Colormap,
    /// Interpolation grid points per side.
    pub resolution: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BarPanel {
    pub x_label: String,
    pub y_label: String,
    pub values: Vec<f64>,
    /// Bars drawn in the highlight colour.
    pub highlighted: Vec<usize>,
    /// Horizontal reference lines.
    pub thresholds: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub title: Option<String>,
    pub panel: Panel,
}

/// Row-major grid of cells.  Cells carry no frame or axes of their own.
#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
    /// Relative row heights; empty means even.
    pub row_weights: Vec<f64>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, cells: Vec<Cell>) -> Self {
        Self { rows, cols, cells, row_weights: Vec::new() }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row * self.cols + col)
    }
}

fn plot_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Plot(e.to_string())
}

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

impl Figure {
    pub fn new(title: impl Into<String>, size: (u32, u32), panel: Panel) -> Self {
        Self { title: title.into(), size, panel }
    }

    /// Draw onto an existing drawing area.
    pub fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<(), DB> {
        root.fill(&WHITE)?;
        if self.title.is_empty() {
            draw_panel(root, &self.panel)
        } else {
            let body = root.titled(&self.title, (FONT, 22))?;
            draw_panel(&body, &self.panel)
        }
    }

    pub fn render_svg(&self) -> Result<String> {
        let mut buf = String::new();
        {
            let root = SVGBackend::with_string(&mut buf, self.size).into_drawing_area();
            self.draw(&root).map_err(plot_err)?;
            root.present().map_err(plot_err)?;
        }
        Ok(buf)
    }

    pub fn save_svg(&self, path: &Path) -> Result<()> {
        let svg = self.render_svg()?;
        std::fs::write(path, svg)?;
        Ok(())
    }
}

pub(crate) fn draw_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &Panel) -> DrawResult<(), DB> {
    match panel {
        Panel::Lines(p) => draw_lines(area, p),
        Panel::Heatmap(p) => draw_heatmap(area, p),
        Panel::Topomap(p) => draw_topomap(area, p),
        Panel::Bars(p) => draw_bars(area, p),
        Panel::Grid(g) => draw_grid(area, g),
    }
}

fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    if !(lo.is_finite() && hi.is_finite()) {
        return (-1.0, 1.0);
    }
    if hi - lo < 1e-12 {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn draw_lines<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, p: &LinePanel) -> DrawResult<(), DB> {
    let pts = p.series.iter().flat_map(|s| s.points.iter());
    let (mut x0, mut x1, mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in pts {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    let (x0, x1) = if x1 > x0 { (x0, x1) } else { padded_range(x0, x1) };
    let (y0, y1) = padded_range(y0, y1);

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .light_line_style(BLACK.mix(0.05))
        .x_desc(p.x_label.as_str())
        .y_desc(p.y_label.as_str())
        .draw()?;

    if p.zero_lines {
        if y0 < 0.0 && y1 > 0.0 {
            chart.draw_series(std::iter::once(PathElement::new(vec![(x0, 0.0), (x1, 0.0)], BLACK.mix(0.4))))?;
        }
        if x0 < 0.0 && x1 > 0.0 {
            chart.draw_series(std::iter::once(PathElement::new(vec![(0.0, y0), (0.0, y1)], BLACK.mix(0.4))))?;
        }
    }
    for s in &p.series {
        let color = rgb(s.color);
        let drawn = chart.draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(2)))?;
        if p.legend {
            drawn
                .label(s.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }
    chart.draw_series(
        p.annotations
            .iter()
            .map(|(x, y, t)| Text::new(t.clone(), (*x, *y), (FONT, 11).into_font())),
    )?;
    if p.legend && !p.series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Cell edges: midpoints between centres, extrapolated at both ends.
/// Geometric midpoints when every centre is positive and the spacing grows.
fn edges(c: &[f64]) -> Vec<f64> {
    match c.len() {
        0 => vec![0.0, 1.0],
        1 => vec![c[0] - 0.5, c[0] + 0.5],
        n => {
            let geometric = c[0] > 0.0 && (c[n - 1] - c[n - 2]) > (c[1] - c[0]) * 1.01;
            let mid = |a: f64, b: f64| if geometric { (a * b).sqrt() } else { (a + b) / 2.0 };
            let mut e = Vec::with_capacity(n + 1);
            e.push(if geometric { c[0] * c[0] / mid(c[0], c[1]) } else { c[0] - (c[1] - c[0]) / 2.0 });
            for w in c.windows(2) {
                e.push(mid(w[0], w[1]));
            }
            e.push(if geometric {
                c[n - 1] * c[n - 1] / mid(c[n - 2], c[n - 1])
            } else {
                c[n - 1] + (c[n - 1] - c[n - 2]) / 2.0
            });
            e
        }
    }
}

fn draw_heatmap<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, p: &HeatmapPanel) -> DrawResult<(), DB> {
    let (w, _) = area.dim_in_pixel();
    let (main, bar) = area.split_horizontally(w.saturating_sub(90));
    let xe = edges(&p.x);
    let ye = edges(&p.y);
    let (nx, ny) = (p.x.len(), p.y.len());

    let mut chart = ChartBuilder::on(&main)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(xe[0]..xe[nx.max(1)], ye[0]..ye[ny.max(1)])?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(p.x_label.as_str())
        .y_desc(p.y_label.as_str())
        .draw()?;

    let (vmin, vmax, cmap, values) = (p.vmin, p.vmax, p.colormap, &p.values);
    let (xe_ref, ye_ref) = (&xe, &ye);
    chart.draw_series((0..ny).flat_map(move |j| {
        (0..nx).map(move |i| {
            let color = rgb(cmap.map(values[[j, i]], vmin, vmax));
            Rectangle::new([(xe_ref[i], ye_ref[j]), (xe_ref[i + 1], ye_ref[j + 1])], color.filled())
        })
    }))?;
    for &(mx, my) in &p.markers {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(mx, ye[0]), (mx, ye[ny.max(1)])],
            BLACK.mix(0.6),
        )))?;
        chart.draw_series(std::iter::once(Circle::new((mx, my), 4, BLACK.stroke_width(2))))?;
    }

    // colour bar
    let steps = 64;
    let mut cb = ChartBuilder::on(&bar)
        .margin_top(10)
        .margin_bottom(45)
        .margin_right(10)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..1.0, vmin..vmax)?;
    cb.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(p.colorbar_label.as_str())
        .y_labels(5)
        .draw()?;
    cb.draw_series((0..steps).map(|k| {
        let a = vmin + (vmax - vmin) * k as f64 / steps as f64;
        let b = vmin + (vmax - vmin) * (k + 1) as f64 / steps as f64;
        Rectangle::new([(0.0, a), (1.0, b)], rgb(cmap.map((a + b) / 2.0, vmin, vmax)).filled())
    }))?;
    Ok(())
}

fn draw_topomap<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, p: &TopomapPanel) -> DrawResult<(), DB> {
    let (w, h) = area.dim_in_pixel();
    let side = w.min(h);
    let square = area.clone().shrink(((w - side) / 2, (h - side) / 2), (side, side));

    let radius = p
        .positions
        .iter()
        .map(|q| q[0].hypot(q[1]))
        .fold(crate::montage::HEAD_RADIUS, f64::max);
    let lim = radius * 1.2;
    let mut chart = ChartBuilder::on(&square).margin(4).build_cartesian_2d(-lim..lim, -lim..lim)?;

    if let Some(values) = &p.values {
        let n = p.resolution.max(2);
        let step = 2.0 * radius / n as f64;
        let cells = (0..n).flat_map(|j| (0..n).map(move |i| (i, j))).filter_map(|(i, j)| {
            let x = -radius + (i as f64 + 0.5) * step;
            let y = -radius + (j as f64 + 0.5) * step;
            if x.hypot(y) > radius {
                return None;
            }
            let v = interpolate_idw(&p.positions, values, [x, y]);
            let color = rgb(p.colormap.map(v, p.vmin, p.vmax));
            Some(Rectangle::new([(x - step / 2.0, y - step / 2.0), (x + step / 2.0, y + step / 2.0)], color.filled()))
        });
        chart.draw_series(cells)?;
    }

    for outline in head_outline(radius) {
        chart.draw_series(std::iter::once(PathElement::new(outline, BLACK.stroke_width(2))))?;
    }
    chart.draw_series(p.positions.iter().map(|q| Circle::new((q[0], q[1]), 2, BLACK.filled())))?;
    if let Some(names) = &p.names {
        chart.draw_series(
            p.positions
                .iter()
                .zip(names)
                .map(|(q, n)| Text::new(n.clone(), (q[0], q[1]), (FONT, 9).into_font())),
        )?;
    }
    Ok(())
}

fn draw_bars<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, p: &BarPanel) -> DrawResult<(), DB> {
    let n = p.values.len().max(1);
    let lo = p.values.iter().chain(&p.thresholds).fold(0.0_f64, |a, &v| a.min(v));
    let hi = p.values.iter().chain(&p.thresholds).fold(0.0_f64, |a, &v| a.max(v));
    let (y0, y1) = padded_range(lo, hi);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y0..y1)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(p.x_label.as_str())
        .y_desc(p.y_label.as_str())
        .draw()?;
    let grey = RGBColor(150, 150, 150);
    chart.draw_series(p.values.iter().enumerate().map(|(i, &v)| {
        let color = if p.highlighted.contains(&i) { RED } else { grey };
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], color.filled())
    }))?;
    for &t in &p.thresholds {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(-0.5, t), (n as f64 - 0.5, t)],
            BLACK.mix(0.5),
        )))?;
    }
    Ok(())
}

fn draw_grid<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, g: &Grid) -> DrawResult<(), DB> {
    let rows = g.rows.max(1);
    let (_, h) = area.dim_in_pixel();
    let weights: Vec<f64> = if g.row_weights.len() == rows { g.row_weights.clone() } else { vec![1.0; rows] };
    let total: f64 = weights.iter().sum();
    let mut acc = 0.0;
    let breaks: Vec<i32> = weights[..rows - 1]
        .iter()
        .map(|w| {
            acc += w;
            (acc / total * h as f64).round() as i32
        })
        .collect();
    let row_areas = area.split_by_breakpoints(Vec::<i32>::new(), breaks);

    for (r, row_area) in row_areas.iter().enumerate() {
        let cols = row_area.split_evenly((1, g.cols.max(1)));
        for (c, cell_area) in cols.iter().enumerate() {
            let Some(cell) = g.cell(r, c) else { continue };
            match &cell.title {
                Some(t) => {
                    let inner = cell_area.titled(t, (FONT, 14))?;
                    draw_panel(&inner, &cell.panel)?;
                }
                None => draw_panel(cell_area, &cell.panel)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_edges() {
        assert_eq!(edges(&[0.0, 1.0, 2.0]), vec![-0.5, 0.5, 1.5, 2.5]);
    }

    #[test]
    fn log_edges_bracket_centres() {
        let c = crate::tfr::logspace(5.0, 20.0, 30);
        let e = edges(&c);
        assert_eq!(e.len(), 31);
        for (i, f) in c.iter().enumerate() {
            assert!(e[i] < *f && *f < e[i + 1]);
        }
    }

    #[test]
    fn line_figure_renders_to_svg() {
        let fig = Figure::new(
            "test",
            (400, 300),
            Panel::Lines(LinePanel {
                series: vec![Series {
                    label: "a".into(),
                    color: [31, 119, 180],
                    points: (0..50).map(|i| (i as f64 / 10.0, (i as f64 / 5.0).sin())).collect(),
                }],
                zero_lines: true,
                legend: true,
                ..Default::default()
            }),
        );
        let svg = fig.render_svg().unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("test"));
    }
}
