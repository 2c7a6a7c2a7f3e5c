//! Diverging colour map used by every image-like panel.

/// Anchor colours of a diverging blue-white-red map, evenly spaced on `[0, 1]`.
const RDBU_R: [[u8; 3]; 11] = [
    [5, 48, 97],
    [33, 102, 172],
    [67, 147, 195],
    [146, 197, 222],
    [209, 229, 240],
    [247, 247, 247],
    [253, 219, 199],
    [244, 165, 130],
    [214, 96, 77],
    [178, 24, 43],
    [103, 0, 31],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    /// Blue for low values, red for high.
    #[default]
    RdBuR,
}

impl Colormap {
    /// Colour of `v` on the `[vmin, vmax]` scale.  Values outside the
    /// range saturate; NaN maps to the midpoint.
    pub fn map(self, v: f64, vmin: f64, vmax: f64) -> [u8; 3] {
        let anchors = match self {
            Colormap::RdBuR => &RDBU_R,
        };
        let span = vmax - vmin;
        let t = if span > 0.0 && v.is_finite() { ((v - vmin) / span).clamp(0.0, 1.0) } else { 0.5 };
        let pos = t * (anchors.len() - 1) as f64;
        let i = (pos.floor() as usize).min(anchors.len() - 2);
        let frac = pos - i as f64;
        let (a, b) = (anchors[i], anchors[i + 1]);
        std::array::from_fn(|k| (a[k] as f64 + (b[k] as f64 - a[k] as f64) * frac).round() as u8)
    }
}

/// Symmetric limits `(-m, m)` around zero, `m` the largest magnitude.
pub fn symmetric_limits<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    let m = values.into_iter().filter(|v| v.is_finite()).fold(0.0_f64, |a, v| a.max(v.abs()));
    if m > 0.0 {
        (-m, m)
    } else {
        (-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_midpoint() {
        let c = Colormap::RdBuR;
        assert_eq!(c.map(-1.0, -1.0, 1.0), RDBU_R[0]);
        assert_eq!(c.map(1.0, -1.0, 1.0), RDBU_R[10]);
        assert_eq!(c.map(0.0, -1.0, 1.0), RDBU_R[5]);
        assert_eq!(c.map(f64::NAN, -1.0, 1.0), RDBU_R[5]);
    }

    #[test]
    fn saturates_outside_range() {
        let c = Colormap::RdBuR;
        assert_eq!(c.map(-5.0, -1.0, 1.0), RDBU_R[0]);
        assert_eq!(c.map(9.0, -1.0, 1.0), RDBU_R[10]);
    }

    #[test]
    fn limits_are_symmetric() {
        assert_eq!(symmetric_limits(&[-2.0, 0.5, 1.0]), (-2.0, 2.0));
        assert_eq!(symmetric_limits(&[0.0]), (-1.0, 1.0));
    }
}
