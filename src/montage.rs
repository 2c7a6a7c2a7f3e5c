//! Scalp-electrode geometry.
//!
//! The `standard_1020` template is an idealised spherical 10-10 layout on a
//! head sphere of radius [`HEAD_RADIUS`]:
//!
//! ```text
//!   2-D polar projection (degrees from the vertex)
//!
//!   ring at 72°   Fpz Fp2 AF8 F8 FT8 T8 TP8 P8 PO8 O2 Oz   every 18° of azimuth
//!   ring at 90°   Nz  AF10 F10 FT10 T10 TP10 P10 PO10  Iz
//!   midline       Fpz 72 · AFz 54 · Fz 36 · FCz 18 · Cz 0 · CPz · Pz · POz · Oz
//!   inner sites   evenly spaced between the midline site and the ring site
//! ```
//!
//! Coordinates are head-frame metres: `x` towards the right ear, `y` towards
//! the nasion, `z` through the vertex.  Odd numbers are on the left.
use crate::error::{PipelineError, Result};
use crate::raw::{ChannelKind, Raw};

/// Radius of the template head sphere in metres.
pub const HEAD_RADIUS: f64 = 0.095;

const RING: f64 = 72.0;
const OUTER_RING: f64 = 90.0;

struct Row {
    prefix: &'static str,
    edge_prefix: &'static str,
    /// Signed polar angle of the midline site (positive = frontal).
    midline: f64,
    edge_azimuth: f64,
    steps: u32,
    outer: bool,
}

const ROWS: [Row; 9] = [
    Row { prefix: "Fp", edge_prefix: "Fp", midline: 72.0, edge_azimuth: 18.0, steps: 1, outer: false },
    Row { prefix: "AF", edge_prefix: "AF", midline: 54.0, edge_azimuth: 36.0, steps: 4, outer: true },
    Row { prefix: "F", edge_prefix: "F", midline: 36.0, edge_azimuth: 54.0, steps: 4, outer: true },
    Row { prefix: "FC", edge_prefix: "FT", midline: 18.0, edge_azimuth: 72.0, steps: 4, outer: true },
    Row { prefix: "C", edge_prefix: "T", midline: 0.0, edge_azimuth: 90.0, steps: 4, outer: true },
    Row { prefix: "CP", edge_prefix: "TP", midline: -18.0, edge_azimuth: 108.0, steps: 4, outer: true },
    Row { prefix: "P", edge_prefix: "P", midline: -36.0, edge_azimuth: 126.0, steps: 4, outer: true },
    Row { prefix: "PO", edge_prefix: "PO", midline: -54.0, edge_azimuth: 144.0, steps: 4, outer: true },
    Row { prefix: "O", edge_prefix: "O", midline: -72.0, edge_azimuth: 162.0, steps: 1, outer: false },
];

/// Pre-10-10 names still found in older recordings.
const ALIASES: [(&str, &str); 4] = [("T3", "T7"), ("T4", "T8"), ("T5", "P7"), ("T6", "P8")];

#[derive(Debug, Clone)]
pub struct Montage {
    pub name: String,
    positions: Vec<(String, [f64; 3])>,
}

impl Montage {
    /// Idealised 10-10 template (10-20 sites included, plus 9/10 positions,
    /// `Nz`, `Iz` and the old `T3`-`T6` names).
    pub fn standard_1020() -> Self {
        let mut positions: Vec<(String, [f64; 3])> = Vec::new();
        let mut push = |name: String, p: [f64; 2]| positions.push((name, projected_to_head(p)));

        push("Nz".into(), [0.0, OUTER_RING]);
        for row in &ROWS {
            let mid = [0.0, row.midline];
            let edge = polar(RING, row.edge_azimuth);
            push(format!("{}z", row.prefix), mid);
            for k in 1..=row.steps {
                let frac = k as f64 / row.steps as f64;
                let right = [mid[0] + (edge[0] - mid[0]) * frac, mid[1] + (edge[1] - mid[1]) * frac];
                let prefix = if k == row.steps { row.edge_prefix } else { row.prefix };
                push(format!("{prefix}{}", 2 * k - 1), [-right[0], right[1]]);
                push(format!("{prefix}{}", 2 * k), right);
            }
            if row.outer {
                let outer = polar(OUTER_RING, row.edge_azimuth);
                push(format!("{}9", row.edge_prefix), [-outer[0], outer[1]]);
                push(format!("{}10", row.edge_prefix), outer);
            }
        }
        push("Iz".into(), [0.0, -OUTER_RING]);

        for (old, new) in ALIASES {
            if let Some(p) = positions.iter().find(|(n, _)| n == new).map(|(_, p)| *p) {
                positions.push((old.to_string(), p));
            }
        }

        Self { name: "standard_1020".to_string(), positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.positions.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str, match_case: bool) -> Option<[f64; 3]> {
        self.positions
            .iter()
            .find(|(n, _)| if match_case { n == name } else { n.eq_ignore_ascii_case(name) })
            .map(|(_, p)| *p)
    }
}

/// Look a template up by name.
pub fn make_standard_montage(kind: &str) -> Result<Montage> {
    match kind {
        "standard_1020" => Ok(Montage::standard_1020()),
        other => Err(PipelineError::invalid(format!("unknown montage {other:?}"))),
    }
}

/// Attach template positions to every EEG channel.
///
/// Fails with [`PipelineError::MontageMismatch`] listing every EEG channel
/// the template cannot resolve; non-EEG channels are ignored.
pub fn set_montage(mut raw: Raw, montage: &Montage, match_case: bool) -> Result<Raw> {
    let mut missing = Vec::new();
    let mut found = Vec::new();
    for i in raw.eeg_picks() {
        match montage.get(&raw.ch_names[i], match_case) {
            Some(p) => found.push((i, p)),
            None => missing.push(raw.ch_names[i].clone()),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::MontageMismatch(missing));
    }
    for (i, p) in found {
        raw.positions[i] = Some(p);
    }
    for (i, kind) in raw.ch_kinds.iter().enumerate() {
        if *kind != ChannelKind::Eeg {
            raw.positions[i] = None;
        }
    }
    Ok(raw)
}

/// Azimuthal-equidistant projection used by topographic maps.
///
/// The vertex maps to the origin and the head equator to a circle of
/// radius [`HEAD_RADIUS`].
pub fn topomap_coords(pos: [f64; 3]) -> [f64; 2] {
    let [x, y, z] = pos;
    let r = (x * x + y * y + z * z).sqrt();
    if r == 0.0 {
        return [0.0, 0.0];
    }
    let inclination = (z / r).clamp(-1.0, 1.0).acos();
    let azimuth = x.atan2(y);
    let rho = inclination / std::f64::consts::FRAC_PI_2 * HEAD_RADIUS;
    [rho * azimuth.sin(), rho * azimuth.cos()]
}

fn polar(inclination_deg: f64, azimuth_deg: f64) -> [f64; 2] {
    let az = azimuth_deg.to_radians();
    [inclination_deg * az.sin(), inclination_deg * az.cos()]
}

fn projected_to_head(p: [f64; 2]) -> [f64; 3] {
    let inclination = p[0].hypot(p[1]).to_radians();
    let azimuth = p[0].atan2(p[1]);
    [
        HEAD_RADIUS * inclination.sin() * azimuth.sin(),
        HEAD_RADIUS * inclination.sin() * azimuth.cos(),
        HEAD_RADIUS * inclination.cos(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const BIOSEMI64: [&str; 64] = [
        "Fp1", "AF7", "AF3", "F1", "F3", "F5", "F7", "FT7", "FC5", "FC3", "FC1", "C1", "C3", "C5",
        "T7", "TP7", "CP5", "CP3", "CP1", "P1", "P3", "P5", "P7", "P9", "PO7", "PO3", "O1", "Iz",
        "Oz", "POz", "Pz", "CPz", "Fpz", "Fp2", "AF8", "AF4", "AFz", "Fz", "F2", "F4", "F6", "F8",
        "FT8", "FC6", "FC4", "FC2", "FCz", "Cz", "C2", "C4", "C6", "T8", "TP8", "CP6", "CP4",
        "CP2", "P2", "P4", "P6", "P8", "P10", "PO8", "PO4", "O2",
    ];

    #[test]
    fn template_covers_biosemi_cap() {
        let m = Montage::standard_1020();
        for name in BIOSEMI64 {
            assert!(m.get(name, true).is_some(), "{name} missing");
        }
    }

    #[test]
    fn landmarks_sit_where_expected() {
        let m = Montage::standard_1020();
        let cz = m.get("Cz", true).unwrap();
        approx::assert_abs_diff_eq!(cz[2], HEAD_RADIUS, epsilon = 1e-12);
        let t7 = m.get("T7", true).unwrap();
        assert!(t7[0] < 0.0, "T7 must be on the left");
        let t8 = m.get("T8", true).unwrap();
        approx::assert_abs_diff_eq!(t7[0], -t8[0], epsilon = 1e-12);
        let fpz = m.get("Fpz", true).unwrap();
        assert!(fpz[1] > 0.0);
        let oz = m.get("Oz", true).unwrap();
        assert!(oz[1] < 0.0);
        assert_eq!(m.get("T3", true), m.get("T7", true));
    }

    #[test]
    fn all_sites_on_sphere() {
        let m = Montage::standard_1020();
        for name in m.names() {
            let p = m.get(name, true).unwrap();
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            approx::assert_abs_diff_eq!(r, HEAD_RADIUS, epsilon = 1e-12);
        }
    }

    #[test]
    fn case_insensitive_match() {
        let raw = Raw::new(
            Array2::zeros((3, 4)),
            128.0,
            vec!["FP1".into(), "cz".into(), "Status".into()],
            vec![ChannelKind::Eeg, ChannelKind::Eeg, ChannelKind::Stim],
        )
        .unwrap();
        let raw = set_montage(raw, &Montage::standard_1020(), false).unwrap();
        assert!(raw.positions[0].is_some());
        assert!(raw.positions[1].is_some());
        assert!(raw.positions[2].is_none());
    }

    #[test]
    fn unknown_channels_are_all_reported() {
        let raw = Raw::new(
            Array2::zeros((3, 4)),
            128.0,
            vec!["Cz".into(), "Foo".into(), "Bar".into()],
            vec![ChannelKind::Eeg; 3],
        )
        .unwrap();
        let err = set_montage(raw, &Montage::standard_1020(), false).unwrap_err();
        match err {
            PipelineError::MontageMismatch(names) => assert_eq!(names, vec!["Foo", "Bar"]),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn projection_puts_equator_on_head_circle() {
        let m = Montage::standard_1020();
        let t9 = topomap_coords(m.get("T9", true).unwrap());
        approx::assert_abs_diff_eq!(t9[0], -HEAD_RADIUS, epsilon = 1e-9);
        let cz = topomap_coords(m.get("Cz", true).unwrap());
        approx::assert_abs_diff_eq!(cz[0].hypot(cz[1]), 0.0, epsilon = 1e-12);
    }
}
