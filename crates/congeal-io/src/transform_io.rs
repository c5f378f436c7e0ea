//! Transform export.
//!
//! Each subject transform maps the subject's points into the common
//! (group mean) space. It is written twice: as an ITK text transform and,
//! for all subjects together, as `transforms.json` with the raw parameters.

use anyhow::{anyhow, bail, Context, Result};
use congeal_core::{AffineParameters, AffineTransform};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const TRANSFORMS_JSON: &str = "transforms.json";

const ITK_TYPE: &str = "AffineTransform_double_3_3";

/// One subject's entry in `transforms.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub id: String,
    /// rotation (3), translation (3), scale (3), shear (6)
    pub parameters: Vec<f64>,
    /// Row-major homogeneous matrix.
    pub matrix: [[f64; 4]; 4],
}

impl TransformRecord {
    pub fn new(id: &str, params: &AffineParameters) -> Self {
        let h = params.to_transform().to_homogeneous();
        let mut matrix = [[0.0; 4]; 4];
        for (r, row) in matrix.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = h[(r, c)];
            }
        }
        Self {
            id: id.to_string(),
            parameters: params.as_array().to_vec(),
            matrix,
        }
    }
}

/// ITK text transform for `transform`.
pub fn format_itk_transform(transform: &AffineTransform) -> String {
    let m = transform.matrix();
    let t = transform.translation();
    let mut out = String::from("#Insight Transform File V1.0\n#Transform 0\n");
    let _ = writeln!(out, "Transform: {}", ITK_TYPE);
    out.push_str("Parameters:");
    for r in 0..3 {
        for c in 0..3 {
            let _ = write!(out, " {}", m[(r, c)]);
        }
    }
    for k in 0..3 {
        let _ = write!(out, " {}", t[k]);
    }
    out.push_str("\nFixedParameters: 0 0 0\n");
    out
}

/// Parse an ITK affine text transform with a zero centre.
pub fn parse_itk_transform(text: &str) -> Result<AffineTransform> {
    let mut kind = None;
    let mut values = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Transform:") {
            kind = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Parameters:") {
            let parsed = rest
                .split_whitespace()
                .map(|v| v.parse::<f64>().map_err(|_| anyhow!("invalid parameter '{}'", v)))
                .collect::<Result<Vec<_>>>()?;
            values = Some(parsed);
        }
    }
    match kind.as_deref() {
        Some(ITK_TYPE) => {}
        Some(other) => bail!("unsupported transform type {}", other),
        None => bail!("missing Transform line"),
    }
    let values = values.ok_or_else(|| anyhow!("missing Parameters line"))?;
    if values.len() != 12 {
        bail!("expected 12 affine parameters, found {}", values.len());
    }
    let matrix = Matrix3::from_row_slice(&values[..9]);
    let translation = Vector3::new(values[9], values[10], values[11]);
    Ok(AffineTransform::new(matrix, translation))
}

/// Write `<dir>/<id>.tfm` for every subject and `<dir>/transforms.json`.
pub fn write_transforms(dir: &Path, transforms: &[AffineParameters], ids: &[String]) -> Result<()> {
    if transforms.len() != ids.len() {
        bail!("{} transforms for {} subjects", transforms.len(), ids.len());
    }
    let mut records = Vec::with_capacity(ids.len());
    for (params, id) in transforms.iter().zip(ids) {
        let path = dir.join(format!("{}.tfm", id));
        fs::write(&path, format_itk_transform(&params.to_transform()))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        records.push(TransformRecord::new(id, params));
    }
    let path = dir.join(TRANSFORMS_JSON);
    let json = serde_json::to_string_pretty(&records).context("Failed to serialise transforms")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read back `transforms.json`.
pub fn read_transforms_json(path: &Path) -> Result<Vec<TransformRecord>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
