//! Legacy VTK polydata reading and writing.
//!
//! Parsing is delegated to `vtkio`; this module converts the `POINTS` and
//! `LINES` of a polydata dataset into fibers. Both the count-prefixed line
//! table of file versions up to 4.x and the `OFFSETS`/`CONNECTIVITY` layout
//! of version 5.x are accepted. Attribute sections are ignored.

use anyhow::{anyhow, bail, Context, Result};
use congeal_core::{Fiber, FiberBundle, Point};
use std::fs;
use std::path::Path;
use vtkio::model::{
    Attributes, ByteOrder, DataSet, IOBuffer, Piece, PolyDataPiece, Version, VertexNumbers, Vtk,
};

/// Scan the section headers and reject element counts that cannot fit in
/// the bytes that follow them.
fn check_declared_counts(data: &[u8]) -> Result<()> {
    let binary = data
        .split(|&b| b == b'\n')
        .take(3)
        .any(|line| String::from_utf8_lossy(line).trim().eq_ignore_ascii_case("BINARY"));

    let mut pos = 0;
    while pos < data.len() {
        let end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(data.len(), |i| pos + i);
        let line = String::from_utf8_lossy(&data[pos..end]);
        pos = end + 1;
        let remaining = data.len().saturating_sub(pos) as u64;

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() != 3 {
            continue;
        }
        let count = |word: &str| -> Result<u64> {
            word.parse()
                .map_err(|_| anyhow!("invalid count '{}' in '{}'", word, line.trim()))
        };
        match words[0].to_ascii_uppercase().as_str() {
            "POINTS" => {
                let width = if words[2].eq_ignore_ascii_case("double") { 8 } else { 4 };
                let needed = count(words[1])?
                    .checked_mul(3)
                    .and_then(|values| values.checked_mul(if binary { width } else { 1 }))
                    .ok_or_else(|| anyhow!("point count {} overflows", words[1]))?;
                if needed > remaining {
                    bail!("{} points declared but only {} bytes follow", words[1], remaining);
                }
                if binary {
                    pos += needed as usize;
                }
            }
            "LINES" => {
                let cells = count(words[1])?;
                let size = count(words[2])?;
                let needed = size
                    .checked_mul(if binary { 4 } else { 1 })
                    .ok_or_else(|| anyhow!("line table size {} overflows", size))?;
                if needed > remaining || cells > remaining {
                    bail!("line table of {} entries declared but only {} bytes follow", size, remaining);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn point_coordinates(points: IOBuffer) -> Result<Vec<Point>> {
    let coords: Vec<f64> = match points {
        IOBuffer::F32(values) => values.into_iter().map(f64::from).collect(),
        IOBuffer::F64(values) => values,
        _ => bail!("POINTS must be float or double"),
    };
    if coords.len() % 3 != 0 {
        bail!("POINTS holds {} values, not a multiple of 3", coords.len());
    }
    Ok(coords.chunks_exact(3).map(|c| Point::new(c[0], c[1], c[2])).collect())
}

/// Point index lists of every line cell.
fn line_cells(lines: VertexNumbers) -> Result<Vec<Vec<usize>>> {
    let mut cells = Vec::new();
    match lines {
        VertexNumbers::Legacy { num_cells, vertices } => {
            let mut cursor = 0usize;
            for _ in 0..num_cells {
                let n = *vertices
                    .get(cursor)
                    .ok_or_else(|| anyhow!("line table ended early"))? as usize;
                let end = cursor
                    .checked_add(1)
                    .and_then(|start| start.checked_add(n))
                    .filter(|&end| end <= vertices.len())
                    .ok_or_else(|| anyhow!("line of {} points overruns the line table", n))?;
                cells.push(vertices[cursor + 1..end].iter().map(|&i| i as usize).collect());
                cursor = end;
            }
        }
        VertexNumbers::XML { connectivity, offsets } => {
            // Offsets either list every boundary starting at 0 or only the
            // end of each cell.
            let mut bounds = Vec::with_capacity(offsets.len() + 1);
            if offsets.first() != Some(&0) {
                bounds.push(0);
            }
            bounds.extend(offsets);
            for window in bounds.windows(2) {
                let (start, end) = (window[0] as usize, window[1] as usize);
                if start > end || end > connectivity.len() {
                    bail!("line offsets {}..{} out of range", start, end);
                }
                cells.push(connectivity[start..end].iter().map(|&i| i as usize).collect());
            }
        }
    }
    Ok(cells)
}

fn piece_fibers(piece: PolyDataPiece) -> Result<Vec<Fiber>> {
    let points = point_coordinates(piece.points)?;
    let cells = match piece.lines {
        Some(lines) => line_cells(lines)?,
        None => Vec::new(),
    };
    cells
        .into_iter()
        .map(|ids| {
            let fiber_points = ids
                .into_iter()
                .map(|i| {
                    points
                        .get(i)
                        .copied()
                        .ok_or_else(|| anyhow!("line references point {} of {}", i, points.len()))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Fiber::new(fiber_points))
        })
        .collect()
}

/// Parse legacy VTK polydata from memory.
pub fn parse_vtk(data: &[u8]) -> Result<FiberBundle> {
    check_declared_counts(data)?;
    let vtk = Vtk::parse_legacy_be(data).map_err(|e| anyhow!("malformed legacy VTK: {:?}", e))?;
    let pieces = match vtk.data {
        DataSet::PolyData { pieces, .. } => pieces,
        _ => bail!("expected POLYDATA dataset"),
    };

    let mut fibers = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Inline(piece) => fibers.extend(piece_fibers(*piece)?),
            _ => bail!("polydata pieces must be stored inline"),
        }
    }
    Ok(FiberBundle::new(fibers))
}

/// Read a legacy VTK polydata file.
pub fn read_vtk<P: AsRef<Path>>(path: P) -> Result<FiberBundle> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_vtk(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Render a bundle as ASCII legacy VTK (version 4.2 layout).
pub fn format_vtk(bundle: &FiberBundle, title: &str) -> Result<String> {
    let mut coords = Vec::with_capacity(bundle.point_count() * 3);
    let mut vertices = Vec::with_capacity(bundle.point_count() + bundle.len());
    let mut next = 0u32;
    for fiber in bundle.fibers() {
        let n = u32::try_from(fiber.len()).context("fiber has too many points for VTK")?;
        vertices.push(n);
        for p in fiber.points() {
            coords.extend_from_slice(&[p.x, p.y, p.z]);
            vertices.push(next);
            next = next.checked_add(1).context("bundle has too many points for VTK")?;
        }
    }
    let num_cells = u32::try_from(bundle.len()).context("bundle has too many fibers for VTK")?;

    let vtk = Vtk {
        version: Version::new((4, 2)),
        title: title.lines().next().unwrap_or_default().to_string(),
        byte_order: ByteOrder::BigEndian,
        file_path: None,
        data: DataSet::PolyData {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(PolyDataPiece {
                points: IOBuffer::F64(coords),
                lines: Some(VertexNumbers::Legacy { num_cells, vertices }),
                data: Attributes::new(),
                ..Default::default()
            }))],
        },
    };
    let mut out = String::new();
    vtk.write_legacy_ascii(&mut out)
        .map_err(|e| anyhow!("failed to format VTK: {:?}", e))?;
    Ok(out)
}

/// Write a bundle as ASCII legacy VTK polydata.
pub fn write_vtk<P: AsRef<Path>>(path: P, bundle: &FiberBundle) -> Result<()> {
    let path = path.as_ref();
    let title = path
        .file_stem()
        .map(|s| format!("congeal {}", s.to_string_lossy()))
        .unwrap_or_else(|| "congeal".to_string());
    let text = format_vtk(bundle, &title)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "# vtk DataFile Version 3.0
tracts
ASCII
DATASET POLYDATA
POINTS 5 float
0 0 0  1 0 0  2 0 0
0 1 0  0 2 0
LINES 2 7
3 0 1 2
2 3 4
POINT_DATA 5
SCALARS fa float
LOOKUP_TABLE default
0 0 0 0 0
";

    const MODERN: &str = "# vtk DataFile Version 5.1
tracts
ASCII
DATASET POLYDATA
POINTS 4 double
0 0 0 1 1 1 2 2 2 3 3 3
LINES 3 4
OFFSETS vtktypeint64
0 2 4
CONNECTIVITY vtktypeint64
0 1 2 3
";

    #[test]
    fn test_parse_legacy_lines() {
        let bundle = parse_vtk(LEGACY.as_bytes()).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.fibers()[0].len(), 3);
        assert_eq!(bundle.fibers()[1].points()[1], Point::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_parse_offsets_layout() {
        let bundle = parse_vtk(MODERN.as_bytes()).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.fibers()[1].points()[0], Point::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_parse_binary() {
        let mut data = b"# vtk DataFile Version 4.2\nbin\nBINARY\nDATASET POLYDATA\nPOINTS 2 float\n".to_vec();
        for v in [0.0f32, 0.0, 0.0, 3.0, 4.0, 0.0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(b"\nLINES 1 3\n");
        for v in [2i32, 0, 1] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.push(b'\n');

        let bundle = parse_vtk(&data).unwrap();
        assert_eq!(bundle.len(), 1);
        assert!((bundle.fibers()[0].length() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let text = LEGACY.replace("2 3 4", "2 3 9");
        assert!(parse_vtk(text.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_other_datasets() {
        let text = LEGACY.replace("POLYDATA", "UNSTRUCTURED_GRID");
        assert!(parse_vtk(text.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_huge_binary_point_count() {
        let data = b"# vtk DataFile Version 4.2\nbin\nBINARY\nDATASET POLYDATA\nPOINTS 3074457345618258603 float\n\0\0\0\0";
        assert!(parse_vtk(data).is_err());
    }

    #[test]
    fn test_rejects_point_count_beyond_file() {
        let text = LEGACY.replace("POINTS 5 float", "POINTS 500000 float");
        assert!(parse_vtk(text.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_huge_line_length() {
        let text = "# vtk DataFile Version 3.0
tracts
ASCII
DATASET POLYDATA
POINTS 2 float
0 0 0 1 0 0
LINES 1 3
1e30 0 1
";
        assert!(parse_vtk(text.as_bytes()).is_err());
    }

    #[test]
    fn test_line_table_overrun_is_an_error() {
        let lines = VertexNumbers::Legacy {
            num_cells: 1,
            vertices: vec![u32::MAX, 0, 1],
        };
        assert!(line_cells(lines).is_err());
    }

    #[test]
    fn test_format_is_readable() {
        let bundle = parse_vtk(LEGACY.as_bytes()).unwrap();
        let text = format_vtk(&bundle, "copy").unwrap();
        assert!(text.contains("POLYDATA"));
        assert_eq!(parse_vtk(text.as_bytes()).unwrap(), bundle);
    }
}
