//! Orthographic preview rendering of aligned bundles.

use congeal_core::{FiberBundle, Point};
use congeal_registration::{PreviewHandle, RegistrationError};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use std::path::Path;

/// Side length of each preview image in pixels.
pub const PREVIEW_SIZE: u32 = 512;

const MARGIN: f64 = 16.0;

/// Projection plane of a preview image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Looking down the z axis.
    Axial,
    /// Looking along the x axis.
    Sagittal,
    /// Looking along the y axis.
    Coronal,
}

impl View {
    pub const ALL: [View; 3] = [View::Axial, View::Sagittal, View::Coronal];

    pub fn file_name(self) -> &'static str {
        match self {
            View::Axial => "view_axial.png",
            View::Sagittal => "view_sagittal.png",
            View::Coronal => "view_coronal.png",
        }
    }

    fn project(self, p: &Point) -> (f64, f64) {
        match self {
            View::Axial => (p.x, p.y),
            View::Sagittal => (p.y, p.z),
            View::Coronal => (p.x, p.z),
        }
    }
}

/// Distinct colour for subject `index`.
pub fn subject_color(index: usize, count: usize) -> Rgb<u8> {
    let hue = index as f64 / count.max(1) as f64;
    let h = hue * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as usize {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8])
}

/// Evenly spaced indices selecting at most `count` of `len` items.
fn stride_indices(len: usize, count: usize) -> Vec<usize> {
    if count >= len {
        return (0..len).collect();
    }
    (0..count).map(|k| k * len / count).collect()
}

/// Three rendered views of a set of bundles.
#[derive(Debug, Clone)]
pub struct Preview {
    views: Vec<(View, RgbImage)>,
}

impl Preview {
    /// Render up to `sample_count` fibers per bundle.
    pub fn render(bundles: &[FiberBundle], sample_count: usize) -> Self {
        let selected: Vec<Vec<&[Point]>> = bundles
            .iter()
            .map(|b| {
                stride_indices(b.len(), sample_count)
                    .into_iter()
                    .map(|i| b.fibers()[i].points())
                    .collect()
            })
            .collect();

        let views = View::ALL
            .iter()
            .map(|&view| (view, Self::render_view(view, &selected)))
            .collect();
        Self { views }
    }

    fn render_view(view: View, selected: &[Vec<&[Point]>]) -> RgbImage {
        let mut image = RgbImage::from_pixel(PREVIEW_SIZE, PREVIEW_SIZE, Rgb([0, 0, 0]));

        let mut lo = (f64::INFINITY, f64::INFINITY);
        let mut hi = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in selected.iter().flatten().flat_map(|f| f.iter()) {
            let (u, v) = view.project(p);
            lo = (lo.0.min(u), lo.1.min(v));
            hi = (hi.0.max(u), hi.1.max(v));
        }
        if !(lo.0.is_finite() && hi.0.is_finite()) {
            return image;
        }

        let extent = (hi.0 - lo.0).max(hi.1 - lo.1).max(1e-9);
        let scale = (PREVIEW_SIZE as f64 - 2.0 * MARGIN) / extent;
        let to_pixel = |p: &Point| {
            let (u, v) = view.project(p);
            let px = MARGIN + (u - lo.0) * scale;
            // Image rows grow downward.
            let py = PREVIEW_SIZE as f64 - MARGIN - (v - lo.1) * scale;
            (px as f32, py as f32)
        };

        for (s, fibers) in selected.iter().enumerate() {
            let color = subject_color(s, selected.len());
            for fiber in fibers {
                for pair in fiber.windows(2) {
                    draw_line_segment_mut(&mut image, to_pixel(&pair[0]), to_pixel(&pair[1]), color);
                }
            }
        }
        image
    }

    pub fn view(&self, view: View) -> Option<&RgbImage> {
        self.views.iter().find(|(v, _)| *v == view).map(|(_, img)| img)
    }
}

impl PreviewHandle for Preview {
    fn save(&self, dir: &Path) -> congeal_registration::Result<()> {
        for (view, image) in &self.views {
            let path = dir.join(view.file_name());
            image.save(&path).map_err(|e| {
                RegistrationError::checkpoint(
                    dir.display().to_string(),
                    format!("failed to save {}: {}", path.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use congeal_core::Fiber;

    #[test]
    fn test_stride_indices() {
        assert_eq!(stride_indices(3, 10), vec![0, 1, 2]);
        assert_eq!(stride_indices(10, 2), vec![0, 5]);
    }

    #[test]
    fn test_render_draws_pixels() {
        let fiber = Fiber::new(vec![Point::new(0.0, 0.0, 0.0), Point::new(10.0, 10.0, 10.0)]);
        let bundles = vec![FiberBundle::new(vec![fiber.clone()]), FiberBundle::new(vec![fiber])];
        let preview = Preview::render(&bundles, 5);
        for view in View::ALL {
            let image = preview.view(view).unwrap();
            assert!(image.pixels().any(|p| p.0 != [0, 0, 0]));
        }
    }

    #[test]
    fn test_segment_is_continuous() {
        let fiber = Fiber::new(vec![Point::new(0.0, 0.0, 0.0), Point::new(100.0, 0.0, 0.0)]);
        let preview = Preview::render(&[FiberBundle::new(vec![fiber])], 1);
        let image = preview.view(View::Axial).unwrap();
        let lit = image.pixels().filter(|p| p.0 != [0, 0, 0]).count() as u32;
        // A horizontal segment spans the drawable width.
        assert!(lit >= PREVIEW_SIZE - 2 * MARGIN as u32);
    }

    #[test]
    fn test_colors_differ() {
        assert_ne!(subject_color(0, 3), subject_color(1, 3));
        assert_ne!(subject_color(1, 3), subject_color(2, 3));
    }
}
