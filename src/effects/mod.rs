//! Style engine
//!
//! Holds the current style selection (name + optional reference image) and
//! applies the selected transform to a frame given a detected face region.
//! `apply` never fails: no region, a degenerate region, or an unknown style
//! name all pass the frame through unchanged.

pub mod ops;

use std::sync::Arc;

use image::RgbImage;
use parking_lot::RwLock;

use crate::camera::Frame;
use crate::detect::FaceRegion;

/// Gold tint for the emperor style, RGB.
const GOLD_TINT: [u8; 3] = [80, 50, 0];

/// Pink tint for the anime style, RGB.
const PINK_TINT: [u8; 3] = [255, 105, 147];

/// Sobel magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: f32 = 100.0;

/// The built-in face styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    /// Golden emperor tint over the face box.
    QinShiHuang,
    /// Skin smoothing, edge emphasis, and a pink tint.
    Anime,
    /// Brightness/contrast lift, vignette, and a teal-and-orange grade.
    Cinematic,
    /// Subtle smoothing plus an unsharp composite.
    Realistic,
}

impl Style {
    /// Exact-match lookup; unknown names select no style.
    pub fn parse(name: &str) -> Option<Style> {
        match name {
            "Qin Shi Huang" => Some(Style::QinShiHuang),
            "Anime" => Some(Style::Anime),
            "Cinematic" => Some(Style::Cinematic),
            "Realistic" => Some(Style::Realistic),
            _ => None,
        }
    }
}

/// The active style plus any style-specific reference asset.
///
/// Replaced as a whole on every `set_style`, so concurrent readers always
/// observe one complete selection.
#[derive(Clone, Default)]
pub struct StyleSelection {
    pub name: String,
    pub style: Option<Style>,
    pub reference: Option<Arc<RgbImage>>,
}

/// Applies the current style to frames.
pub struct StyleEngine {
    selection: RwLock<StyleSelection>,
}

impl StyleEngine {
    pub fn new() -> Self {
        Self {
            selection: RwLock::new(StyleSelection::default()),
        }
    }

    /// Replace the active selection. Last writer wins; a `None` reference
    /// keeps the previously uploaded asset.
    pub fn set_style(&self, name: &str, reference: Option<RgbImage>) {
        let mut selection = self.selection.write();
        let reference = reference
            .map(Arc::new)
            .or_else(|| selection.reference.clone());
        *selection = StyleSelection {
            name: name.to_string(),
            style: Style::parse(name),
            reference,
        };
        log::info!("Style set to {:?}", name);
    }

    pub fn selection(&self) -> StyleSelection {
        self.selection.read().clone()
    }

    /// Apply the selected style to a frame.
    ///
    /// Pure in its inputs plus the current selection; returns the input
    /// unchanged whenever there is nothing meaningful to do.
    pub fn apply(&self, frame: &Frame, region: Option<&FaceRegion>) -> Frame {
        let selection = self.selection();
        let Some(style) = selection.style else {
            return frame.clone();
        };
        let Some(region) = region else {
            return frame.clone();
        };
        let Some(rect) = region.clamped(frame.width(), frame.height()) else {
            return frame.clone();
        };

        let (w, h) = (frame.width(), frame.height());
        let mut out = frame.clone();
        let data = out.data_mut();

        match style {
            Style::QinShiHuang => {
                ops::blend_tint(data, w, rect, GOLD_TINT, 0.9, 0.1);
            }
            Style::Anime => {
                ops::box_blur_region(data, w, h, rect, 2);
                ops::emphasize_edges(data, w, h, rect, EDGE_THRESHOLD);
                ops::blend_tint(data, w, rect, PINK_TINT, 0.95, 0.05);
            }
            Style::Cinematic => {
                // Gated on a visible face, but graded across the whole frame
                ops::brightness_contrast(data, 1.1, 10.0);
                ops::vignette(data, w, h);
                ops::channel_gain(data, [1.05, 1.0, 1.1]);
            }
            Style::Realistic => {
                ops::smooth_sharpen_region(data, w, h, rect);
            }
        }

        out
    }
}

impl Default for StyleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: u32, h: u32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                data.push((x * 7 % 256) as u8);
                data.push((y * 13 % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        Frame::new(data, w, h, 0)
    }

    #[test]
    fn test_apply_without_region_is_identity() {
        let engine = StyleEngine::new();
        engine.set_style("Anime", None);
        let frame = gradient_frame(16, 16);
        let out = engine.apply(&frame, None);
        assert_eq!(out.data(), frame.data());
    }

    #[test]
    fn test_apply_zero_area_region_is_identity_for_all_styles() {
        let frame = gradient_frame(16, 16);
        let region = FaceRegion::new(4, 4, 0, 8);
        for name in ["Qin Shi Huang", "Anime", "Cinematic", "Realistic"] {
            let engine = StyleEngine::new();
            engine.set_style(name, None);
            let out = engine.apply(&frame, Some(&region));
            assert_eq!(out.data(), frame.data(), "style {} modified the frame", name);
        }
    }

    #[test]
    fn test_apply_unknown_style_is_identity() {
        let engine = StyleEngine::new();
        engine.set_style("Van Gogh", None);
        let frame = gradient_frame(16, 16);
        let region = FaceRegion::new(2, 2, 10, 10);
        let out = engine.apply(&frame, Some(&region));
        assert_eq!(out.data(), frame.data());
    }

    #[test]
    fn test_no_style_selected_is_identity() {
        let engine = StyleEngine::new();
        let frame = gradient_frame(8, 8);
        let region = FaceRegion::new(0, 0, 8, 8);
        let out = engine.apply(&frame, Some(&region));
        assert_eq!(out.data(), frame.data());
    }

    #[test]
    fn test_tint_changes_only_region_with_exact_blend() {
        let engine = StyleEngine::new();
        engine.set_style("Qin Shi Huang", None);

        let frame = gradient_frame(200, 200);
        let region = FaceRegion::new(0, 0, 100, 100);
        let out = engine.apply(&frame, Some(&region));

        for y in 0..200u32 {
            for x in 0..200u32 {
                let i = ((y * 200 + x) * 3) as usize;
                if x < 100 && y < 100 {
                    for c in 0..3 {
                        let expected = (frame.data()[i + c] as f32 * 0.9
                            + GOLD_TINT[c] as f32 * 0.1)
                            .round()
                            .clamp(0.0, 255.0) as u8;
                        assert_eq!(out.data()[i + c], expected);
                    }
                } else {
                    assert_eq!(&out.data()[i..i + 3], &frame.data()[i..i + 3]);
                }
            }
        }
    }

    #[test]
    fn test_region_outside_frame_is_identity() {
        let engine = StyleEngine::new();
        engine.set_style("Realistic", None);
        let frame = gradient_frame(16, 16);
        let region = FaceRegion::new(100, 100, 50, 50);
        let out = engine.apply(&frame, Some(&region));
        assert_eq!(out.data(), frame.data());
    }

    #[test]
    fn test_set_style_keeps_reference_when_not_replaced() {
        let engine = StyleEngine::new();
        let reference = RgbImage::new(4, 4);
        engine.set_style("Realistic", Some(reference));
        engine.set_style("Anime", None);
        assert!(engine.selection().reference.is_some());
    }

    #[test]
    fn test_concurrent_set_style_yields_one_full_selection() {
        let engine = Arc::new(StyleEngine::new());
        let a = {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    engine.set_style("Cinematic", None);
                }
            })
        };
        let b = {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    engine.set_style("Anime", None);
                }
            })
        };

        // Observed selections must always be internally consistent
        for _ in 0..200 {
            let selection = engine.selection();
            if !selection.name.is_empty() {
                assert_eq!(selection.style, Style::parse(&selection.name));
            }
        }

        a.join().unwrap();
        b.join().unwrap();

        let final_selection = engine.selection();
        assert!(matches!(
            final_selection.name.as_str(),
            "Cinematic" | "Anime"
        ));
        assert_eq!(final_selection.style, Style::parse(&final_selection.name));
    }
}
