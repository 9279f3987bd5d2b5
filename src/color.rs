use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize, saturation: f32, lightness: f32) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, saturation, lightness);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: channel id → Color32
// ---------------------------------------------------------------------------

/// Maps overlay channel ids (`dataset_key / qualified channel name`) to
/// distinct colours so a channel keeps its colour as others are toggled.
#[derive(Debug, Clone, Default)]
pub struct ChannelColors {
    mapping: BTreeMap<String, Color32>,
}

impl ChannelColors {
    /// Rebuild the map for the given channel ids.
    pub fn rebuild<'a>(
        &mut self,
        ids: impl Iterator<Item = &'a str>,
        saturation: f32,
        lightness: f32,
    ) {
        let ids: Vec<&str> = ids.collect();
        let palette = generate_palette(ids.len(), saturation, lightness);
        self.mapping = ids
            .into_iter()
            .map(str::to_string)
            .zip(palette)
            .collect();
    }

    /// Look up the colour for a channel id.
    pub fn color_for(&self, id: &str) -> Color32 {
        self.mapping.get(id).copied().unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_distinct_and_sized() {
        let p = generate_palette(6, 0.75, 0.55);
        assert_eq!(p.len(), 6);
        for i in 0..p.len() {
            for j in (i + 1)..p.len() {
                assert_ne!(p[i], p[j]);
            }
        }
        assert!(generate_palette(0, 0.75, 0.55).is_empty());
    }

    #[test]
    fn channel_keeps_color_by_id() {
        let mut colors = ChannelColors::default();
        colors.rebuild(["a/x", "b/y"].into_iter(), 0.75, 0.55);
        let c = colors.color_for("a/x");
        assert_ne!(c, Color32::GRAY);
        assert_eq!(colors.color_for("a/x"), c);
        assert_eq!(colors.color_for("unknown"), Color32::GRAY);
    }
}
