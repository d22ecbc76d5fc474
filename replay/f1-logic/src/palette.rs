// Driver color table loaded from static data with a positional fallback.

use std::collections::HashMap;

use log::warn;

use crate::model::RgbColor;

const DRIVER_COLORS_CSV: &str = include_str!("data/driver_colors.csv");

/// Used for drivers missing from the table, picked by load position.
pub const FALLBACK_COLORS: [RgbColor; 3] = [
    RgbColor::new(255, 0, 0),
    RgbColor::new(0, 0, 255),
    RgbColor::new(0, 128, 0),
];

/// Drawn wherever no dominant driver is known.
pub const UNKNOWN_COLOR: RgbColor = RgbColor::new(128, 128, 128);

#[derive(Debug, Clone, Default)]
pub struct DriverPalette {
    colors: HashMap<String, RgbColor>,
}

impl DriverPalette {
    pub fn builtin() -> Self {
        Self::from_csv(DRIVER_COLORS_CSV)
    }

    /// Reads `abbreviation,color` rows; malformed rows are skipped.
    pub fn from_csv(data: &str) -> Self {
        let mut colors = HashMap::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!("driver color csv parse failed: {}", err);
                    continue;
                }
            };
            let abbreviation = record.get(0).map(str::trim).filter(|v| !v.is_empty());
            let color = record.get(1).and_then(RgbColor::from_hex);
            match (abbreviation, color) {
                (Some(abbreviation), Some(color)) => {
                    colors.insert(abbreviation.to_ascii_uppercase(), color);
                }
                _ => warn!("ignoring driver color row {:?}", record),
            }
        }
        Self { colors }
    }

    pub fn get(&self, abbreviation: &str) -> Option<RgbColor> {
        self.colors.get(&abbreviation.to_ascii_uppercase()).copied()
    }

    pub fn color_for(&self, abbreviation: &str, index: usize) -> RgbColor {
        self.get(abbreviation)
            .unwrap_or(FALLBACK_COLORS[index % FALLBACK_COLORS.len()])
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let palette = DriverPalette::builtin();
        assert_eq!(palette.len(), 20);
        assert_eq!(palette.get("LEC"), Some(RgbColor::new(220, 0, 0)));
        assert_eq!(palette.get("nor"), Some(RgbColor::new(255, 135, 0)));
    }

    #[test]
    fn test_fallback_cycles_by_position() {
        let palette = DriverPalette::builtin();
        assert_eq!(palette.color_for("XXX", 0), FALLBACK_COLORS[0]);
        assert_eq!(palette.color_for("XXX", 1), FALLBACK_COLORS[1]);
        assert_eq!(palette.color_for("XXX", 2), FALLBACK_COLORS[2]);
        assert_eq!(palette.color_for("XXX", 3), FALLBACK_COLORS[0]);
        assert_eq!(palette.color_for("VER", 2), RgbColor::new(0x23, 0x32, 0x6a));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let palette = DriverPalette::from_csv("abbreviation,color\nAAA,#010203\nBBB,nothex\n,#ffffff\n");
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.get("aaa"), Some(RgbColor::new(1, 2, 3)));
    }
}
