/// Line registry for the CUGN glider transects.
///
/// Defines the canonical list of survey lines occupied by Spray gliders,
/// along with the endpoints used to project samples onto cross-shelf
/// distance. Endpoints are approximate positions of the coastal and
/// outermost CalCOFI stations on each line, rounded from charts. This is the single source of truth for line labels; other
/// modules should reference lines from here rather than hardcoding them.

use crate::model::{CugnError, Result};

// ---------------------------------------------------------------------------
// Line metadata
// ---------------------------------------------------------------------------

/// Metadata for a single glider line.
#[derive(Debug)]
pub struct Line {
    /// CalCOFI line number as a label, e.g. "90.0".
    pub label: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Inshore endpoint (lon, lat), WGS84. Distance is measured from here.
    pub inshore: (f64, f64),
    /// Offshore endpoint (lon, lat), WGS84.
    pub offshore: (f64, f64),
}

impl Line {
    /// Two-character tag used in data file names ("90.0" -> "90").
    pub fn file_tag(&self) -> &'static str {
        &self.label[..2]
    }

    /// Integer tag used by annual-cycle tables ("66.7" -> "66").
    pub fn anncyc_tag(&self) -> String {
        self.label
            .split('.')
            .next()
            .unwrap_or(self.label)
            .to_string()
    }
}

/// All CUGN lines, ordered north to south.
pub static LINE_REGISTRY: &[Line] = &[
    Line {
        label: "56.0",
        name: "Line 56.0 (Point Reyes)",
        description: "Northernmost line, off Bodega Bay and Point Reyes.",
        inshore: (-123.328, 38.502),
        offshore: (-126.204, 37.186),
    },
    Line {
        label: "66.7",
        name: "Line 66.7 (Monterey Bay)",
        description: "Runs offshore from Monterey Bay across the shelf break.",
        inshore: (-121.8371, 36.8907),
        offshore: (-124.2000, 35.7900),
    },
    Line {
        label: "80.0",
        name: "Line 80.0 (Point Conception)",
        description: "Runs southwest from Point Conception. Occupations \
                      that strayed east of the line are blanked upstream.",
        inshore: (-120.4773, 34.4703),
        offshore: (-123.9100, 32.8200),
    },
    Line {
        label: "90.0",
        name: "Line 90.0 (Dana Point)",
        description: "Southern California Bight line from Dana Point. \
                      Mission 63 (Mexican waters) is excluded upstream.",
        inshore: (-117.7475, 33.5009),
        offshore: (-124.0000, 30.4200),
    },
];

/// Returns every registered line label.
pub fn all_line_labels() -> Vec<&'static str> {
    LINE_REGISTRY.iter().map(|l| l.label).collect()
}

/// Looks up a line by label. Returns `None` if not found.
pub fn find_line(label: &str) -> Option<&'static Line> {
    LINE_REGISTRY.iter().find(|l| l.label == label)
}

/// Like `find_line`, but an unknown label is an error.
pub fn line(label: &str) -> Result<&'static Line> {
    find_line(label).ok_or_else(|| CugnError::UnknownLine(label.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_labels_are_calcofi_format() {
        // Labels are "NN.N"; file names rely on the first two characters.
        for line in LINE_REGISTRY {
            assert_eq!(line.label.len(), 4, "label '{}' should be NN.N", line.label);
            assert!(
                line.label.parse::<f64>().is_ok(),
                "label '{}' should be numeric",
                line.label
            );
        }
    }

    #[test]
    fn test_no_duplicate_labels() {
        let mut seen = std::collections::HashSet::new();
        for line in LINE_REGISTRY {
            assert!(
                seen.insert(line.label),
                "duplicate line '{}' found in LINE_REGISTRY",
                line.label
            );
        }
    }

    #[test]
    fn test_offshore_endpoint_is_west_of_inshore() {
        for line in LINE_REGISTRY {
            assert!(
                line.offshore.0 < line.inshore.0,
                "offshore end of '{}' should be further west",
                line.label
            );
        }
    }

    #[test]
    fn test_find_line_returns_correct_entry() {
        let l = find_line("90.0").expect("line 90 should be registered");
        assert!(l.name.contains("Dana Point"));
        assert_eq!(l.file_tag(), "90");
        assert_eq!(l.anncyc_tag(), "90");
    }

    #[test]
    fn test_anncyc_tag_truncates_fractional_label() {
        assert_eq!(line("66.7").unwrap().anncyc_tag(), "66");
    }

    #[test]
    fn test_unknown_line_is_an_error() {
        assert!(find_line("99.0").is_none());
        assert!(matches!(line("99.0"), Err(CugnError::UnknownLine(_))));
    }

    #[test]
    fn test_all_line_labels_matches_registry_length() {
        assert_eq!(all_line_labels().len(), LINE_REGISTRY.len());
    }
}
