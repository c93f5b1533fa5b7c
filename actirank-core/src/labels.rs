//! Activity code lookup for the mHealth-style label set.

use serde::Serialize;

/// Integer activity code as produced by the classifier.
pub type ActivityCode = u32;

/// Reserved code for "no activity".
pub const NULL_ACTIVITY: ActivityCode = 0;

/// Display name used for codes absent from the map.
pub const UNKNOWN_ACTIVITY: &str = "Desconocido";

const ACTIVITIES: &[(ActivityCode, &str)] = &[
    (0, "Null/Nada"),
    (1, "De pie (Standing)"),
    (2, "Sentado (Sitting)"),
    (3, "Acostado (Lying)"),
    (4, "Caminando (Walking)"),
    (5, "Subiendo escaleras"),
    (6, "Doblando cintura"),
    (7, "Elevación brazos frontal"),
    (8, "Flexión rodillas"),
    (9, "Ciclismo"),
    (10, "Trotar (Jogging)"),
    (11, "Corriendo (Running)"),
    (12, "Saltando"),
];

/// Immutable code → name mapping.
#[derive(Debug, Clone, Copy)]
pub struct ActivityLabelMap {
    entries: &'static [(ActivityCode, &'static str)],
}

/// One row of the label map, for listing.
#[derive(Debug, Clone, Serialize)]
pub struct LabelEntry {
    pub code: ActivityCode,
    pub name: &'static str,
}

impl ActivityLabelMap {
    /// The process-wide label set (codes 0 to 12).
    pub const fn standard() -> Self {
        Self {
            entries: ACTIVITIES,
        }
    }

    pub fn get(&self, code: ActivityCode) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
    }

    /// Resolve a code, falling back to [`UNKNOWN_ACTIVITY`].
    pub fn name_of(&self, code: ActivityCode) -> &'static str {
        self.get(code).unwrap_or(UNKNOWN_ACTIVITY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<LabelEntry> {
        self.entries
            .iter()
            .map(|&(code, name)| LabelEntry { code, name })
            .collect()
    }
}

impl Default for ActivityLabelMap {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_map_covers_all_codes() {
        let map = ActivityLabelMap::standard();
        assert_eq!(map.len(), 13);
        for code in 0..=12 {
            assert!(map.get(code).is_some(), "missing code {code}");
        }
    }

    #[test]
    fn test_known_names() {
        let map = ActivityLabelMap::standard();
        assert_eq!(map.name_of(NULL_ACTIVITY), "Null/Nada");
        assert_eq!(map.name_of(4), "Caminando (Walking)");
        assert_eq!(map.name_of(12), "Saltando");
    }

    #[test]
    fn test_unknown_code_falls_back() {
        let map = ActivityLabelMap::standard();
        assert_eq!(map.get(13), None);
        assert_eq!(map.name_of(99), UNKNOWN_ACTIVITY);
    }
}
