use serde::{Deserialize, Serialize};

pub const CLAY: &str = "Clay";
pub const GRASS: &str = "Grass";
pub const HARD: &str = "Hard";
pub const HARD_INDOOR: &str = "Hardcourt indoor";
pub const HARD_OUTDOOR: &str = "Hardcourt outdoor";

/// Canonical surface plus whether the raw label was recognised at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceLabel {
    pub canonical: String,
    pub known: bool,
}

impl SurfaceLabel {
    pub fn is_indoor(&self) -> bool {
        is_indoor(&self.canonical)
    }
}

/// Canonical surface name for a provider label.
///
/// Clay variants ("Red clay", "Blue clay") collapse to `Clay`. Indoor and
/// outdoor hardcourt stay distinct unless `aggregate_indoor_outdoor` is set,
/// in which case both become `Hard`. Labels we don't recognise come back
/// unchanged.
pub fn normalize(raw_label: &str, aggregate_indoor_outdoor: bool) -> String {
    classify(raw_label, aggregate_indoor_outdoor).canonical
}

pub fn classify(raw_label: &str, aggregate_indoor_outdoor: bool) -> SurfaceLabel {
    let lower = raw_label.trim().to_lowercase();
    let known = |canonical: &str| SurfaceLabel {
        canonical: canonical.to_string(),
        known: true,
    };

    if lower.is_empty() {
        return SurfaceLabel {
            canonical: raw_label.to_string(),
            known: false,
        };
    }
    if lower.contains("clay") {
        return known(CLAY);
    }
    if lower.contains("grass") {
        return known(GRASS);
    }
    if lower.contains("hard") && lower.contains("indoor") {
        return known(if aggregate_indoor_outdoor {
            HARD
        } else {
            HARD_INDOOR
        });
    }
    if lower.contains("hard") && lower.contains("outdoor") {
        return known(if aggregate_indoor_outdoor {
            HARD
        } else {
            HARD_OUTDOOR
        });
    }
    if lower.contains("hard") {
        return known(HARD);
    }

    SurfaceLabel {
        canonical: raw_label.to_string(),
        known: false,
    }
}

/// True for surfaces that are only ever played under a roof.
pub fn is_indoor(canonical: &str) -> bool {
    canonical == HARD_INDOOR
}
