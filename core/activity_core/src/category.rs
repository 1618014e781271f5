use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used when the classifier was skipped or failed.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The three buckets every raw classifier label collapses into.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedCategory {
    Study,
    Entertainment,
    Others,
}

impl NormalizedCategory {
    pub const ALL: [NormalizedCategory; 3] = [
        NormalizedCategory::Study,
        NormalizedCategory::Entertainment,
        NormalizedCategory::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NormalizedCategory::Study => "study",
            NormalizedCategory::Entertainment => "entertainment",
            NormalizedCategory::Others => "others",
        }
    }
}

impl fmt::Display for NormalizedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a raw classifier label onto its canonical bucket.
///
/// Total over all strings and case-insensitive, but otherwise exact: padded
/// labels, the empty string and [`UNCATEGORIZED`] land in `Others`.
pub fn normalize(label: &str) -> NormalizedCategory {
    match label.to_lowercase().as_str() {
        "study" | "work" | "productivity" => NormalizedCategory::Study,
        "entertainment" | "gaming" | "social" => NormalizedCategory::Entertainment,
        _ => NormalizedCategory::Others,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_labels_map_to_study() {
        for label in ["study", "Work", "PRODUCTIVITY"] {
            assert_eq!(normalize(label), NormalizedCategory::Study, "{label}");
        }
    }

    #[test]
    fn entertainment_labels_map_to_entertainment() {
        for label in ["entertainment", "Gaming", "SOCIAL"] {
            assert_eq!(normalize(label), NormalizedCategory::Entertainment, "{label}");
        }
    }

    #[test]
    fn everything_else_is_others() {
        for label in [
            "",
            "other",
            UNCATEGORIZED,
            "news",
            "studying",
            "socials",
            " study ",
            "gaming\n",
        ] {
            assert_eq!(normalize(label), NormalizedCategory::Others, "{label}");
        }
    }

    #[test]
    fn serializes_lowercase() {
        let s = serde_json::to_string(&NormalizedCategory::Entertainment).unwrap();
        assert_eq!(s, "\"entertainment\"");
        assert_eq!(NormalizedCategory::Others.to_string(), "others");
    }
}
