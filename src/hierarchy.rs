//! Muscle hierarchy index
//!
//! Maps granular muscle names onto their parent group and body part. The
//! index is built once from a body-part document and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Canonical form used for every muscle name comparison: lowercase, trimmed,
/// with `-`, `_` and repeated whitespace collapsed into single spaces
pub fn normalize_muscle_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Entry of a body part list: a bare muscle or a parent with its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MuscleSubGroup {
    Single(String),
    Group(BTreeMap<String, Vec<String>>),
}

/// Serialized shape of a hierarchy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchyDocument {
    #[serde(alias = "bodyPartHierarchy")]
    pub body_part_hierarchy: BTreeMap<String, Vec<MuscleSubGroup>>,
}

/// Immutable muscle hierarchy with normalized lookup indexes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "HierarchyDocument", into = "HierarchyDocument")]
pub struct MuscleHierarchy {
    body_part_hierarchy: BTreeMap<String, Vec<MuscleSubGroup>>,
    child_to_parent: HashMap<String, String>,
    muscle_to_body_part: HashMap<String, String>,
}

impl From<HierarchyDocument> for MuscleHierarchy {
    fn from(doc: HierarchyDocument) -> Self {
        MuscleHierarchy::new(doc.body_part_hierarchy)
    }
}

impl From<MuscleHierarchy> for HierarchyDocument {
    fn from(hierarchy: MuscleHierarchy) -> Self {
        HierarchyDocument {
            body_part_hierarchy: hierarchy.body_part_hierarchy,
        }
    }
}

impl MuscleHierarchy {
    /// Build the lookup indexes. A child listed under two parents keeps the
    /// first parent seen.
    pub fn new(body_part_hierarchy: BTreeMap<String, Vec<MuscleSubGroup>>) -> Self {
        let mut child_to_parent = HashMap::new();
        let mut muscle_to_body_part = HashMap::new();

        for (body_part, entries) in &body_part_hierarchy {
            for entry in entries {
                match entry {
                    MuscleSubGroup::Single(muscle) => {
                        muscle_to_body_part
                            .entry(normalize_muscle_name(muscle))
                            .or_insert_with(|| body_part.clone());
                    }
                    MuscleSubGroup::Group(groups) => {
                        for (parent, children) in groups {
                            muscle_to_body_part
                                .entry(normalize_muscle_name(parent))
                                .or_insert_with(|| body_part.clone());

                            for child in children {
                                let key = normalize_muscle_name(child);
                                match child_to_parent.get(&key) {
                                    Some(existing) if existing != parent => {
                                        warn!(
                                            "Muscle '{}' listed under '{}' and '{}', keeping '{}'",
                                            child, existing, parent, existing
                                        );
                                    }
                                    Some(_) => {}
                                    None => {
                                        child_to_parent.insert(key.clone(), parent.clone());
                                    }
                                }
                                muscle_to_body_part.entry(key).or_insert_with(|| body_part.clone());
                            }
                        }
                    }
                }
            }
        }

        Self {
            body_part_hierarchy,
            child_to_parent,
            muscle_to_body_part,
        }
    }

    /// Parse a hierarchy from JSON, either wrapped in `bodyPartHierarchy` or bare
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let doc = if value.get("bodyPartHierarchy").is_some() || value.get("body_part_hierarchy").is_some() {
            serde_json::from_value::<HierarchyDocument>(value)?
        } else {
            HierarchyDocument {
                body_part_hierarchy: serde_json::from_value(value)?,
            }
        };
        Ok(doc.into())
    }

    /// Built-in hierarchy using the catalog's Spanish muscle names
    pub fn standard() -> Self {
        fn group(parent: &str, children: &[&str]) -> MuscleSubGroup {
            let mut map = BTreeMap::new();
            map.insert(parent.to_string(), children.iter().map(|c| c.to_string()).collect());
            MuscleSubGroup::Group(map)
        }
        fn single(name: &str) -> MuscleSubGroup {
            MuscleSubGroup::Single(name.to_string())
        }

        let mut body_parts = BTreeMap::new();
        body_parts.insert(
            "Pecho".to_string(),
            vec![group("Pectoral", &["Pectoral Mayor", "Pectoral Menor"])],
        );
        body_parts.insert(
            "Espalda".to_string(),
            vec![
                group("Dorsales", &["Dorsal Ancho", "Redondo Mayor"]),
                group("Trapecio", &["Romboides"]),
                group("Espalda Baja", &["Erectores Espinales", "Multífidos", "Cuadrado Lumbar"]),
            ],
        );
        body_parts.insert(
            "Hombros".to_string(),
            vec![
                single("Deltoides Anterior"),
                single("Deltoides Lateral"),
                single("Deltoides Posterior"),
            ],
        );
        body_parts.insert(
            "Brazos".to_string(),
            vec![
                group("Bíceps", &["Braquial", "Braquiorradial"]),
                single("Tríceps"),
                single("Antebrazo"),
            ],
        );
        body_parts.insert(
            "Piernas".to_string(),
            vec![
                single("Cuádriceps"),
                group("Isquiosurales", &["Bíceps Femoral", "Semitendinoso", "Semimembranoso"]),
                group("Glúteos", &["Glúteo Mayor", "Glúteo Medio", "Glúteo Menor"]),
                group("Pantorrillas", &["Gastrocnemio", "Sóleo"]),
                single("Aductores"),
            ],
        );
        body_parts.insert(
            "Core".to_string(),
            vec![group("Abdomen", &["Recto Abdominal", "Oblicuos", "Transverso Abdominal"])],
        );

        Self::new(body_parts)
    }

    /// Parent group of a muscle, if it is listed as a child
    pub fn parent_of(&self, muscle: &str) -> Option<&str> {
        self.child_to_parent
            .get(&normalize_muscle_name(muscle))
            .map(String::as_str)
    }

    /// Display group for a muscle: its parent when it has one, otherwise the
    /// muscle itself as given
    pub fn display_group(&self, muscle: &str) -> String {
        self.parent_of(muscle)
            .map(str::to_string)
            .unwrap_or_else(|| muscle.trim().to_string())
    }

    pub fn body_part_of(&self, muscle: &str) -> Option<&str> {
        self.muscle_to_body_part
            .get(&normalize_muscle_name(muscle))
            .map(String::as_str)
    }

    pub fn body_parts(&self) -> impl Iterator<Item = &String> {
        self.body_part_hierarchy.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.body_part_hierarchy.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEG_JSON: &str = r#"{
        "bodyPartHierarchy": {
            "Pierna": [
                {"Cuádriceps": ["vasto-lateral", "vasto-medial", "recto-femoral"]},
                "Aductores"
            ]
        }
    }"#;

    #[test]
    fn test_normalize_muscle_name() {
        assert_eq!(normalize_muscle_name("  Vasto-Lateral "), "vasto lateral");
        assert_eq!(normalize_muscle_name("espalda_baja"), "espalda baja");
        assert_eq!(normalize_muscle_name("Deltoides   Anterior"), "deltoides anterior");
    }

    #[test]
    fn test_parse_wrapped_document() {
        let hierarchy = MuscleHierarchy::from_json_str(LEG_JSON).unwrap();

        assert_eq!(hierarchy.parent_of("Vasto Lateral"), Some("Cuádriceps"));
        assert_eq!(hierarchy.parent_of("recto_femoral"), Some("Cuádriceps"));
        assert_eq!(hierarchy.parent_of("Aductores"), None);
        assert_eq!(hierarchy.display_group("Aductores"), "Aductores");
        assert_eq!(hierarchy.body_part_of("vasto-medial"), Some("Pierna"));
        assert_eq!(hierarchy.body_part_of("Cuádriceps"), Some("Pierna"));
    }

    #[test]
    fn test_parse_bare_document() {
        let hierarchy = MuscleHierarchy::from_json_str(r#"{"Brazo": [{"Bíceps": ["braquial"]}]}"#).unwrap();
        assert_eq!(hierarchy.display_group("Braquial"), "Bíceps");
    }

    #[test]
    fn test_duplicate_child_keeps_first_parent() {
        let mut body_parts = BTreeMap::new();
        let mut first = BTreeMap::new();
        first.insert("Bíceps".to_string(), vec!["braquial".to_string()]);
        let mut second = BTreeMap::new();
        second.insert("Antebrazo".to_string(), vec!["braquial".to_string()]);
        body_parts.insert(
            "Brazo".to_string(),
            vec![MuscleSubGroup::Group(first), MuscleSubGroup::Group(second)],
        );

        let hierarchy = MuscleHierarchy::new(body_parts);
        assert_eq!(hierarchy.parent_of("braquial"), Some("Bíceps"));
    }

    #[test]
    fn test_standard_hierarchy() {
        let hierarchy = MuscleHierarchy::standard();
        assert!(!hierarchy.is_empty());
        assert_eq!(hierarchy.display_group("glúteo medio"), "Glúteos");
        assert_eq!(hierarchy.display_group("Deltoides Lateral"), "Deltoides Lateral");
        assert_eq!(hierarchy.body_part_of("Sóleo"), Some("Piernas"));
    }

    #[test]
    fn test_serde_roundtrip_rebuilds_indexes() {
        let hierarchy = MuscleHierarchy::standard();
        let json = serde_json::to_string(&hierarchy).unwrap();
        let back: MuscleHierarchy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parent_of("Romboides"), Some("Trapecio"));
    }
}
