//! Exercise-to-muscle resolution
//!
//! Looks exercises up in the catalog (id first, then case-insensitive name),
//! decides whether a granular muscle belongs to a broader family, and knows
//! which sub-muscles are merged into each display group.

use crate::hierarchy::normalize_muscle_name;
use crate::models::{ExerciseMuscleInfo, InvolvedMuscle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Reference to a catalog exercise from a session or log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExerciseRef<'a> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> ExerciseRef<'a> {
    pub fn new(id: Option<&'a str>, name: Option<&'a str>) -> Self {
        Self { id, name }
    }

    pub fn by_name(name: &'a str) -> Self {
        Self { id: None, name: Some(name) }
    }
}

impl crate::models::PlannedExercise {
    pub fn exercise_ref(&self) -> ExerciseRef<'_> {
        ExerciseRef::new(self.exercise_db_id.as_deref(), Some(self.name.as_str()))
    }
}

impl crate::models::CompletedExercise {
    pub fn exercise_ref(&self) -> ExerciseRef<'_> {
        ExerciseRef::new(self.exercise_db_id.as_deref(), Some(self.exercise_name.as_str()))
    }
}

/// Catalog lookup index
#[derive(Debug, Clone, Default)]
pub struct ExerciseIndex {
    exercises: Vec<ExerciseMuscleInfo>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl ExerciseIndex {
    /// Index a catalog. Duplicate ids or names keep the first entry.
    pub fn build(catalog: &[ExerciseMuscleInfo]) -> Self {
        let mut index = Self {
            exercises: catalog.to_vec(),
            by_id: HashMap::with_capacity(catalog.len()),
            by_name: HashMap::with_capacity(catalog.len()),
        };

        for (i, exercise) in index.exercises.iter().enumerate() {
            if !exercise.id.is_empty() {
                index.by_id.entry(exercise.id.clone()).or_insert(i);
            }
            let name = exercise.name.trim().to_lowercase();
            if !name.is_empty() {
                index.by_name.entry(name).or_insert(i);
            }
        }

        index
    }

    /// Catalog entry for a reference
    pub fn lookup(&self, exercise: ExerciseRef<'_>) -> Option<&ExerciseMuscleInfo> {
        let by_id = exercise
            .id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.by_id.get(id));
        let by_name = || {
            exercise
                .name
                .map(|name| name.trim().to_lowercase())
                .and_then(|name| self.by_name.get(&name))
        };

        by_id.or_else(by_name).map(|&i| &self.exercises[i])
    }

    /// Involved muscles for a reference. Unknown exercises and entries without
    /// muscle data resolve to an empty list.
    pub fn resolve(&self, exercise: ExerciseRef<'_>) -> Vec<InvolvedMuscle> {
        match self.lookup(exercise) {
            Some(info) if !info.involved_muscles.is_empty() => info.involved_muscles.clone(),
            Some(info) => {
                debug!("Exercise '{}' has no muscle data, skipping", info.name);
                Vec::new()
            }
            None => {
                debug!(
                    "Exercise {:?}/{:?} not found in catalog",
                    exercise.id, exercise.name
                );
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

/// How a granular muscle name is matched against a broader family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyMatchRule {
    /// Normalized names must be identical
    Exact,
    /// Category keyword table, substring match for families without keywords
    #[default]
    Keyword,
    /// Bidirectional substring of normalized names
    Substring,
}

impl std::str::FromStr for FamilyMatchRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(FamilyMatchRule::Exact),
            "keyword" => Ok(FamilyMatchRule::Keyword),
            "substring" => Ok(FamilyMatchRule::Substring),
            _ => Err(format!("Invalid family match rule: {}", s)),
        }
    }
}

const FAMILY_KEYWORDS: &[(&str, &[&str])] = &[
    ("pectorales", &["pectoral", "pecho"]),
    ("dorsales", &["dorsal", "redondo mayor", "espalda alta", "lats"]),
    ("deltoides", &["deltoides", "hombro", "delts"]),
    ("bíceps", &["bíceps", "biceps", "braquial", "braquiorradial", "antebrazo"]),
    ("tríceps", &["tríceps", "triceps"]),
    ("cuádriceps", &["cuádriceps", "cuadriceps", "recto femoral", "vasto", "quads"]),
    (
        "isquiosurales",
        &[
            "isquiosurales",
            "isquiotibiales",
            "bíceps femoral",
            "semitendinoso",
            "semimembranoso",
            "femoral",
            "hamstrings",
        ],
    ),
    ("glúteos", &["glúteo", "gluteo", "glutes"]),
    ("pantorrillas", &["pantorrilla", "gemelo", "gastrocnemio", "sóleo", "soleo", "calves"]),
    (
        "abdomen",
        &["abdomen", "abdominal", "oblicuo", "recto abdominal", "core", "transverso", "abs"],
    ),
    (
        "espalda baja",
        &["erector", "espinal", "lumbar", "espalda baja", "cuadrado lumbar", "lower back"],
    ),
];

/// Whether `specific` (a catalog muscle name) belongs to `family`
pub fn muscle_in_family(specific: &str, family: &str, rule: FamilyMatchRule) -> bool {
    let specific = normalize_muscle_name(specific);
    let family = normalize_muscle_name(family);
    if specific.is_empty() || family.is_empty() {
        return false;
    }
    if specific == family {
        return true;
    }

    let substring = || specific.contains(&family) || family.contains(&specific);

    match rule {
        FamilyMatchRule::Exact => false,
        FamilyMatchRule::Substring => substring(),
        FamilyMatchRule::Keyword => {
            match FAMILY_KEYWORDS.iter().find(|(name, _)| *name == family) {
                Some((_, keywords)) => keywords.iter().any(|k| specific.contains(k)),
                None => substring(),
            }
        }
    }
}

/// Display groups and the sub-muscles merged into each
pub const AGGREGATION_GROUPS: &[(&str, &[&str])] = &[
    ("Cuádriceps", &["cuádriceps", "vasto lateral", "vasto medial", "vasto intermedio", "recto femoral"]),
    ("Isquiosurales", &["isquiosurales", "bíceps femoral", "semitendinoso", "semimembranoso"]),
    ("Glúteos", &["glúteos", "glúteo mayor", "glúteo medio", "glúteo menor"]),
    ("Pectoral", &["pectoral", "pectoral superior", "pectoral medio", "pectoral inferior", "pectoral mayor"]),
    (
        "Bíceps",
        &["bíceps", "cabeza larga bíceps", "cabeza corta bíceps", "braquial", "braquiorradial"],
    ),
    (
        "Tríceps",
        &["tríceps", "cabeza larga tríceps", "cabeza lateral tríceps", "cabeza medial tríceps"],
    ),
    ("Dorsales", &["dorsales", "espalda", "dorsal ancho", "redondo mayor"]),
    (
        "Trapecio",
        &["trapecio", "trapecio superior", "trapecio medio", "trapecio inferior", "romboides"],
    ),
    (
        "Espalda Baja",
        &["espalda baja", "erectores espinales", "multífidos", "cuadrado lumbar"],
    ),
    (
        "Abdomen",
        &["abdomen", "recto abdominal", "oblicuos", "transverso abdominal", "core"],
    ),
    ("Pantorrillas", &["pantorrillas", "gastrocnemio", "sóleo"]),
];

/// Deltoid portions are reported on their own and never merged
pub const STANDALONE_MUSCLES: &[&str] = &["deltoides anterior", "deltoides lateral", "deltoides posterior"];

pub fn is_standalone(muscle: &str) -> bool {
    STANDALONE_MUSCLES.contains(&normalize_muscle_name(muscle).as_str())
}

/// Display group a raw muscle group merges into, if any
pub fn aggregation_group_for(muscle: &str) -> Option<&'static str> {
    let normalized = normalize_muscle_name(muscle);
    if STANDALONE_MUSCLES.contains(&normalized.as_str()) {
        return None;
    }
    AGGREGATION_GROUPS
        .iter()
        .find(|(_, members)| members.contains(&normalized.as_str()))
        .map(|(group, _)| *group)
}

/// "deltoides-anterior" → "Deltoides Anterior"
pub fn title_case(muscle: &str) -> String {
    normalize_muscle_name(muscle)
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
