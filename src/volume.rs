//! Weekly set volume per muscle group
//!
//! Sets are attributed to muscles through the exercise catalog. Primary
//! muscles receive direct sets, every other role receives indirect sets, and
//! sub-muscles are merged into their display groups at the end.

use crate::fatigue::is_set_effective;
use crate::hierarchy::{normalize_muscle_name, MuscleHierarchy};
use crate::models::{
    DetailedMuscleVolumeAnalysis, ExerciseVolume, IndirectExerciseVolume, MuscleRole, ProgramWeek, Session,
    WorkoutLog,
};
use crate::resolver::{aggregation_group_for, is_standalone, title_case, ExerciseIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// How non-primary roles are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    /// Only primary muscles receive sets
    Simple,
    /// Secondary, stabilizer and neutralizer roles receive indirect sets
    #[default]
    Complex,
}

impl std::str::FromStr for VolumeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(VolumeMode::Simple),
            "complex" => Ok(VolumeMode::Complex),
            _ => Err(format!("Invalid volume mode: {}", s)),
        }
    }
}

/// Volume aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub mode: VolumeMode,

    /// Rule used when matching granular muscles against a family
    pub family_match: crate::resolver::FamilyMatchRule,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            mode: VolumeMode::Complex,
            family_match: crate::resolver::FamilyMatchRule::Keyword,
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Insertion-ordered map keyed by normalized name; the first spelling seen is kept
#[derive(Debug)]
struct Ordered<T> {
    items: Vec<(String, T)>,
    positions: HashMap<String, usize>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Default> Ordered<T> {
    fn entry(&mut self, key: &str) -> &mut T {
        let normalized = normalize_muscle_name(key);
        let index = match self.positions.get(&normalized) {
            Some(&i) => i,
            None => {
                self.items.push((key.trim().to_string(), T::default()));
                self.positions.insert(normalized, self.items.len() - 1);
                self.items.len() - 1
            }
        };
        &mut self.items[index].1
    }
}

#[derive(Debug, Default)]
struct IndirectTotal {
    sets: f64,
    role: Option<MuscleRole>,
    activation: f64,
}

#[derive(Debug, Default)]
struct RawGroupTotals {
    direct: Ordered<f64>,
    indirect: Ordered<IndirectTotal>,
    frequency: f64,
    indirect_frequency: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SessionImpact {
    direct: f64,
    indirect: f64,
}

/// Computes per muscle group volume from sessions, weeks or workout logs
pub struct VolumeAggregator<'a> {
    index: &'a ExerciseIndex,
    hierarchy: &'a MuscleHierarchy,
    mode: VolumeMode,
}

impl<'a> VolumeAggregator<'a> {
    pub fn new(index: &'a ExerciseIndex, hierarchy: &'a MuscleHierarchy) -> Self {
        Self {
            index,
            hierarchy,
            mode: VolumeMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: VolumeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Average weekly volume over the given weeks
    pub fn aggregate_weeks(&self, weeks: &[ProgramWeek]) -> Vec<DetailedMuscleVolumeAnalysis> {
        self.aggregate(weeks.iter().map(|w| w.sessions.as_slice()), weeks.len())
    }

    /// Volume of a set of sessions treated as one week
    pub fn aggregate_sessions(&self, sessions: &[Session]) -> Vec<DetailedMuscleVolumeAnalysis> {
        if sessions.is_empty() {
            return Vec::new();
        }
        self.aggregate(std::iter::once(sessions), 1)
    }

    /// Volume of finished workouts treated as one week
    pub fn aggregate_logs(&self, logs: &[WorkoutLog]) -> Vec<DetailedMuscleVolumeAnalysis> {
        let sessions: Vec<Session> = logs.iter().map(Session::from).collect();
        self.aggregate_sessions(&sessions)
    }

    fn aggregate<'s>(
        &self,
        weeks: impl Iterator<Item = &'s [Session]>,
        week_count: usize,
    ) -> Vec<DetailedMuscleVolumeAnalysis> {
        if week_count == 0 {
            return Vec::new();
        }

        let mut totals: Ordered<RawGroupTotals> = Ordered::default();
        let mut session_count = 0;
        for sessions in weeks {
            for session in sessions {
                self.accumulate_session(session, &mut totals);
                session_count += 1;
            }
        }

        let raw = finish_raw_groups(totals, week_count as f64);
        let result = merge_into_display_groups(raw);

        info!(
            "Aggregated volume for {} muscle groups from {} sessions over {} weeks",
            result.len(),
            session_count,
            week_count
        );
        result
    }

    fn accumulate_session(&self, session: &Session, totals: &mut Ordered<RawGroupTotals>) {
        let mut impacts: Ordered<SessionImpact> = Ordered::default();

        for exercise in session.all_exercises() {
            let muscles = self.index.resolve(exercise.exercise_ref());
            if muscles.is_empty() {
                continue;
            }

            let effective_sets = exercise.sets.iter().filter(|s| is_set_effective(s)).count();
            if effective_sets == 0 {
                debug!("No effective sets for '{}'", exercise.name);
                continue;
            }
            let sets = effective_sets as f64;

            let exercise_name = if exercise.name.trim().is_empty() {
                self.index
                    .lookup(exercise.exercise_ref())
                    .map(|info| info.name.clone())
                    .unwrap_or_default()
            } else {
                exercise.name.clone()
            };

            // best role per raw group, so a muscle is never both direct and indirect
            let mut best: Ordered<Option<(MuscleRole, f64)>> = Ordered::default();
            for muscle in &muscles {
                let group = self.hierarchy.display_group(&muscle.muscle);

                let impact = impacts.entry(&group);
                match muscle.role {
                    MuscleRole::Primary => impact.direct = impact.direct.max(1.0),
                    MuscleRole::Secondary => impact.direct = impact.direct.max(0.5),
                    MuscleRole::Stabilizer | MuscleRole::Neutralizer => impact.indirect = 1.0,
                }

                if self.mode == VolumeMode::Simple && muscle.role != MuscleRole::Primary {
                    continue;
                }

                let slot = best.entry(&group);
                let replace = match slot {
                    Some((role, _)) => muscle.role.rank() > role.rank(),
                    None => true,
                };
                if replace {
                    *slot = Some((muscle.role, muscle.activation));
                }
            }

            for (group, choice) in best.items {
                let Some((role, activation)) = choice else { continue };
                let entry = totals.entry(&group);
                if role.is_direct() {
                    *entry.direct.entry(&exercise_name) += sets;
                } else {
                    let indirect = entry.indirect.entry(&exercise_name);
                    indirect.sets += sets;
                    if indirect.role.map_or(true, |r| role.rank() > r.rank()) {
                        indirect.role = Some(role);
                    }
                    indirect.activation = indirect.activation.max(activation);
                }
            }
        }

        for (group, impact) in impacts.items {
            let entry = totals.entry(&group);
            entry.frequency += impact.direct;
            if impact.direct == 0.0 {
                entry.indirect_frequency += impact.indirect;
            }
        }
    }
}

fn fractional_volume(direct: &[ExerciseVolume], indirect: &[IndirectExerciseVolume]) -> f64 {
    let direct_sets: f64 = direct.iter().map(|e| e.sets).sum();
    let indirect_sets: f64 = indirect.iter().map(|e| e.sets * e.role.hypertrophy_multiplier()).sum();
    round_tenth(direct_sets + indirect_sets)
}

fn finish_raw_groups(totals: Ordered<RawGroupTotals>, weeks: f64) -> Vec<DetailedMuscleVolumeAnalysis> {
    totals
        .items
        .into_iter()
        .map(|(group, raw)| {
            let direct: Vec<ExerciseVolume> = raw
                .direct
                .items
                .into_iter()
                .map(|(name, sets)| ExerciseVolume { name, sets: round_tenth(sets / weeks) })
                .collect();
            let indirect: Vec<IndirectExerciseVolume> = raw
                .indirect
                .items
                .into_iter()
                .map(|(name, total)| IndirectExerciseVolume {
                    name,
                    sets: round_tenth(total.sets / weeks),
                    role: total.role.unwrap_or(MuscleRole::Secondary),
                    activation_percentage: (total.activation * 100.0).round(),
                })
                .collect();

            DetailedMuscleVolumeAnalysis {
                muscle_group: group,
                display_volume: round_tenth(direct.iter().map(|e| e.sets).sum()),
                fractional_volume: fractional_volume(&direct, &indirect),
                direct_exercises: direct,
                indirect_exercises: indirect,
                frequency: round_tenth(raw.frequency / weeks),
                indirect_frequency: round_tenth(raw.indirect_frequency / weeks),
            }
        })
        .collect()
}

/// Keep the first occurrence of every exercise name
fn dedup_by_name<T: Clone>(items: impl Iterator<Item = T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(normalize_muscle_name(name(item)))).collect()
}

/// Merge raw groups into display groups, drop empty and "General" groups and
/// sort by direct volume
pub fn merge_into_display_groups(raw: Vec<DetailedMuscleVolumeAnalysis>) -> Vec<DetailedMuscleVolumeAnalysis> {
    let mut buckets: Ordered<Vec<DetailedMuscleVolumeAnalysis>> = Ordered::default();
    for item in raw {
        let key = if is_standalone(&item.muscle_group) {
            title_case(&item.muscle_group)
        } else {
            aggregation_group_for(&item.muscle_group)
                .map(str::to_string)
                .unwrap_or_else(|| item.muscle_group.clone())
        };
        buckets.entry(&key).push(item);
    }

    let mut merged: Vec<DetailedMuscleVolumeAnalysis> = buckets
        .items
        .into_iter()
        .map(|(group, members)| {
            let direct = dedup_by_name(
                members.iter().flat_map(|m| m.direct_exercises.iter().cloned()),
                |e| e.name.as_str(),
            );
            // an exercise already counted directly is not counted again as indirect
            let direct_names: HashSet<String> = direct.iter().map(|e| normalize_muscle_name(&e.name)).collect();
            let indirect = dedup_by_name(
                members
                    .iter()
                    .flat_map(|m| m.indirect_exercises.iter().cloned())
                    .filter(|e| !direct_names.contains(&normalize_muscle_name(&e.name))),
                |e| e.name.as_str(),
            );
            let max_of = |f: fn(&DetailedMuscleVolumeAnalysis) -> f64| {
                members.iter().map(f).fold(0.0_f64, f64::max)
            };

            DetailedMuscleVolumeAnalysis {
                muscle_group: group,
                display_volume: round_tenth(direct.iter().map(|e| e.sets).sum()),
                fractional_volume: fractional_volume(&direct, &indirect),
                frequency: max_of(|m| m.frequency),
                indirect_frequency: max_of(|m| m.indirect_frequency),
                direct_exercises: direct,
                indirect_exercises: indirect,
            }
        })
        .filter(|g| g.display_volume > 0.0 || !g.indirect_exercises.is_empty())
        .filter(|g| normalize_muscle_name(&g.muscle_group) != "general")
        .collect();

    merged.sort_by(|a, b| {
        b.display_volume
            .partial_cmp(&a.display_volume)
            .unwrap_or(Ordering::Equal)
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExerciseMuscleInfo, ExerciseSet, PlannedExercise};

    fn create_test_catalog() -> Vec<ExerciseMuscleInfo> {
        vec![
            ExerciseMuscleInfo::new("sq", "Sentadilla")
                .with_muscle("Cuádriceps", MuscleRole::Primary, 1.0)
                .with_muscle("Glúteos", MuscleRole::Secondary, 0.6)
                .with_muscle("Erectores Espinales", MuscleRole::Stabilizer, 0.3),
            ExerciseMuscleInfo::new("curl", "Curl")
                .with_muscle("Bíceps", MuscleRole::Primary, 1.0)
                .with_muscle("braquial", MuscleRole::Primary, 0.8),
            ExerciseMuscleInfo::new("lat", "Elevación Lateral")
                .with_muscle("deltoides-lateral", MuscleRole::Primary, 1.0),
            ExerciseMuscleInfo::new("walk", "Caminata").with_muscle("General", MuscleRole::Primary, 1.0),
            ExerciseMuscleInfo::new("hammer", "Curl Martillo")
                .with_muscle("Bíceps", MuscleRole::Primary, 1.0)
                .with_muscle("braquial", MuscleRole::Secondary, 0.6),
            ExerciseMuscleInfo::new("add", "Aducción en Máquina").with_muscle("Aductores", MuscleRole::Primary, 1.0),
            ExerciseMuscleInfo::new("copen", "Plancha Copenhague").with_muscle("aductores", MuscleRole::Primary, 1.0),
        ]
    }

    fn create_test_sets(count: usize, rpe: Option<f64>) -> Vec<ExerciseSet> {
        (0..count).map(|_| ExerciseSet::completed(60.0, 10, rpe)).collect()
    }

    fn find<'r>(result: &'r [DetailedMuscleVolumeAnalysis], group: &str) -> &'r DetailedMuscleVolumeAnalysis {
        result.iter().find(|g| g.muscle_group == group).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        assert!(aggregator.aggregate_weeks(&[]).is_empty());
        assert!(aggregator.aggregate_sessions(&[]).is_empty());
        assert!(aggregator.aggregate_logs(&[]).is_empty());
    }

    #[test]
    fn test_direct_and_indirect_partition() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::standard();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        let session = Session::new("s", "Pierna", vec![PlannedExercise::new("Sentadilla", create_test_sets(4, Some(8.0)))]);
        let result = aggregator.aggregate_sessions(&[session]);

        let quads = find(&result, "Cuádriceps");
        assert_eq!(quads.display_volume, 4.0);
        assert!(quads.indirect_exercises.is_empty());

        let glutes = find(&result, "Glúteos");
        assert_eq!(glutes.display_volume, 0.0);
        assert_eq!(glutes.indirect_exercises[0].sets, 4.0);
        assert_eq!(glutes.indirect_exercises[0].activation_percentage, 60.0);
        assert_eq!(glutes.fractional_volume, 2.0);
        assert_eq!(glutes.frequency, 0.5);

        let lower_back = find(&result, "Espalda Baja");
        assert_eq!(lower_back.indirect_exercises[0].sets, 4.0);
        assert_eq!(lower_back.frequency, 0.0);
        assert_eq!(lower_back.indirect_frequency, 1.0);

        assert_eq!(result[0].muscle_group, "Cuádriceps");
    }

    #[test]
    fn test_ineffective_sets_are_not_counted() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        let mut sets = create_test_sets(3, Some(8.0));
        sets.push(ExerciseSet::completed(40.0, 10, Some(4.0)));
        let session = Session::new("s", "Pierna", vec![PlannedExercise::new("Sentadilla", sets)]);

        let result = aggregator.aggregate_sessions(&[session]);
        assert_eq!(find(&result, "Cuádriceps").display_volume, 3.0);
    }

    #[test]
    fn test_simple_mode_ignores_secondary_roles() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy).with_mode(VolumeMode::Simple);

        let session = Session::new("s", "Pierna", vec![PlannedExercise::new("Sentadilla", create_test_sets(4, None))]);
        let result = aggregator.aggregate_sessions(&[session]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].muscle_group, "Cuádriceps");
    }

    #[test]
    fn test_same_exercise_merged_into_group_once() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        // Curl hits bíceps and braquial, both merged into Bíceps
        let session = Session::new("s", "Brazo", vec![PlannedExercise::new("Curl", create_test_sets(3, Some(9.0)))]);
        let result = aggregator.aggregate_sessions(&[session]);

        let biceps = find(&result, "Bíceps");
        assert_eq!(biceps.direct_exercises.len(), 1);
        assert_eq!(biceps.display_volume, 3.0);
    }

    #[test]
    fn test_group_names_match_regardless_of_case() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        let session = Session::new(
            "s",
            "Pierna",
            vec![
                PlannedExercise::new("Aducción en Máquina", create_test_sets(3, None)),
                PlannedExercise::new("Plancha Copenhague", create_test_sets(2, None)),
            ],
        );
        let result = aggregator.aggregate_sessions(&[session]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].muscle_group, "Aductores");
        assert_eq!(result[0].display_volume, 5.0);
        assert_eq!(result[0].direct_exercises.len(), 2);
    }

    #[test]
    fn test_direct_exercise_not_repeated_as_indirect() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        // braquial merges into Bíceps, where the same curl is already direct
        let session = Session::new("s", "Brazo", vec![PlannedExercise::new("Curl Martillo", create_test_sets(3, None))]);
        let result = aggregator.aggregate_sessions(&[session]);

        let biceps = find(&result, "Bíceps");
        assert_eq!(biceps.direct_exercises.len(), 1);
        assert!(biceps.indirect_exercises.is_empty());
        assert_eq!(biceps.fractional_volume, 3.0);
    }

    #[test]
    fn test_deltoid_standalone_and_general_dropped() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        let session = Session::new(
            "s",
            "Mixta",
            vec![
                PlannedExercise::new("Elevación Lateral", create_test_sets(4, None)),
                PlannedExercise::new("Caminata", create_test_sets(1, None)),
            ],
        );
        let result = aggregator.aggregate_sessions(&[session]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].muscle_group, "Deltoides Lateral");
    }

    #[test]
    fn test_weeks_are_averaged() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        let week = |sets: usize| ProgramWeek {
            id: format!("w{}", sets),
            name: "Semana".to_string(),
            sessions: vec![Session::new("s", "Pierna", vec![PlannedExercise::new("Sentadilla", create_test_sets(sets, None))])],
        };
        let result = aggregator.aggregate_weeks(&[week(3), week(4), week(4)]);

        let quads = find(&result, "Cuádriceps");
        assert_eq!(quads.display_volume, 3.7);
        assert_eq!(quads.frequency, 1.0);
    }

    #[test]
    fn test_unknown_exercise_contributes_nothing() {
        let index = ExerciseIndex::build(&create_test_catalog());
        let hierarchy = MuscleHierarchy::default();
        let aggregator = VolumeAggregator::new(&index, &hierarchy);

        let session = Session::new("s", "?", vec![PlannedExercise::new("Ejercicio Inventado", create_test_sets(5, None))]);
        assert!(aggregator.aggregate_sessions(&[session]).is_empty());
    }
}
