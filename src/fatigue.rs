//! Set-level fatigue cost model
//!
//! Every set is priced in three currencies: local muscular stress, central
//! nervous load and axial (spinal) load. The exercise cost coefficients come
//! from the catalog when present and otherwise from movement-pattern rules
//! applied to the exercise name.

use crate::models::{ExerciseMuscleInfo, ExerciseSet, ExerciseType, MuscleRole, Session};
use crate::resolver::ExerciseIndex;
use serde::{Deserialize, Serialize};

/// RPE assumed when a set carries no intensity data
pub const DEFAULT_RPE: f64 = 7.0;

/// Minimum effective RPE for a set to count toward volume
pub const EFFECTIVE_RPE_THRESHOLD: f64 = 6.0;

/// Rest assumed between sets when none is programmed
pub const DEFAULT_REST_SECONDS: f64 = 90.0;

/// Exercise cost coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseCost {
    /// Local fatigue (1-5)
    pub efc: f64,
    /// Spinal/structural (0-2)
    pub ssc: f64,
    /// Central nervous (1-5)
    pub cnc: f64,
}

impl ExerciseCost {
    fn for_type(exercise_type: Option<ExerciseType>) -> Self {
        match exercise_type {
            Some(ExerciseType::Basic) => Self { efc: 4.0, ssc: 1.0, cnc: 4.0 },
            Some(ExerciseType::Accessory) => Self { efc: 2.5, ssc: 0.1, cnc: 2.5 },
            _ => Self { efc: 1.5, ssc: 0.1, cnc: 1.5 },
        }
    }
}

fn set_pattern(cost: &mut ExerciseCost, efc: f64, ssc: f64, cnc: f64) {
    cost.efc = efc;
    cost.ssc = ssc;
    cost.cnc = cnc;
}

/// Cost coefficients for an exercise. Explicit catalog values win; missing
/// ones are derived from the exercise type, the movement pattern in the name
/// and equipment/technique modifiers.
pub fn exercise_cost(info: Option<&ExerciseMuscleInfo>, name_hint: Option<&str>) -> ExerciseCost {
    let mut cost = ExerciseCost::for_type(info.map(|i| i.exercise_type));

    let info = match info {
        Some(info) => info,
        None => return cost,
    };

    if let (Some(efc), Some(ssc), Some(cnc)) = (info.efc, info.ssc, info.cnc) {
        return ExerciseCost { efc, ssc, cnc };
    }

    let name = name_hint.unwrap_or(&info.name).to_lowercase();
    let has = |needle: &str| name.contains(needle);

    if has("peso muerto") || has("deadlift") {
        set_pattern(&mut cost, 5.0, 2.0, 5.0);
        if has("rumano") || has("rdl") {
            set_pattern(&mut cost, 4.2, 1.8, 4.0);
        }
        if has("sumo") {
            set_pattern(&mut cost, 4.8, 1.6, 4.8);
        }
    } else if has("sentadilla") || has("squat") {
        set_pattern(&mut cost, 4.5, 1.5, 4.5);
        if has("frontal") || has("front") {
            set_pattern(&mut cost, 4.2, 1.2, 4.5);
        }
        if has("búlgara") || has("bulgarian") {
            set_pattern(&mut cost, 3.8, 0.8, 3.5);
        }
        if has("hack") {
            set_pattern(&mut cost, 3.5, 0.4, 3.0);
        }
    } else if has("press militar") || has("ohp") {
        set_pattern(&mut cost, 4.0, 1.5, 4.2);
    } else if has("press banca") || has("bench press") {
        set_pattern(&mut cost, 3.8, 0.3, 3.8);
    } else if has("dominada") || has("pull-up") {
        set_pattern(&mut cost, 4.0, 0.2, 4.0);
    } else if has("remo") || has("row") {
        set_pattern(&mut cost, 4.2, 1.6, 4.0);
        if has("seal") || has("pecho apoyado") {
            set_pattern(&mut cost, 3.2, 0.1, 2.5);
        }
    } else if has("hip thrust") || has("puente") {
        set_pattern(&mut cost, 3.5, 0.5, 3.0);
    } else if has("clean") || has("snatch") {
        set_pattern(&mut cost, 4.8, 1.8, 5.0);
    }

    if has("mancuerna") || info.equipment == "Mancuerna" {
        cost.cnc = (cost.cnc + 0.2).min(5.0);
        cost.ssc = (cost.ssc - 0.2).max(0.0);
    } else if has("smith") || has("multipower") {
        cost.cnc = (cost.cnc - 0.5).max(1.0);
        cost.efc = (cost.efc - 0.2).max(1.0);
    } else if has("polea") || has("cable") || info.equipment == "Polea" {
        cost.cnc = (cost.cnc - 0.3).max(1.0);
        cost.efc = (cost.efc + 0.2).min(5.0);
    }

    if has("pausa") || has("paused") {
        cost.cnc = (cost.cnc + 0.3).min(5.0);
        cost.efc = (cost.efc + 0.5).min(5.0);
    }
    if has("déficit") || has("deficit") {
        cost.ssc = (cost.ssc + 0.2).min(2.0);
        cost.efc = (cost.efc + 0.3).min(5.0);
    }
    if has("parcial") || has("rack pull") || has("block") {
        cost.ssc = (cost.ssc + 0.2).min(2.0);
        cost.efc = (cost.efc - 0.2).max(1.0);
    }

    // explicit single coefficients still override the derived ones
    if let Some(efc) = info.efc {
        cost.efc = efc;
    }
    if let Some(ssc) = info.ssc {
        cost.ssc = ssc;
    }
    if let Some(cnc) = info.cnc {
        cost.cnc = cnc;
    }

    cost
}

/// Effective RPE of a set. Failure counts as 11 and intensity techniques
/// push the value past 10.
pub fn effective_rpe(set: &ExerciseSet) -> f64 {
    let mut base = set
        .completed_rpe
        .or(set.target_rpe)
        .or_else(|| set.completed_rir.map(|rir| 10.0 - rir))
        .or_else(|| set.target_rir.map(|rir| 10.0 - rir))
        .unwrap_or(DEFAULT_RPE);

    if set.is_failure || set.is_amrap {
        base = base.max(11.0);
    }

    let mut technique_bonus = set.drop_sets.len() as f64 * 1.5 + set.rest_pauses.len() as f64;
    if set.partial_reps > 0 {
        technique_bonus += 0.5;
    }

    if technique_bonus > 0.0 && base < 10.0 {
        base = 10.0;
    }

    base + technique_bonus
}

/// A set counts toward volume when it is close enough to failure and was not
/// flagged as ineffective
pub fn is_set_effective(set: &ExerciseSet) -> bool {
    !set.is_ineffective && effective_rpe(set) >= EFFECTIVE_RPE_THRESHOLD
}

fn rest_factor(rest_seconds: f64, rpe: f64) -> f64 {
    let mut rest = rest_seconds;
    if rpe > 9.0 {
        rest += ((rpe - 9.0) * 31.25).min(120.0);
    }

    if rest <= 0.0 {
        1.0
    } else if rest <= 30.0 {
        1.4
    } else if rest < 60.0 {
        1.2
    } else if rest >= 120.0 {
        (1.0 - (rest - 120.0) * 0.0015).max(0.8)
    } else {
        1.0
    }
}

/// Local stress of one set for a muscle acting in `role`, rounded to 0.1
///
/// `volume^0.65 · intensity · EFC · rest factor · role coefficient`
pub fn set_stress(set: &ExerciseSet, info: Option<&ExerciseMuscleInfo>, rest_seconds: f64, role: MuscleRole) -> f64 {
    let rpe = effective_rpe(set);
    let efc = exercise_cost(info, None).efc;

    let extra_reps: u32 = set.drop_sets.iter().map(|d| d.reps).sum::<u32>()
        + set.rest_pauses.iter().map(|r| r.reps).sum::<u32>();
    let volume = set.reps() as f64 + set.partial_reps as f64 * 0.5 + extra_reps as f64;
    if volume <= 0.0 {
        return 0.0;
    }

    let intensity = if rpe > 10.0 { (rpe / 10.0).powf(1.5) } else { rpe / 10.0 };

    let raw = volume.powf(0.65) * intensity * efc * rest_factor(rest_seconds, rpe) * role.fatigue_multiplier();
    (raw * 10.0).round() / 10.0
}

/// Axial load of one set: `weight · reps · SSC · posture`. With no weight
/// entered yet the load is predicted from the target RPE.
pub fn spinal_score(set: &ExerciseSet, info: Option<&ExerciseMuscleInfo>, name_hint: Option<&str>) -> f64 {
    let ssc = exercise_cost(info, name_hint).ssc;
    if ssc <= 0.0 {
        return 0.0;
    }

    let weight = set.load();
    let reps = set.reps() as f64;
    let posture = info.and_then(|i| i.posture_factor).unwrap_or(1.0);

    let mut score = if weight == 0.0 {
        let rpe = set.target_rpe.unwrap_or(8.0);
        reps * ssc * 10.0 * (rpe / 8.0) * posture
    } else {
        weight * reps * ssc * posture
    };

    for drop in &set.drop_sets {
        let drop_weight = drop.weight.unwrap_or(weight);
        score += drop_weight * drop.reps as f64 * ssc * posture;
    }

    let rpe = effective_rpe(set);
    if rpe >= 10.0 && ssc >= 1.2 {
        score *= 1.5 * (rpe / 10.0).powi(2);
    }

    score
}

/// Maps a raw set stress onto a 1-10 scale (45 points = 10)
pub fn normalize_to_ten_scale(score: f64) -> f64 {
    let scaled = ((score / 45.0) * 10.0 * 10.0).round() / 10.0;
    scaled.clamp(1.0, 10.0)
}

/// Predicted drain of a planned session, as percentages of a full battery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDrain {
    pub cns_drain: f64,
    pub muscle_battery_drain: f64,
    pub spinal_drain: f64,
    pub total_spinal_score: f64,
}

/// Thresholds for a "full battery" worth of drain in a single session
const SESSION_CNS_CEILING: f64 = 280.0;
const SESSION_MUSCLE_CEILING: f64 = 350.0;
const SESSION_SPINAL_CEILING: f64 = 8000.0;

/// Estimate how much a planned session will drain each system
pub fn predicted_session_drain(session: &Session, index: &ExerciseIndex) -> SessionDrain {
    let mut cns_points = 0.0;
    let mut muscle_points = 0.0;
    let mut spinal_points = 0.0;

    for exercise in session.all_exercises() {
        let info = index.lookup(exercise.exercise_ref());
        let efc = exercise_cost(info, None).efc;
        let rest = exercise.rest_seconds.map(f64::from).unwrap_or(DEFAULT_REST_SECONDS);
        let one_rm = info.and_then(|i| i.calculated_1rm).filter(|rm| *rm > 0.0);

        for set in &exercise.sets {
            let stress = set_stress(set, info, rest, MuscleRole::Primary);
            muscle_points += stress;

            let intensity_factor = match (one_rm, set.weight.filter(|w| *w > 0.0)) {
                (Some(rm), Some(weight)) => {
                    let relative = weight / rm;
                    if relative > 0.85 {
                        1.6
                    } else if relative > 0.70 {
                        1.2
                    } else {
                        1.0
                    }
                }
                _ if effective_rpe(set) >= 9.0 => 1.4,
                _ => 1.0,
            };
            let structural_factor = if efc > 3.0 { 1.3 } else { 0.8 };
            cns_points += stress * intensity_factor * structural_factor;

            spinal_points += spinal_score(set, info, Some(&exercise.name));
        }
    }

    let percent = |points: f64, ceiling: f64| ((points / ceiling) * 100.0).min(100.0).round();

    SessionDrain {
        cns_drain: percent(cns_points, SESSION_CNS_CEILING),
        muscle_battery_drain: percent(muscle_points, SESSION_MUSCLE_CEILING),
        spinal_drain: percent(spinal_points, SESSION_SPINAL_CEILING),
        total_spinal_score: spinal_points.round(),
    }
}

/// Fatigue of an exercise on a 1-10 scale, from its hardest set
pub fn exercise_fatigue_scale(sets: &[ExerciseSet], info: Option<&ExerciseMuscleInfo>, rest_seconds: f64) -> f64 {
    sets.iter()
        .map(|s| set_stress(s, info, rest_seconds, MuscleRole::Primary))
        .fold(None, |max: Option<f64>, s| Some(max.map_or(s, |m| m.max(s))))
        .map(normalize_to_ten_scale)
        .unwrap_or(0.0)
}

/// Total local stress of a finished workout
pub fn completed_session_stress(exercises: &[crate::models::CompletedExercise], index: &ExerciseIndex) -> f64 {
    exercises
        .iter()
        .map(|ex| {
            let info = index.lookup(ex.exercise_ref());
            ex.sets
                .iter()
                .map(|s| set_stress(s, info, DEFAULT_REST_SECONDS, MuscleRole::Primary))
                .sum::<f64>()
        })
        .sum()
}

/// Acute:chronic workload ratio, last 7 days of stress against the weekly
/// average of the last 28. None while the chronic load is too small to mean
/// anything.
pub fn acute_chronic_ratio(
    history: &[crate::models::WorkoutLog],
    index: &ExerciseIndex,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<f64> {
    let mut acute = 0.0;
    let mut chronic_total = 0.0;

    for log in history.iter().filter(|l| l.date <= now) {
        let age = now - log.date;
        if age >= chrono::Duration::days(28) {
            continue;
        }
        let stress = completed_session_stress(&log.completed_exercises, index);
        chronic_total += stress;
        if age < chrono::Duration::days(7) {
            acute += stress;
        }
    }

    let chronic = chronic_total / 4.0;
    if chronic < 10.0 {
        return None;
    }
    Some((acute / chronic * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DropSet, PlannedExercise, RestPause};

    fn create_test_squat() -> ExerciseMuscleInfo {
        ExerciseMuscleInfo::new("sq", "Sentadilla Trasera")
            .with_type(ExerciseType::Basic)
            .with_muscle("Cuádriceps", MuscleRole::Primary, 1.0)
    }

    #[test]
    fn test_effective_rpe_sources() {
        assert_eq!(effective_rpe(&ExerciseSet::default()), DEFAULT_RPE);
        assert_eq!(effective_rpe(&ExerciseSet::completed(100.0, 5, Some(8.5))), 8.5);

        let rir = ExerciseSet { completed_rir: Some(2.0), ..ExerciseSet::default() };
        assert_eq!(effective_rpe(&rir), 8.0);

        let failure = ExerciseSet { is_failure: true, ..ExerciseSet::completed(100.0, 5, Some(9.0)) };
        assert_eq!(effective_rpe(&failure), 11.0);
    }

    #[test]
    fn test_effective_rpe_techniques() {
        let set = ExerciseSet {
            drop_sets: vec![DropSet { weight: Some(60.0), reps: 8 }],
            rest_pauses: vec![RestPause { reps: 3 }],
            ..ExerciseSet::completed(80.0, 10, Some(8.0))
        };
        // raised to 10, plus 1.5 + 1.0
        assert_eq!(effective_rpe(&set), 12.5);
    }

    #[test]
    fn test_set_effectiveness() {
        assert!(is_set_effective(&ExerciseSet::default()));
        assert!(!is_set_effective(&ExerciseSet::completed(50.0, 10, Some(5.0))));
        let flagged = ExerciseSet { is_ineffective: true, ..ExerciseSet::completed(50.0, 10, Some(9.0)) };
        assert!(!is_set_effective(&flagged));
    }

    #[test]
    fn test_exercise_cost_patterns() {
        let squat = create_test_squat();
        let cost = exercise_cost(Some(&squat), None);
        assert_eq!(cost.efc, 4.5);
        assert_eq!(cost.ssc, 1.5);

        let rdl = ExerciseMuscleInfo::new("rdl", "Peso Muerto Rumano");
        assert_eq!(exercise_cost(Some(&rdl), None).ssc, 1.8);

        let cable_row = ExerciseMuscleInfo::new("cr", "Remo en Polea");
        let cost = exercise_cost(Some(&cable_row), None);
        assert!((cost.cnc - 3.7).abs() < 1e-9);
        assert!((cost.efc - 4.4).abs() < 1e-9);

        let explicit = ExerciseMuscleInfo { efc: Some(2.0), ssc: Some(0.0), cnc: Some(1.0), ..create_test_squat() };
        assert_eq!(exercise_cost(Some(&explicit), None), ExerciseCost { efc: 2.0, ssc: 0.0, cnc: 1.0 });

        assert_eq!(exercise_cost(None, Some("Sentadilla")).efc, 1.5);
    }

    #[test]
    fn test_set_stress_scales_with_role_and_rest() {
        let squat = create_test_squat();
        let set = ExerciseSet::completed(100.0, 8, Some(8.0));

        let primary = set_stress(&set, Some(&squat), 90.0, MuscleRole::Primary);
        let secondary = set_stress(&set, Some(&squat), 90.0, MuscleRole::Secondary);
        let short_rest = set_stress(&set, Some(&squat), 20.0, MuscleRole::Primary);

        assert!(primary > 0.0);
        assert!(secondary < primary);
        assert!(short_rest > primary);
        assert_eq!(set_stress(&ExerciseSet::default(), Some(&squat), 90.0, MuscleRole::Primary), 0.0);
    }

    #[test]
    fn test_spinal_score() {
        let squat = create_test_squat();
        let set = ExerciseSet::completed(100.0, 5, Some(8.0));
        assert!((spinal_score(&set, Some(&squat), None) - 750.0).abs() < 1e-9);

        let curl = ExerciseMuscleInfo { ssc: Some(0.0), ..ExerciseMuscleInfo::new("c", "Curl") };
        assert_eq!(spinal_score(&set, Some(&curl), None), 0.0);

        // failure on a high-SSC lift compounds
        let grinder = ExerciseSet { is_failure: true, ..set };
        assert!(spinal_score(&grinder, Some(&squat), None) > 750.0 * 1.5);
    }

    #[test]
    fn test_predicted_session_drain_bounds() {
        let index = ExerciseIndex::build(&[create_test_squat()]);
        let sets = (0..30).map(|_| ExerciseSet::completed(140.0, 5, Some(9.5))).collect();
        let session = Session::new("s", "Heavy", vec![PlannedExercise::new("Sentadilla Trasera", sets)]);

        let drain = predicted_session_drain(&session, &index);
        assert!(drain.cns_drain <= 100.0);
        assert_eq!(drain.spinal_drain, 100.0);
        assert!(drain.total_spinal_score > 8000.0);
    }

    #[test]
    fn test_fatigue_scale() {
        assert_eq!(exercise_fatigue_scale(&[], None, 90.0), 0.0);
        let sets = vec![ExerciseSet::completed(20.0, 12, Some(7.0))];
        let scale = exercise_fatigue_scale(&sets, None, 90.0);
        assert!((1.0..=10.0).contains(&scale));
    }

    #[test]
    fn test_acute_chronic_ratio() {
        use crate::models::{CompletedExercise, WorkoutLog};
        use chrono::{Duration, TimeZone, Utc};

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let index = ExerciseIndex::build(&[create_test_squat()]);
        let workout = |days_ago: i64| {
            WorkoutLog::new(
                format!("w{}", days_ago),
                now - Duration::days(days_ago),
                vec![CompletedExercise::new(
                    "Sentadilla Trasera",
                    (0..6).map(|_| ExerciseSet::completed(100.0, 5, Some(8.0))).collect(),
                )],
            )
        };

        assert_eq!(acute_chronic_ratio(&[], &index, now), None);

        // one session a week for four weeks is a steady load
        let steady: Vec<_> = [1, 8, 15, 22].into_iter().map(workout).collect();
        assert_eq!(acute_chronic_ratio(&steady, &index, now), Some(1.0));

        // everything in the last week
        let spike: Vec<_> = [1, 2, 3, 4].into_iter().map(workout).collect();
        assert_eq!(acute_chronic_ratio(&spike, &index, now), Some(4.0));
    }
}
