//! One-rep-max estimation
//!
//! Brzycki up to 10 reps, Epley from 11 to 20, and a conservative
//! extrapolation beyond that.

use crate::models::{ExerciseSet, WorkoutLog};
use std::collections::HashMap;

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Brzycki estimate, `w · 36 / (37 − r)` (reps capped at 30)
pub fn brzycki_1rm(weight: f64, reps: u32, is_amrap: bool) -> f64 {
    if weight <= 0.0 || reps == 0 {
        return 0.0;
    }
    if reps == 1 {
        return weight;
    }
    let r = reps.min(30) as f64;
    let mut e1rm = weight * (36.0 / (37.0 - r));
    if is_amrap && reps > 3 {
        e1rm *= 1.025;
    }
    round_tenth(e1rm)
}

/// Epley estimate, `w · (1 + r/30)`
pub fn epley_1rm(weight: f64, reps: u32) -> f64 {
    if weight <= 0.0 || reps == 0 {
        return 0.0;
    }
    if reps == 1 {
        return weight;
    }
    round_tenth(weight * (1.0 + reps as f64 / 30.0))
}

/// Hybrid estimate used across the crate. AMRAP sets above 3 reps get a 2.5%
/// bump since the athlete stopped at true failure.
pub fn hybrid_1rm(weight: f64, reps: u32, is_amrap: bool) -> f64 {
    if weight <= 0.0 || reps == 0 {
        return 0.0;
    }
    if reps == 1 {
        return weight;
    }
    let r = reps.min(50) as f64;
    let mut e1rm = if r <= 10.0 {
        weight * (36.0 / (37.0 - r))
    } else if r <= 20.0 {
        weight * (1.0 + r / 30.0)
    } else {
        weight * (1.0 + 20.0 / 30.0) * (1.0 + (r - 20.0) / 80.0).powf(0.9)
    };
    if is_amrap && reps > 3 {
        e1rm *= 1.025;
    }
    round_tenth(e1rm)
}

/// Inverse of [`hybrid_1rm`]: working weight for `reps` at a given 1RM
pub fn weight_from_1rm(e1rm: f64, reps: u32) -> f64 {
    if e1rm <= 0.0 || reps == 0 {
        return 0.0;
    }
    if reps == 1 {
        return e1rm;
    }
    let r = reps.min(50) as f64;
    let weight = if r <= 10.0 {
        e1rm * ((37.0 - r) / 36.0)
    } else if r <= 20.0 {
        e1rm / (1.0 + r / 30.0)
    } else {
        e1rm / (1.0 + 20.0 / 30.0) / (1.0 + (r - 20.0) / 80.0).powf(0.9)
    };
    round_tenth(weight).max(0.0)
}

/// Estimated 1RM of a single completed set
pub fn set_1rm(set: &ExerciseSet) -> f64 {
    hybrid_1rm(set.load(), set.reps(), set.is_amrap)
}

/// Best estimated 1RM per exercise across a history, keyed by lowercase name
pub fn best_1rm_by_exercise(history: &[WorkoutLog]) -> HashMap<String, f64> {
    let mut best: HashMap<String, f64> = HashMap::new();

    for log in history {
        for exercise in &log.completed_exercises {
            let key = exercise.exercise_name.trim().to_lowercase();
            for set in &exercise.sets {
                let e1rm = set_1rm(set);
                if e1rm > 0.0 {
                    let entry = best.entry(key.clone()).or_insert(0.0);
                    if e1rm > *entry {
                        *entry = e1rm;
                    }
                }
            }
        }
    }

    best
}
