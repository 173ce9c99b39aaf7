//! Recovery batteries
//!
//! Every logged workout drains three systems (central nervous, muscular and
//! spinal) by a per-session load. The remaining drain decays exponentially:
//!
//! - remaining = load · 0.5^(hours / half_life)
//! - battery = 100 − Σ remaining / capacity · 100, clamped to [0, 100]
//!
//! Sleep, life stress, nutrition, age and DOMS adjust the result, and every
//! adjustment is recorded in an audit log so the final number can be explained.
//! Per-muscle batteries use the same decay with muscle-specific recovery
//! windows and a capacity derived from the athlete's recent workload.

use crate::fatigue::{exercise_cost, set_stress, spinal_score};
use crate::models::{
    BatteryCalibration, BatterySystem, CalorieObjective, DailyWellbeingLog, Gender, IntensityLevel, MuscleRole,
    NutritionLog, PostSessionFeedback, Settings, SleepLog, WorkoutLog,
};
use crate::resolver::{muscle_in_family, ExerciseIndex, FamilyMatchRule};
use crate::strength::best_1rm_by_exercise;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::LN_2;
use tracing::{debug, info};

/// Decay parameters of one battery system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemDecay {
    pub half_life_hours: f64,
    /// Remaining load that empties the battery
    pub capacity: f64,
}

/// Hours to ~95% recovery for each muscle recovery profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryProfiles {
    pub fast: f64,
    pub medium: f64,
    pub slow: f64,
    pub heavy: f64,
}

impl Default for RecoveryProfiles {
    fn default() -> Self {
        Self {
            fast: 24.0,
            medium: 48.0,
            slow: 72.0,
            heavy: 96.0,
        }
    }
}

/// Recovery engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Workouts older than this are ignored
    pub history_window_days: u32,

    pub cns: SystemDecay,

    pub muscular: SystemDecay,

    pub spinal: SystemDecay,

    pub recovery_profiles: RecoveryProfiles,

    /// Window used to derive per-muscle work capacity
    pub capacity_window_days: u32,

    /// Rest assumed between logged sets, in seconds
    pub default_rest_seconds: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            history_window_days: 10,
            cns: SystemDecay {
                half_life_hours: 36.0,
                capacity: 400.0,
            },
            muscular: SystemDecay {
                half_life_hours: 48.0,
                capacity: 600.0,
            },
            spinal: SystemDecay {
                half_life_hours: 72.0,
                capacity: 10_000.0,
            },
            recovery_profiles: RecoveryProfiles::default(),
            capacity_window_days: 28,
            default_rest_seconds: crate::fatigue::DEFAULT_REST_SECONDS,
        }
    }
}

/// Exponential decay with a fixed half-life
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayCurve {
    half_life_hours: f64,
}

impl DecayCurve {
    pub fn new(half_life_hours: f64) -> Self {
        Self {
            half_life_hours: half_life_hours.max(1.0),
        }
    }

    /// Curve that leaves 5% of the load after `window_hours`
    pub fn from_recovery_window(window_hours: f64) -> Self {
        Self::new(window_hours * LN_2 / 20f64.ln())
    }

    /// Same curve with the half-life scaled by `multiplier` (floored at 0.5)
    pub fn stretched(self, multiplier: f64) -> Self {
        Self::new(self.half_life_hours * multiplier.max(0.5))
    }

    pub fn half_life_hours(&self) -> f64 {
        self.half_life_hours
    }

    pub fn remaining(&self, load: f64, hours: f64) -> f64 {
        load * 0.5f64.powf(hours.max(0.0) / self.half_life_hours)
    }

    /// Hours until `current` decays down to `target`
    pub fn hours_until(&self, current: f64, target: f64) -> f64 {
        if current <= target || target <= 0.0 {
            return 0.0;
        }
        self.half_life_hours * (current / target).log2()
    }
}

/// Everything the engine reads. All slices may be empty.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryInputs<'a> {
    pub history: &'a [WorkoutLog],
    pub sleep_logs: &'a [SleepLog],
    pub wellbeing_logs: &'a [DailyWellbeingLog],
    pub nutrition_logs: &'a [NutritionLog],
    pub post_session_feedback: &'a [PostSessionFeedback],
    pub settings: Option<&'a Settings>,
    pub index: &'a ExerciseIndex,
}

impl<'a> RecoveryInputs<'a> {
    pub fn new(history: &'a [WorkoutLog], index: &'a ExerciseIndex) -> Self {
        Self {
            history,
            sleep_logs: &[],
            wellbeing_logs: &[],
            nutrition_logs: &[],
            post_session_feedback: &[],
            settings: None,
            index,
        }
    }

    pub fn with_settings(mut self, settings: &'a Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_sleep(mut self, sleep_logs: &'a [SleepLog]) -> Self {
        self.sleep_logs = sleep_logs;
        self
    }

    pub fn with_wellbeing(mut self, wellbeing_logs: &'a [DailyWellbeingLog]) -> Self {
        self.wellbeing_logs = wellbeing_logs;
        self
    }

    pub fn with_nutrition(mut self, nutrition_logs: &'a [NutritionLog]) -> Self {
        self.nutrition_logs = nutrition_logs;
        self
    }

    pub fn with_feedback(mut self, post_session_feedback: &'a [PostSessionFeedback]) -> Self {
        self.post_session_feedback = post_session_feedback;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Workout,
    Bonus,
    Malus,
}

/// One contribution to a battery value, in percentage points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub label: String,
    pub val: f64,
    #[serde(rename = "type")]
    pub kind: AuditKind,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditLogs {
    pub cns: Vec<AuditEvent>,
    pub muscular: Vec<AuditEvent>,
    pub spinal: Vec<AuditEvent>,
}

/// Battery values of the three systems
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemValues {
    pub cns: f64,
    pub muscular: f64,
    pub spinal: f64,
}

impl SystemValues {
    pub fn full() -> Self {
        Self {
            cns: 100.0,
            muscular: 100.0,
            spinal: 100.0,
        }
    }

    pub fn get(&self, system: BatterySystem) -> f64 {
        match system {
            BatterySystem::Cns => self.cns,
            BatterySystem::Muscular => self.muscular,
            BatterySystem::Spinal => self.spinal,
        }
    }

    pub fn lowest(&self) -> f64 {
        self.cns.min(self.muscular).min(self.spinal)
    }
}

/// Training recommendation derived from the lowest battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Ready,
    Moderate,
    Rest,
}

impl Verdict {
    pub fn from_lowest(value: f64) -> Self {
        if value >= 70.0 {
            Verdict::Ready
        } else if value >= 40.0 {
            Verdict::Moderate
        } else {
            Verdict::Rest
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Ready => "Listo para entrenar duro",
            Verdict::Moderate => "Entrena con moderación",
            Verdict::Rest => "Prioriza el descanso",
        }
    }
}

/// System batteries with their audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReport {
    pub cns: f64,
    pub muscular: f64,
    pub spinal: f64,

    /// Values before manual calibration is applied
    pub raw: SystemValues,

    pub audit_logs: AuditLogs,

    pub verdict: Verdict,
}

impl BatteryReport {
    pub fn fully_recovered() -> Self {
        Self {
            cns: 100.0,
            muscular: 100.0,
            spinal: 100.0,
            raw: SystemValues::full(),
            audit_logs: AuditLogs::default(),
            verdict: Verdict::Ready,
        }
    }

    pub fn values(&self) -> SystemValues {
        SystemValues {
            cns: self.cns,
            muscular: self.muscular,
            spinal: self.spinal,
        }
    }

    /// Calibration that makes `system` read `user_value` now, keeping the other
    /// systems' deltas from `previous`
    pub fn calibrate(
        &self,
        system: BatterySystem,
        user_value: f64,
        at: DateTime<Utc>,
        previous: &BatteryCalibration,
    ) -> BatteryCalibration {
        previous.calibrated(system, self.raw.get(system), user_value, at)
    }
}

impl BatteryCalibration {
    pub fn delta(&self, system: BatterySystem) -> f64 {
        match system {
            BatterySystem::Cns => self.cns_delta,
            BatterySystem::Muscular => self.muscular_delta,
            BatterySystem::Spinal => self.spinal_delta,
        }
    }

    /// New calibration storing `computed − user_value` for one system
    pub fn calibrated(&self, system: BatterySystem, computed: f64, user_value: f64, at: DateTime<Utc>) -> Self {
        let delta = computed - user_value.clamp(0.0, 100.0);
        let mut next = self.clone();
        match system {
            BatterySystem::Cns => next.cns_delta = delta,
            BatterySystem::Muscular => next.muscular_delta = delta,
            BatterySystem::Spinal => next.spinal_delta = delta,
        }
        next.last_calibrated = Some(at);
        next
    }

    /// Display value for a freshly computed battery
    pub fn apply(&self, system: BatterySystem, computed: f64) -> f64 {
        clamp_percent(computed - self.delta(system))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuscleRecoveryStatus {
    Optimal,
    Recovering,
    Exhausted,
}

impl MuscleRecoveryStatus {
    pub fn from_score(score: f64) -> Self {
        if score < 40.0 {
            MuscleRecoveryStatus::Exhausted
        } else if score < 85.0 {
            MuscleRecoveryStatus::Recovering
        } else {
            MuscleRecoveryStatus::Optimal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MuscleRecoveryStatus::Optimal => "Óptimo",
            MuscleRecoveryStatus::Recovering => "Recuperando",
            MuscleRecoveryStatus::Exhausted => "Agotado",
        }
    }
}

/// Recovery state of a single muscle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleBatteryDetail {
    pub recovery_score: f64,
    /// Sets with primary (or strong secondary) involvement in the last 7 days
    pub effective_sets: usize,
    pub hours_since_last_session: Option<f64>,
    pub estimated_hours_to_recovery: f64,
    pub status: MuscleRecoveryStatus,
}

impl MuscleBatteryDetail {
    fn fresh() -> Self {
        Self {
            recovery_score: 100.0,
            effective_sets: 0,
            hours_since_last_session: None,
            estimated_hours_to_recovery: 0.0,
            status: MuscleRecoveryStatus::Optimal,
        }
    }
}

/// Muscle shown in the per-muscle battery list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedMuscle {
    pub id: &'static str,
    pub label: &'static str,
    pub is_deltoid_portion: bool,
}

const fn tracked(id: &'static str, label: &'static str) -> TrackedMuscle {
    TrackedMuscle {
        id,
        label,
        is_deltoid_portion: false,
    }
}

const fn deltoid(id: &'static str, label: &'static str) -> TrackedMuscle {
    TrackedMuscle {
        id,
        label,
        is_deltoid_portion: true,
    }
}

pub const TRACKED_MUSCLES: &[TrackedMuscle] = &[
    tracked("pectorales", "Pectorales"),
    tracked("dorsales", "Dorsales"),
    tracked("trapecio", "Trapecio"),
    tracked("espalda baja", "Espalda Baja"),
    deltoid("deltoides anterior", "Deltoides Anterior"),
    deltoid("deltoides lateral", "Deltoides Lateral"),
    deltoid("deltoides posterior", "Deltoides Posterior"),
    tracked("bíceps", "Bíceps"),
    tracked("tríceps", "Tríceps"),
    tracked("antebrazo", "Antebrazo"),
    tracked("abdomen", "Abdomen"),
    tracked("cuádriceps", "Cuádriceps"),
    tracked("isquiosurales", "Isquiosurales"),
    tracked("glúteos", "Glúteos"),
    tracked("pantorrillas", "Pantorrillas"),
    tracked("aductores", "Aductores"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryProfile {
    Fast,
    Medium,
    Slow,
    Heavy,
}

const MUSCLE_PROFILES: &[(&str, RecoveryProfile)] = &[
    ("bíceps", RecoveryProfile::Fast),
    ("tríceps", RecoveryProfile::Fast),
    ("deltoides", RecoveryProfile::Fast),
    ("pantorrillas", RecoveryProfile::Fast),
    ("abdomen", RecoveryProfile::Fast),
    ("antebrazo", RecoveryProfile::Fast),
    ("pectorales", RecoveryProfile::Medium),
    ("dorsales", RecoveryProfile::Medium),
    ("hombros", RecoveryProfile::Medium),
    ("trapecio", RecoveryProfile::Medium),
    ("cuádriceps", RecoveryProfile::Slow),
    ("glúteos", RecoveryProfile::Slow),
    ("aductores", RecoveryProfile::Medium),
    ("isquiosurales", RecoveryProfile::Heavy),
    ("espalda baja", RecoveryProfile::Heavy),
    ("erectores espinales", RecoveryProfile::Heavy),
    ("core", RecoveryProfile::Medium),
];

/// Total spinal load attributed to one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinalDrainEntry {
    pub exercise_name: String,
    pub total_spinal_drain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    Green,
    Yellow,
    Red,
}

/// Daily go / caution / stop signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReadiness {
    pub status: TrafficLight,
    pub stress_multiplier: f64,
    pub cns_battery: f64,
    pub diagnostics: Vec<String>,
    pub recommendation: String,
}

/// Nudges a personal recovery-rate multiplier toward how the athlete reports
/// feeling. Conservative: 0.5% per point of discrepancy.
pub fn learn_recovery_rate(current: f64, computed_score: f64, felt_score: f64) -> f64 {
    (current + (felt_score - computed_score) * 0.005).clamp(0.5, 2.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 100.0;
    }
    value.clamp(0.0, 100.0)
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds() as f64 / 3600.0).max(0.0)
}

fn push_audit(log: &mut Vec<AuditEvent>, label: impl Into<String>, val: f64, kind: AuditKind) {
    if val.abs() >= 0.05 {
        log.push(AuditEvent {
            label: label.into(),
            val: (val * 10.0).round() / 10.0,
            kind,
        });
    }
}

fn adjustment_kind(val: f64) -> AuditKind {
    if val >= 0.0 {
        AuditKind::Bonus
    } else {
        AuditKind::Malus
    }
}

/// Sleep, wellbeing and nutrition context for a computation
struct LifestyleSignals<'a> {
    /// None when sleep tracking is disabled
    weighted_sleep: Option<f64>,
    wellbeing: Option<&'a DailyWellbeingLog>,
    /// None when nutrition tracking is disabled
    nutrition: Option<CalorieObjective>,
}

const NEUTRAL_SLEEP_HOURS: f64 = 7.5;

impl<'a> LifestyleSignals<'a> {
    fn gather(inputs: &RecoveryInputs<'a>, settings: &Settings, now: DateTime<Utc>) -> Self {
        let weighted_sleep = settings
            .algorithm
            .sleep_tracking
            .then(|| weighted_sleep_hours(inputs.sleep_logs));

        let wellbeing = recent_wellbeing(inputs.wellbeing_logs, now);

        let nutrition = settings
            .algorithm
            .nutrition_tracking
            .then(|| nutrition_status(inputs.nutrition_logs, settings, now));

        Self {
            weighted_sleep,
            wellbeing,
            nutrition,
        }
    }

    fn sleep_rate(&self) -> f64 {
        match self.weighted_sleep {
            Some(h) if h < 6.0 => 1.5,
            Some(h) if h < 7.0 => 1.2,
            Some(h) if h >= 8.5 => 0.8,
            Some(h) if h >= 7.5 => 0.9,
            _ => 1.0,
        }
    }

    fn stress_rate(&self) -> f64 {
        match self.wellbeing {
            Some(w) if w.stress_level >= 4 => 1.4,
            _ => 1.0,
        }
    }

    fn nutrition_rate(&self) -> f64 {
        match self.nutrition {
            Some(CalorieObjective::Deficit) => 1.35,
            Some(CalorieObjective::Surplus) => 0.85,
            _ => 1.0,
        }
    }

    /// Half-life multiplier for muscular tissue
    fn muscular_rate(&self, settings: &Settings) -> f64 {
        (self.sleep_rate() * self.stress_rate() * self.nutrition_rate() * biological_rate(settings)).max(0.5)
    }

    /// Half-life multiplier for the spine
    fn spinal_rate(&self, settings: &Settings) -> f64 {
        (self.sleep_rate() * biological_rate(settings)).max(0.5)
    }

    /// CNS points lost (positive) or regained (negative) from sleep
    fn cns_sleep_penalty(&self) -> f64 {
        match self.weighted_sleep {
            Some(h) if h < 4.5 => 40.0,
            Some(h) if h < 5.5 => 25.0,
            Some(h) if h < 6.5 => 15.0,
            Some(h) if h >= 8.5 => -15.0,
            Some(h) if h > 7.5 => -5.0,
            _ => 0.0,
        }
    }

    fn life_stress_penalty(&self) -> f64 {
        let Some(w) = self.wellbeing else { return 0.0 };
        let mut penalty = 0.0;
        if w.stress_level >= 4 {
            penalty += 15.0;
        } else if w.stress_level == 3 {
            penalty += 5.0;
        }
        if w.work_intensity == Some(IntensityLevel::High) || w.study_intensity == Some(IntensityLevel::High) {
            penalty += 10.0;
        }
        penalty
    }

    /// Ceiling imposed by a demanding daily life
    fn background_cap(&self, settings: &Settings) -> f64 {
        let work = self
            .wellbeing
            .and_then(|w| w.work_intensity)
            .or(settings.user_vitals.work_intensity);
        let mut cap: f64 = 100.0;
        match work {
            Some(IntensityLevel::High) => cap -= 10.0,
            Some(IntensityLevel::Moderate) => cap -= 5.0,
            _ => {}
        }
        if self.wellbeing.map_or(false, |w| w.stress_level >= 4) {
            cap -= 10.0;
        }
        cap
    }

    fn doms_cap(&self) -> f64 {
        match self.wellbeing.map(|w| w.doms) {
            Some(5) => 15.0,
            Some(4) => 40.0,
            Some(3) => 70.0,
            _ => 100.0,
        }
    }
}

fn biological_rate(settings: &Settings) -> f64 {
    let mut rate = 1.0;
    if let Some(age) = settings.user_vitals.age.filter(|a| *a > 35) {
        rate *= 1.0 + (age - 35) as f64 * 0.01;
    }
    if matches!(settings.user_vitals.gender, Some(Gender::Female) | Some(Gender::Transfemale)) {
        rate *= 0.85;
    }
    rate
}

/// Post-session soreness reports older than this no longer cap a muscle
const FEEDBACK_WINDOW_HOURS: i64 = 72;

/// How far back a check-in still describes how the athlete feels now
const WELLBEING_MAX_AGE_DAYS: i64 = 2;

/// Today's check-in, else the newest one from the last two days
fn recent_wellbeing(logs: &[DailyWellbeingLog], now: DateTime<Utc>) -> Option<&DailyWellbeingLog> {
    let today = now.date_naive();
    let oldest = today - Duration::days(WELLBEING_MAX_AGE_DAYS);
    logs.iter()
        .find(|l| l.date == today)
        .or_else(|| logs.iter().filter(|l| l.date >= oldest && l.date < today).max_by_key(|l| l.date))
}

/// Last three nights weighted 0.5 / 0.3 / 0.2, missing nights count as neutral
fn weighted_sleep_hours(sleep_logs: &[SleepLog]) -> f64 {
    if sleep_logs.is_empty() {
        return NEUTRAL_SLEEP_HOURS;
    }
    let mut recent: Vec<&SleepLog> = sleep_logs.iter().collect();
    recent.sort_by(|a, b| b.end_time.cmp(&a.end_time));

    [0.5, 0.3, 0.2]
        .iter()
        .enumerate()
        .map(|(i, weight)| {
            let hours = recent
                .get(i)
                .map(|l| l.duration_hours)
                .filter(|h| *h > 0.0)
                .unwrap_or(NEUTRAL_SLEEP_HOURS);
            hours * weight
        })
        .sum()
}

/// Average daily intake over the days logged in the last 48 hours, falling back to the stated objective
fn nutrition_status(logs: &[NutritionLog], settings: &Settings, now: DateTime<Utc>) -> CalorieObjective {
    let since = now - Duration::hours(48);
    let recent: Vec<&NutritionLog> = logs.iter().filter(|l| l.date > since && l.date <= now).collect();

    match settings.daily_calorie_goal.filter(|g| *g > 0.0) {
        Some(goal) if !recent.is_empty() => {
            let days: HashSet<NaiveDate> = recent.iter().map(|l| l.date.date_naive()).collect();
            let daily_average = recent.iter().map(|l| l.calories.unwrap_or(0.0)).sum::<f64>() / days.len() as f64;
            if daily_average < goal * 0.9 {
                CalorieObjective::Deficit
            } else if daily_average > goal * 1.1 {
                CalorieObjective::Surplus
            } else {
                CalorieObjective::Maintenance
            }
        }
        _ => settings.calorie_goal_objective,
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SessionLoad {
    cns: f64,
    muscular: f64,
    spinal: f64,
}

/// Computes system and per-muscle recovery batteries
#[derive(Debug, Clone, Default)]
pub struct RecoveryEngine {
    config: RecoveryConfig,
    family_match: FamilyMatchRule,
}

impl RecoveryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        Self {
            config,
            family_match: FamilyMatchRule::default(),
        }
    }

    pub fn with_family_match(mut self, rule: FamilyMatchRule) -> Self {
        self.family_match = rule;
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    fn window_start(&self, now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
        now - Duration::days(i64::from(days))
    }

    fn session_load(&self, log: &WorkoutLog, index: &ExerciseIndex, one_rms: &HashMap<String, f64>) -> SessionLoad {
        let mut load = SessionLoad::default();

        for exercise in &log.completed_exercises {
            let Some(info) = index.lookup(exercise.exercise_ref()) else {
                debug!("Skipping '{}': not in catalog", exercise.exercise_name);
                continue;
            };
            let cost = exercise_cost(Some(info), Some(&exercise.exercise_name));
            let one_rm = info
                .calculated_1rm
                .filter(|rm| *rm > 0.0)
                .or_else(|| one_rms.get(&exercise.exercise_name.trim().to_lowercase()).copied());

            for set in &exercise.sets {
                let stress = set_stress(set, Some(info), self.config.default_rest_seconds, MuscleRole::Primary);
                let heavy = match (one_rm, set.weight) {
                    (Some(rm), Some(weight)) if weight / rm >= 0.9 => 1.3,
                    _ => 1.0,
                };

                load.muscular += stress;
                load.cns += stress * (cost.cnc / 5.0) * heavy;
                load.spinal += spinal_score(set, Some(info), Some(&exercise.exercise_name));
            }
        }

        let duration = log.duration_seconds.unwrap_or(0);
        if duration > 75 * 60 {
            load.cns *= 1.15;
        }
        if duration > 90 * 60 {
            load.cns *= 1.25;
        }

        load
    }

    /// CNS, muscular and spinal batteries at `now`
    pub fn compute_batteries(&self, inputs: &RecoveryInputs<'_>, now: DateTime<Utc>) -> BatteryReport {
        let Some(settings) = inputs.settings else {
            debug!("No settings available, reporting full batteries");
            return BatteryReport::fully_recovered();
        };
        if inputs.history.is_empty() {
            return BatteryReport::fully_recovered();
        }

        let signals = LifestyleSignals::gather(inputs, settings, now);
        let one_rms = best_1rm_by_exercise(inputs.history);
        let window_start = self.window_start(now, self.config.history_window_days);

        let cns_curve = DecayCurve::new(self.config.cns.half_life_hours);
        let muscular_base = DecayCurve::new(self.config.muscular.half_life_hours);
        let muscular_curve = muscular_base.stretched(signals.muscular_rate(settings));
        let spinal_base = DecayCurve::new(self.config.spinal.half_life_hours);
        let spinal_curve = spinal_base.stretched(signals.spinal_rate(settings));

        let cns_capacity = self.config.cns.capacity.max(1.0);
        let muscular_capacity = self.config.muscular.capacity.max(1.0);
        let spinal_capacity = self.config.spinal.capacity.max(1.0);

        let mut audit = AuditLogs::default();
        let mut cns_remaining = 0.0;
        let mut muscular_remaining = 0.0;
        let mut muscular_baseline = 0.0;
        let mut spinal_remaining = 0.0;
        let mut spinal_baseline = 0.0;
        let mut sessions = 0;

        for log in inputs.history.iter().filter(|l| l.date > window_start) {
            let hours = hours_between(log.date, now);
            let load = self.session_load(log, inputs.index, &one_rms);
            let label = if log.session_name.trim().is_empty() {
                "Entrenamiento".to_string()
            } else {
                log.session_name.clone()
            };

            let cns = cns_curve.remaining(load.cns, hours);
            let muscular_plain = muscular_base.remaining(load.muscular, hours);
            let spinal_plain = spinal_base.remaining(load.spinal, hours);

            cns_remaining += cns;
            muscular_remaining += muscular_curve.remaining(load.muscular, hours);
            muscular_baseline += muscular_plain;
            spinal_remaining += spinal_curve.remaining(load.spinal, hours);
            spinal_baseline += spinal_plain;
            sessions += 1;

            push_audit(&mut audit.cns, label.clone(), -cns / cns_capacity * 100.0, AuditKind::Workout);
            push_audit(
                &mut audit.muscular,
                label.clone(),
                -muscular_plain / muscular_capacity * 100.0,
                AuditKind::Workout,
            );
            push_audit(&mut audit.spinal, label, -spinal_plain / spinal_capacity * 100.0, AuditKind::Workout);
        }

        // CNS: gym load plus sleep and life stress
        let sleep_penalty = signals.cns_sleep_penalty();
        if sleep_penalty > 0.0 {
            push_audit(&mut audit.cns, "Sueño insuficiente", -sleep_penalty, AuditKind::Malus);
        } else {
            push_audit(&mut audit.cns, "Sueño reparador", -sleep_penalty, AuditKind::Bonus);
        }
        let life_penalty = signals.life_stress_penalty();
        push_audit(&mut audit.cns, "Estrés vital", -life_penalty, AuditKind::Malus);
        let cns_raw = clamp_percent(100.0 - cns_remaining / cns_capacity * 100.0 - sleep_penalty - life_penalty);

        // Muscular: lifestyle-adjusted decay, then background and DOMS ceilings
        let rate_effect = (muscular_baseline - muscular_remaining) / muscular_capacity * 100.0;
        push_audit(&mut audit.muscular, "Ritmo de recuperación", rate_effect, adjustment_kind(rate_effect));
        let mut muscular_raw = clamp_percent(100.0 - muscular_remaining / muscular_capacity * 100.0);
        for (label, cap) in [
            ("Carga de fondo", signals.background_cap(settings)),
            ("Agujetas", signals.doms_cap()),
        ] {
            if muscular_raw > cap {
                push_audit(&mut audit.muscular, label, cap - muscular_raw, AuditKind::Malus);
                muscular_raw = cap;
            }
        }

        let spinal_effect = (spinal_baseline - spinal_remaining) / spinal_capacity * 100.0;
        push_audit(&mut audit.spinal, "Ritmo de recuperación", spinal_effect, adjustment_kind(spinal_effect));
        let spinal_raw = clamp_percent(100.0 - spinal_remaining / spinal_capacity * 100.0);

        let raw = SystemValues {
            cns: cns_raw,
            muscular: clamp_percent(muscular_raw),
            spinal: spinal_raw,
        };

        let calibration = &settings.battery_calibration;
        for (system, log) in [
            (BatterySystem::Cns, &mut audit.cns),
            (BatterySystem::Muscular, &mut audit.muscular),
            (BatterySystem::Spinal, &mut audit.spinal),
        ] {
            let delta = calibration.delta(system);
            push_audit(log, "Calibración manual", -delta, adjustment_kind(-delta));
        }

        let cns = calibration.apply(BatterySystem::Cns, raw.cns);
        let muscular = calibration.apply(BatterySystem::Muscular, raw.muscular);
        let spinal = calibration.apply(BatterySystem::Spinal, raw.spinal);
        let verdict = Verdict::from_lowest(cns.min(muscular).min(spinal));

        info!(
            "Batteries from {} sessions: CNS {:.0}, muscular {:.0}, spinal {:.0}",
            sessions, cns, muscular, spinal
        );

        BatteryReport {
            cns,
            muscular,
            spinal,
            raw,
            audit_logs: audit,
            verdict,
        }
    }

    fn recovery_window_hours(&self, muscle: &str) -> f64 {
        let profiles = &self.config.recovery_profiles;
        let profile = MUSCLE_PROFILES
            .iter()
            .find(|(key, _)| muscle_in_family(key, muscle, self.family_match))
            .map(|(_, profile)| *profile)
            .unwrap_or(RecoveryProfile::Medium);

        match profile {
            RecoveryProfile::Fast => profiles.fast,
            RecoveryProfile::Medium => profiles.medium,
            RecoveryProfile::Slow => profiles.slow,
            RecoveryProfile::Heavy => profiles.heavy,
        }
    }

    /// Stress a muscle can absorb before its battery empties: 1.8× its recent
    /// weekly stress, never below the athlete type's floor
    fn work_capacity(&self, muscle: &str, inputs: &RecoveryInputs<'_>, settings: &Settings, now: DateTime<Utc>) -> f64 {
        let floor = settings.athlete_type.capacity_floor();
        let since = self.window_start(now, self.config.capacity_window_days);

        let mut total_stress = 0.0;
        let mut any_recent = false;
        for log in inputs.history.iter().filter(|l| l.date > since) {
            any_recent = true;
            for exercise in &log.completed_exercises {
                let Some(info) = inputs.index.lookup(exercise.exercise_ref()) else { continue };
                let Some(involvement) = info
                    .involved_muscles
                    .iter()
                    .find(|m| muscle_in_family(&m.muscle, muscle, self.family_match))
                else {
                    continue;
                };
                let stress: f64 = exercise
                    .sets
                    .iter()
                    .map(|s| set_stress(s, Some(info), self.config.default_rest_seconds, MuscleRole::Primary))
                    .sum();
                total_stress += stress * involvement.activation;
            }
        }

        if !any_recent {
            return floor;
        }
        let weeks = (self.config.capacity_window_days as f64 / 7.0).max(1.0);
        let derived = total_stress / weeks * 1.8;
        derived.max(floor).clamp(500.0, 3500.0)
    }

    /// Ceiling from soreness reported after the latest session of the last
    /// 72 hours; it rises each hour as the pain fades
    fn feedback_cap(&self, muscle: &str, feedback: &[PostSessionFeedback], now: DateTime<Utc>) -> Option<f64> {
        let since = now - Duration::hours(FEEDBACK_WINDOW_HOURS);
        let latest = feedback
            .iter()
            .filter(|f| f.date > since && f.date <= now)
            .max_by_key(|f| f.date)?;
        let (_, report) = latest
            .feedback
            .iter()
            .find(|(name, _)| muscle_in_family(name, muscle, self.family_match))?;

        let hours = hours_between(latest.date, now);
        match report.doms {
            5 => Some(10.0 + hours * 1.5),
            4 => Some(40.0 + hours * 2.0),
            3 => Some(70.0 + hours * 2.5),
            _ => None,
        }
    }

    /// Recovery state of one muscle (or muscle family) at `now`
    pub fn muscle_battery(&self, muscle: &str, inputs: &RecoveryInputs<'_>, now: DateTime<Utc>) -> MuscleBatteryDetail {
        let Some(settings) = inputs.settings else {
            return MuscleBatteryDetail::fresh();
        };
        if inputs.history.is_empty() {
            return MuscleBatteryDetail::fresh();
        }

        let capacity = self.work_capacity(muscle, inputs, settings, now);
        let signals = LifestyleSignals::gather(inputs, settings, now);
        let curve = DecayCurve::from_recovery_window(self.recovery_window_hours(muscle))
            .stretched(signals.muscular_rate(settings));
        let window_start = self.window_start(now, self.config.history_window_days);

        let mut accumulated = 0.0;
        let mut effective_sets = 0;
        let mut last_session: Option<DateTime<Utc>> = None;

        for log in inputs.history.iter().filter(|l| l.date > window_start) {
            let hours = hours_between(log.date, now);
            let mut session_stress = 0.0;

            for exercise in &log.completed_exercises {
                let Some(info) = inputs.index.lookup(exercise.exercise_ref()) else { continue };
                let Some(involvement) = info
                    .involved_muscles
                    .iter()
                    .find(|m| muscle_in_family(&m.muscle, muscle, self.family_match))
                else {
                    continue;
                };

                let raw: f64 = exercise
                    .sets
                    .iter()
                    .map(|s| set_stress(s, Some(info), self.config.default_rest_seconds, MuscleRole::Primary))
                    .sum();
                let role_factor = match involvement.role {
                    MuscleRole::Primary => 1.0,
                    MuscleRole::Secondary => 0.5,
                    MuscleRole::Stabilizer => 0.15,
                    MuscleRole::Neutralizer => 0.1,
                };
                session_stress += raw * role_factor * involvement.activation;

                let counts = involvement.role == MuscleRole::Primary
                    || (involvement.role == MuscleRole::Secondary && involvement.activation > 0.6);
                if hours <= 168.0 && counts {
                    effective_sets += exercise.sets.len();
                }
            }

            if session_stress > 0.0 {
                accumulated += curve.remaining(session_stress, hours);
                if last_session.map_or(true, |last| log.date > last) {
                    last_session = Some(log.date);
                }
            }
        }

        let mut battery = clamp_percent(100.0 - accumulated / capacity * 100.0);
        let background_cap = signals.background_cap(settings);
        battery = battery.min(background_cap).min(signals.doms_cap());

        let discomfort_since = now - Duration::hours(48);
        let sore = inputs
            .history
            .iter()
            .filter(|l| l.date > discomfort_since)
            .flat_map(|l| l.discomforts.iter())
            .any(|d| muscle_in_family(d, muscle, self.family_match));
        if sore {
            battery = battery.min(50.0);
        }
        if let Some(cap) = self.feedback_cap(muscle, inputs.post_session_feedback, now) {
            battery = battery.min(cap);
        }
        let battery = clamp_percent(battery);

        let target = background_cap.min(90.0);
        let hours_to_recovery = if battery < target && accumulated > 0.0 {
            let target_fatigue = (100.0 - target) * capacity / 100.0;
            curve.hours_until(accumulated, target_fatigue)
        } else {
            0.0
        };

        MuscleBatteryDetail {
            recovery_score: battery.round(),
            effective_sets,
            hours_since_last_session: last_session.map(|d| hours_between(d, now).round()),
            estimated_hours_to_recovery: hours_to_recovery.max(0.0).round(),
            status: MuscleRecoveryStatus::from_score(battery),
        }
    }

    /// Recovery percentage of every tracked muscle, keyed by muscle id
    pub fn per_muscle_batteries(&self, inputs: &RecoveryInputs<'_>, now: DateTime<Utc>) -> BTreeMap<String, f64> {
        TRACKED_MUSCLES
            .par_iter()
            .map(|m| (m.id.to_string(), self.muscle_battery(m.id, inputs, now).recovery_score))
            .collect()
    }

    /// Spinal load per exercise over the window, heaviest first. `None` ranks all history.
    pub fn spinal_drain_by_exercise(
        &self,
        history: &[WorkoutLog],
        index: &ExerciseIndex,
        window_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Vec<SpinalDrainEntry> {
        let since = window_days.map(|d| self.window_start(now, d));
        let mut totals: Vec<SpinalDrainEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for log in history.iter().filter(|l| since.map_or(true, |s| l.date > s)) {
            for exercise in &log.completed_exercises {
                let Some(info) = index.lookup(exercise.exercise_ref()) else { continue };
                let drain: f64 = exercise
                    .sets
                    .iter()
                    .map(|s| spinal_score(s, Some(info), Some(&exercise.exercise_name)))
                    .sum();
                if drain <= 0.0 {
                    continue;
                }

                let key = exercise.exercise_name.trim().to_lowercase();
                match positions.get(&key) {
                    Some(&i) => totals[i].total_spinal_drain += drain,
                    None => {
                        positions.insert(key, totals.len());
                        totals.push(SpinalDrainEntry {
                            exercise_name: exercise.exercise_name.clone(),
                            total_spinal_drain: drain,
                        });
                    }
                }
            }
        }

        for entry in &mut totals {
            entry.total_spinal_drain = entry.total_spinal_drain.round();
        }
        totals.sort_by(|a, b| {
            b.total_spinal_drain
                .partial_cmp(&a.total_spinal_drain)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        totals
    }

    /// Traffic light combining the CNS battery with last night's sleep,
    /// today's stress and the caloric objective
    pub fn daily_readiness(
        &self,
        sleep_logs: &[SleepLog],
        wellbeing_logs: &[DailyWellbeingLog],
        settings: &Settings,
        cns_battery: f64,
        now: DateTime<Utc>,
    ) -> DailyReadiness {
        let mut multiplier: f64 = 1.0;
        let mut diagnostics = Vec::new();

        let last_sleep = sleep_logs
            .iter()
            .max_by_key(|l| l.end_time)
            .map(|l| l.duration_hours)
            .unwrap_or(NEUTRAL_SLEEP_HOURS);
        if last_sleep < 6.0 {
            multiplier *= 1.5;
            diagnostics.push("Falta de sueño (<6h): la recarga está muy frenada hoy".to_string());
        }

        let wellbeing = recent_wellbeing(wellbeing_logs, now);
        if wellbeing.map_or(false, |w| w.stress_level >= 4) {
            multiplier *= 1.4;
            diagnostics.push("Estrés alto: el cortisol frena la recuperación del sistema nervioso".to_string());
        }

        if settings.calorie_goal_objective == CalorieObjective::Deficit {
            multiplier *= 1.3;
            diagnostics.push("Déficit calórico: recursos limitados para reparar tejido".to_string());
        }

        let (status, recommendation) = if cns_battery < 40.0 || multiplier >= 1.8 {
            (
                TrafficLight::Red,
                "Sistema nervioso no listo: descanso total o movilidad ligera",
            )
        } else if cns_battery < 70.0 || multiplier >= 1.3 {
            (
                TrafficLight::Yellow,
                "Fatiga residual: cambia el trabajo pesado por técnica o reduce el volumen a la mitad",
            )
        } else {
            (
                TrafficLight::Green,
                "Condiciones óptimas: luz verde para cargas altas",
            )
        };

        if diagnostics.is_empty() {
            diagnostics.push("Hábitos de las últimas 24 h sin incidencias".to_string());
        }

        DailyReadiness {
            status,
            stress_multiplier: (multiplier * 100.0).round() / 100.0,
            cns_battery,
            diagnostics,
            recommendation: recommendation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletedExercise, ExerciseMuscleInfo, ExerciseSet, ExerciseType, MuscleFeedback};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap()
    }

    fn create_test_catalog() -> ExerciseIndex {
        ExerciseIndex::build(&[
            ExerciseMuscleInfo::new("sq", "Sentadilla")
                .with_type(ExerciseType::Basic)
                .with_muscle("Cuádriceps", MuscleRole::Primary, 1.0)
                .with_muscle("Glúteos", MuscleRole::Secondary, 0.7)
                .with_muscle("Erectores Espinales", MuscleRole::Stabilizer, 0.4),
            ExerciseMuscleInfo::new("curl", "Curl con Barra")
                .with_type(ExerciseType::Isolation)
                .with_muscle("Bíceps", MuscleRole::Primary, 1.0),
        ])
    }

    fn create_test_workout(hours_ago: i64, sets: usize) -> WorkoutLog {
        let exercise = CompletedExercise::new(
            "Sentadilla",
            (0..sets).map(|_| ExerciseSet::completed(120.0, 5, Some(9.0))).collect(),
        );
        WorkoutLog::new(format!("w{}", hours_ago), now() - Duration::hours(hours_ago), vec![exercise])
    }

    #[test]
    fn test_decay_curve() {
        let curve = DecayCurve::new(48.0);
        assert_eq!(curve.remaining(100.0, 0.0), 100.0);
        assert!((curve.remaining(100.0, 48.0) - 50.0).abs() < 1e-9);
        assert!((curve.hours_until(100.0, 25.0) - 96.0).abs() < 1e-9);

        // a 96 h window leaves 5% after 96 h
        let window = DecayCurve::from_recovery_window(96.0);
        assert!((window.remaining(100.0, 96.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_settings_or_history_is_full() {
        let index = create_test_catalog();
        let history = vec![create_test_workout(2, 5)];
        let engine = RecoveryEngine::new();

        let report = engine.compute_batteries(&RecoveryInputs::new(&history, &index), now());
        assert_eq!(report.values(), SystemValues::full());
        assert!(report.audit_logs.cns.is_empty());

        let settings = Settings::default();
        let report = engine.compute_batteries(&RecoveryInputs::new(&[], &index).with_settings(&settings), now());
        assert_eq!(report.values(), SystemValues::full());
        assert_eq!(report.verdict, Verdict::Ready);
    }

    #[test]
    fn test_recent_session_drains_and_recovers() {
        let index = create_test_catalog();
        let settings = Settings::default();
        let engine = RecoveryEngine::new();

        let fresh = vec![create_test_workout(2, 8)];
        let older = vec![create_test_workout(72, 8)];

        let after = engine.compute_batteries(&RecoveryInputs::new(&fresh, &index).with_settings(&settings), now());
        let later = engine.compute_batteries(&RecoveryInputs::new(&older, &index).with_settings(&settings), now());

        assert!(after.cns < 100.0);
        assert!(after.spinal < 100.0);
        assert!(later.cns > after.cns);
        assert!(later.muscular > after.muscular);
        assert!(after.audit_logs.cns.iter().any(|e| e.kind == AuditKind::Workout));
    }

    #[test]
    fn test_unknown_exercises_drain_nothing() {
        let index = create_test_catalog();
        let settings = Settings::default();
        let log = WorkoutLog::new(
            "w",
            now() - Duration::hours(1),
            vec![CompletedExercise::new("Press Inventado", vec![ExerciseSet::completed(100.0, 5, Some(9.0))])],
        );
        let history = vec![log];

        let report = RecoveryEngine::new().compute_batteries(&RecoveryInputs::new(&history, &index).with_settings(&settings), now());
        assert_eq!(report.values(), SystemValues::full());
    }

    #[test]
    fn test_calibration_is_relative() {
        let index = create_test_catalog();
        let engine = RecoveryEngine::new();
        let history = vec![create_test_workout(6, 6)];
        let mut settings = Settings::default();

        let first = engine.compute_batteries(&RecoveryInputs::new(&history, &index).with_settings(&settings), now());
        settings.battery_calibration = first.calibrate(BatterySystem::Cns, 80.0, now(), &settings.battery_calibration);

        let same = engine.compute_batteries(&RecoveryInputs::new(&history, &index).with_settings(&settings), now());
        assert!((same.cns - 80.0).abs() < 1e-6);
        assert!(same.audit_logs.cns.iter().any(|e| e.label == "Calibración manual"));

        // a new session moves the calibrated value by the same amount as the raw one
        let mut more = history.clone();
        more.push(create_test_workout(1, 6));
        let next = engine.compute_batteries(&RecoveryInputs::new(&more, &index).with_settings(&settings), now());
        let raw_change = next.raw.cns - first.raw.cns;
        let expected = (80.0 + raw_change).clamp(0.0, 100.0);
        assert!((next.cns - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sleep_and_stress_adjust_cns() {
        let index = create_test_catalog();
        let history = vec![create_test_workout(24, 4)];
        let settings = Settings::default();
        let engine = RecoveryEngine::new();

        let short_sleep = vec![SleepLog {
            date: now().date_naive(),
            end_time: now() - Duration::hours(10),
            duration_hours: 4.0,
        }];
        let stressed = vec![DailyWellbeingLog {
            date: now().date_naive(),
            sleep_quality: 2,
            stress_level: 5,
            doms: 4,
            motivation: 2,
            work_intensity: Some(IntensityLevel::High),
            study_intensity: None,
        }];

        let base = engine.compute_batteries(&RecoveryInputs::new(&history, &index).with_settings(&settings), now());
        let tired = engine.compute_batteries(
            &RecoveryInputs::new(&history, &index)
                .with_settings(&settings)
                .with_sleep(&short_sleep)
                .with_wellbeing(&stressed),
            now(),
        );

        assert!(tired.cns < base.cns);
        assert!(tired.muscular <= 40.0);
        assert!(tired.audit_logs.cns.iter().any(|e| e.label == "Sueño insuficiente"));
        assert!(tired.audit_logs.muscular.iter().any(|e| e.label == "Agujetas"));
    }

    #[test]
    fn test_nutrition_average_over_logged_days() {
        let settings = Settings {
            daily_calorie_goal: Some(2500.0),
            ..Settings::default()
        };
        let meal = |hours_ago: i64, calories: f64| NutritionLog {
            date: now() - Duration::hours(hours_ago),
            calories: Some(calories),
        };

        let one_day = vec![meal(3, 1200.0), meal(8, 1300.0)];
        assert_eq!(nutrition_status(&one_day, &settings, now()), CalorieObjective::Maintenance);

        let two_days = vec![meal(3, 2500.0), meal(30, 1000.0)];
        assert_eq!(nutrition_status(&two_days, &settings, now()), CalorieObjective::Deficit);

        let feast = vec![meal(2, 3200.0)];
        assert_eq!(nutrition_status(&feast, &settings, now()), CalorieObjective::Surplus);
    }

    #[test]
    fn test_stale_wellbeing_is_ignored() {
        let index = create_test_catalog();
        let history = vec![create_test_workout(24 * 9, 2)];
        let settings = Settings::default();
        let engine = RecoveryEngine::new();
        let checkin = |days_ago: i64| {
            vec![DailyWellbeingLog {
                date: (now() - Duration::days(days_ago)).date_naive(),
                sleep_quality: 1,
                stress_level: 5,
                doms: 5,
                motivation: 1,
                work_intensity: None,
                study_intensity: None,
            }]
        };
        let old = checkin(60);
        let yesterday = checkin(1);

        let base = engine.compute_batteries(&RecoveryInputs::new(&history, &index).with_settings(&settings), now());
        let with_old = engine.compute_batteries(
            &RecoveryInputs::new(&history, &index).with_settings(&settings).with_wellbeing(&old),
            now(),
        );
        assert_eq!(with_old.cns, base.cns);
        assert_eq!(with_old.muscular, base.muscular);
        assert!(with_old.muscular > 90.0);

        let with_recent = engine.compute_batteries(
            &RecoveryInputs::new(&history, &index).with_settings(&settings).with_wellbeing(&yesterday),
            now(),
        );
        assert!(with_recent.muscular < base.muscular);

        let readiness = engine.daily_readiness(&[], &old, &settings, 90.0, now());
        assert_eq!(readiness.status, TrafficLight::Green);
    }

    #[test]
    fn test_muscle_battery_falls_and_recovers() {
        let index = create_test_catalog();
        let settings = Settings::default();
        let engine = RecoveryEngine::new();

        let fresh = vec![create_test_workout(1, 10)];
        let inputs = RecoveryInputs::new(&fresh, &index).with_settings(&settings);
        let quads = engine.muscle_battery("cuádriceps", &inputs, now());
        let biceps = engine.muscle_battery("bíceps", &inputs, now());

        assert!(quads.recovery_score < 100.0);
        assert_eq!(quads.effective_sets, 10);
        assert_eq!(quads.hours_since_last_session, Some(1.0));
        assert!(quads.estimated_hours_to_recovery > 0.0);
        assert_eq!(biceps.recovery_score, 100.0);
        assert_eq!(biceps.hours_since_last_session, None);

        let later = engine.muscle_battery("cuádriceps", &inputs, now() + Duration::hours(96));
        assert!(later.recovery_score > quads.recovery_score);
    }

    #[test]
    fn test_discomfort_caps_muscle() {
        let index = create_test_catalog();
        let settings = Settings::default();
        let mut log = create_test_workout(200, 1);
        log.date = now() - Duration::hours(5);
        log.completed_exercises.clear();
        log.discomforts = vec!["Bíceps".to_string()];
        let history = vec![log];

        let detail = RecoveryEngine::new().muscle_battery(
            "bíceps",
            &RecoveryInputs::new(&history, &index).with_settings(&settings),
            now(),
        );
        assert_eq!(detail.recovery_score, 50.0);
    }

    #[test]
    fn test_post_session_soreness_cap_lifts_over_time() {
        let index = create_test_catalog();
        let settings = Settings::default();
        let history = vec![create_test_workout(200, 1)];
        let feedback = vec![PostSessionFeedback {
            log_id: "w200".to_string(),
            date: now() - Duration::hours(4),
            cns_recovery: None,
            feedback: BTreeMap::from([(
                "Bíceps".to_string(),
                MuscleFeedback {
                    doms: 5,
                    ..MuscleFeedback::default()
                },
            )]),
        }];
        let inputs = RecoveryInputs::new(&history, &index)
            .with_settings(&settings)
            .with_feedback(&feedback);
        let engine = RecoveryEngine::new();

        // 10 + 4 h · 1.5
        assert_eq!(engine.muscle_battery("bíceps", &inputs, now()).recovery_score, 16.0);
        // 10 + 24 h · 1.5
        let next_day = engine.muscle_battery("bíceps", &inputs, now() + Duration::hours(20));
        assert_eq!(next_day.recovery_score, 46.0);
        // report is older than 72 h
        let later = engine.muscle_battery("bíceps", &inputs, now() + Duration::hours(70));
        assert_eq!(later.recovery_score, 100.0);

        assert_eq!(engine.muscle_battery("tríceps", &inputs, now()).recovery_score, 100.0);
    }

    #[test]
    fn test_per_muscle_batteries_cover_tracked_list() {
        let index = create_test_catalog();
        let settings = Settings::default();
        let history = vec![create_test_workout(3, 6)];

        let batteries = RecoveryEngine::new()
            .per_muscle_batteries(&RecoveryInputs::new(&history, &index).with_settings(&settings), now());

        assert_eq!(batteries.len(), TRACKED_MUSCLES.len());
        assert!(batteries["cuádriceps"] < batteries["tríceps"]);
    }

    #[test]
    fn test_spinal_drain_ranking() {
        let index = create_test_catalog();
        let curl = CompletedExercise::new("Curl con Barra", vec![ExerciseSet::completed(40.0, 10, Some(8.0))]);
        let mut log = create_test_workout(5, 3);
        log.completed_exercises.push(curl);
        let history = vec![log, create_test_workout(400, 10)];

        let ranking = RecoveryEngine::new().spinal_drain_by_exercise(&history, &index, Some(7), now());
        assert_eq!(ranking[0].exercise_name, "Sentadilla");
        assert!(ranking.windows(2).all(|w| w[0].total_spinal_drain >= w[1].total_spinal_drain));
        // 120 kg · 5 reps · 1.5 ssc · 3 sets
        assert_eq!(ranking[0].total_spinal_drain, 2700.0);
    }

    #[test]
    fn test_spinal_drain_without_window_ranks_all_history() {
        let index = create_test_catalog();
        let history = vec![create_test_workout(24 * 30, 1)];
        let engine = RecoveryEngine::new();

        let all_time = engine.spinal_drain_by_exercise(&history, &index, None, now());
        assert_eq!(all_time.len(), 1);
        assert_eq!(all_time[0].total_spinal_drain, 900.0);

        assert!(engine.spinal_drain_by_exercise(&history, &index, Some(10), now()).is_empty());
    }

    #[test]
    fn test_daily_readiness() {
        let settings = Settings::default();
        let engine = RecoveryEngine::new();

        let green = engine.daily_readiness(&[], &[], &settings, 90.0, now());
        assert_eq!(green.status, TrafficLight::Green);
        assert_eq!(green.diagnostics.len(), 1);

        let short = vec![SleepLog {
            date: now().date_naive(),
            end_time: now() - Duration::hours(8),
            duration_hours: 5.0,
        }];
        let deficit = Settings {
            calorie_goal_objective: CalorieObjective::Deficit,
            ..Settings::default()
        };
        let red = engine.daily_readiness(&short, &[], &deficit, 90.0, now());
        assert_eq!(red.status, TrafficLight::Red);
        assert_eq!(red.stress_multiplier, 1.95);
    }

    #[test]
    fn test_learn_recovery_rate() {
        assert!((learn_recovery_rate(1.0, 60.0, 80.0) - 1.1).abs() < 1e-9);
        assert_eq!(learn_recovery_rate(1.95, 0.0, 100.0), 2.0);
        assert_eq!(learn_recovery_rate(0.5, 100.0, 0.0), 0.5);
    }

    proptest! {
        #[test]
        fn test_batteries_stay_in_bounds(
            sets in 0usize..60,
            hours_ago in 0i64..300,
            delta in -150.0f64..150.0,
            sleep in 0.0f64..12.0,
        ) {
            let index = create_test_catalog();
            let history = vec![create_test_workout(hours_ago, sets)];
            let mut settings = Settings::default();
            settings.battery_calibration.cns_delta = delta;
            settings.battery_calibration.spinal_delta = -delta;
            let sleep_logs = vec![SleepLog {
                date: now().date_naive(),
                end_time: now() - Duration::hours(6),
                duration_hours: sleep,
            }];

            let report = RecoveryEngine::new().compute_batteries(
                &RecoveryInputs::new(&history, &index).with_settings(&settings).with_sleep(&sleep_logs),
                now(),
            );
            for value in [report.cns, report.muscular, report.spinal] {
                prop_assert!(!value.is_nan());
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }
    }
}
