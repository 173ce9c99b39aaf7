//! Weekly volume thresholds and status classification
//!
//! Reference ranges per muscle group are scaled by training experience,
//! mesocycle phase and preferred proximity to failure. Powerlifting and
//! strength programs use fixed set-count breakpoints instead.

use crate::hierarchy::normalize_muscle_name;
use crate::models::{AthleteScore, MesocyclePhase, PreferredIntensity, Settings, TrainingMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed breakpoints for powerlifting and strength programs
pub const STRENGTH_MAINTENANCE_BELOW: f64 = 6.0;
pub const STRENGTH_OPTIMAL_UP_TO: f64 = 12.0;

/// Reference weekly set range for one muscle group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub beginner_min: f64,
    pub beginner_max: f64,
    pub advanced_min: f64,
    pub advanced_max: f64,
}

impl ReferenceRange {
    const fn new(beginner_min: f64, beginner_max: f64, advanced_min: f64, advanced_max: f64) -> Self {
        Self {
            beginner_min,
            beginner_max,
            advanced_min,
            advanced_max,
        }
    }
}

const REFERENCE_TABLE: &[(&str, ReferenceRange)] = &[
    ("Pectoral", ReferenceRange::new(10.0, 14.0, 14.0, 22.0)),
    ("Dorsales", ReferenceRange::new(10.0, 14.0, 14.0, 22.0)),
    ("Trapecio", ReferenceRange::new(6.0, 10.0, 8.0, 16.0)),
    ("Espalda Baja", ReferenceRange::new(4.0, 8.0, 6.0, 10.0)),
    ("Deltoides Anterior", ReferenceRange::new(4.0, 8.0, 6.0, 12.0)),
    ("Deltoides Lateral", ReferenceRange::new(8.0, 14.0, 12.0, 22.0)),
    ("Deltoides Posterior", ReferenceRange::new(6.0, 10.0, 8.0, 18.0)),
    ("Bíceps", ReferenceRange::new(8.0, 12.0, 12.0, 20.0)),
    ("Tríceps", ReferenceRange::new(6.0, 10.0, 10.0, 16.0)),
    ("Antebrazo", ReferenceRange::new(4.0, 8.0, 6.0, 14.0)),
    ("Cuádriceps", ReferenceRange::new(8.0, 12.0, 12.0, 18.0)),
    ("Isquiosurales", ReferenceRange::new(6.0, 10.0, 10.0, 16.0)),
    ("Glúteos", ReferenceRange::new(4.0, 10.0, 8.0, 16.0)),
    ("Pantorrillas", ReferenceRange::new(8.0, 12.0, 12.0, 16.0)),
    ("Abdomen", ReferenceRange::new(6.0, 12.0, 10.0, 20.0)),
    ("Aductores", ReferenceRange::new(4.0, 8.0, 6.0, 12.0)),
];

/// Threshold engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Range for groups missing from the reference table
    pub default_range: ReferenceRange,

    /// Replacements for reference table entries, keyed by group name
    pub overrides: BTreeMap<String, ReferenceRange>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            default_range: ReferenceRange::new(10.0, 14.0, 14.0, 22.0),
            overrides: BTreeMap::new(),
        }
    }
}

/// Weekly set thresholds for a muscle group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleVolumeThresholds {
    pub min: f64,
    pub optimal: (f64, f64),
    pub max: f64,
    pub range_label: String,
}

impl MuscleVolumeThresholds {
    fn from_bounds(min: f64, max: f64) -> Self {
        let quarter = (max - min) / 4.0;
        Self {
            min,
            optimal: ((min + quarter).round(), (max - quarter).round()),
            max,
            range_label: format!("{}-{} series", min, max),
        }
    }
}

/// Inputs that shape a threshold lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdContext<'a> {
    /// Program mode, takes precedence over the settings mode
    pub program_mode: Option<TrainingMode>,
    pub settings: Option<&'a Settings>,
    /// Explicit score, falls back to the one in settings
    pub athlete_score: Option<&'a AthleteScore>,
    pub phase: MesocyclePhase,
}

impl<'a> ThresholdContext<'a> {
    pub fn mode(&self) -> TrainingMode {
        self.program_mode
            .or_else(|| self.settings.map(|s| s.training_mode))
            .unwrap_or_default()
    }

    fn score(&self) -> Option<&'a AthleteScore> {
        self.athlete_score
            .or_else(|| self.settings.and_then(|s| s.athlete_score.as_ref()))
    }

    fn intensity(&self) -> PreferredIntensity {
        self.settings.map(|s| s.preferred_intensity).unwrap_or_default()
    }
}

/// Weekly volume status of a muscle group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VolumeStatus {
    Inactive,
    Maintenance,
    Optimal,
    Overreach,
}

impl VolumeStatus {
    /// Long label
    pub fn label(&self) -> &'static str {
        match self {
            VolumeStatus::Inactive => "Inactivo",
            VolumeStatus::Maintenance => "Mantenimiento",
            VolumeStatus::Optimal => "Zona óptima",
            VolumeStatus::Overreach => "Riesgo sobreentreno",
        }
    }

    /// Compact label shown next to set counts
    pub fn short_label(&self, mode: TrainingMode) -> &'static str {
        match self {
            VolumeStatus::Inactive if mode.uses_fixed_breakpoints() => "Min",
            VolumeStatus::Inactive => "---",
            VolumeStatus::Maintenance => "Bajo",
            VolumeStatus::Optimal => "Óptimo",
            VolumeStatus::Overreach => "Alto",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            VolumeStatus::Inactive => "Sin estímulo esta semana",
            VolumeStatus::Maintenance => "Suficiente para mantener, añade series para progresar",
            VolumeStatus::Optimal => "Volumen productivo, mantén la progresión",
            VolumeStatus::Overreach => "Reduce series o programa una descarga",
        }
    }
}

/// Status of a weekly set count
pub fn classify(sets: f64, thresholds: &MuscleVolumeThresholds, mode: TrainingMode) -> VolumeStatus {
    if sets <= 0.0 {
        return VolumeStatus::Inactive;
    }

    let (low, high) = if mode.uses_fixed_breakpoints() {
        (STRENGTH_MAINTENANCE_BELOW, STRENGTH_OPTIMAL_UP_TO)
    } else {
        (thresholds.min, thresholds.max)
    };

    if sets < low {
        VolumeStatus::Maintenance
    } else if sets <= high {
        VolumeStatus::Optimal
    } else {
        VolumeStatus::Overreach
    }
}

/// Looks up and scales weekly volume thresholds
#[derive(Debug, Clone, Default)]
pub struct ThresholdEngine {
    config: ThresholdConfig,
}

impl ThresholdEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ThresholdConfig) -> Self {
        Self { config }
    }

    fn reference_range(&self, muscle_group: &str) -> ReferenceRange {
        let key = normalize_muscle_name(muscle_group);
        self.config
            .overrides
            .iter()
            .find(|(name, _)| normalize_muscle_name(name) == key)
            .map(|(_, range)| *range)
            .or_else(|| {
                REFERENCE_TABLE
                    .iter()
                    .find(|(name, _)| normalize_muscle_name(name) == key)
                    .map(|(_, range)| *range)
            })
            .unwrap_or(self.config.default_range)
    }

    /// Thresholds for a muscle group under the given context
    pub fn thresholds_for(&self, muscle_group: &str, ctx: &ThresholdContext<'_>) -> MuscleVolumeThresholds {
        if ctx.mode().uses_fixed_breakpoints() {
            return MuscleVolumeThresholds::from_bounds(STRENGTH_MAINTENANCE_BELOW, STRENGTH_OPTIMAL_UP_TO);
        }

        let reference = self.reference_range(muscle_group);
        let (base_min, base_max) = match ctx.score() {
            Some(score) if score.is_advanced() => (reference.advanced_min, reference.advanced_max),
            Some(_) => (reference.beginner_min, reference.beginner_max),
            None => (reference.beginner_min, reference.advanced_max),
        };

        let factor = ctx.phase.volume_factor() * ctx.intensity().volume_factor();
        let mut min = (base_min * factor).round().max(1.0);
        let mut max = (base_max * factor).round().max(min + 2.0);

        if let Some(limit) = ctx.settings.and_then(|s| user_limit(s, muscle_group)) {
            if let Some(user_min) = limit.min {
                min = user_min.max(0.0);
            }
            max = limit.max.max(min);
        }

        MuscleVolumeThresholds::from_bounds(min, max)
    }
}

fn user_limit<'s>(settings: &'s Settings, muscle_group: &str) -> Option<&'s crate::models::VolumeLimit> {
    let key = normalize_muscle_name(muscle_group);
    settings
        .volume_limits
        .iter()
        .find(|(name, _)| normalize_muscle_name(name) == key)
        .map(|(_, limit)| limit)
}

/// Unit of a weekly volume recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    /// Hard sets per muscle group
    Sets,
    /// Number of lifts (total reps on competition lifts)
    Lifts,
}

/// Weekly volume recommendation for the athlete as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecommendation {
    pub min_sets: f64,
    pub max_sets: f64,
    pub optimal_sets: f64,
    pub unit: VolumeUnit,
    pub reasoning: String,
}

/// Recommended weekly volume. Powerlifters get a number-of-lifts target
/// derived from monthly lift counts, everyone else a set range.
pub fn weekly_volume_recommendation(
    athlete_score: Option<&AthleteScore>,
    settings: &Settings,
    phase: MesocyclePhase,
) -> VolumeRecommendation {
    let score = match athlete_score {
        Some(score) => score,
        None => {
            return VolumeRecommendation {
                min_sets: 10.0,
                max_sets: 20.0,
                optimal_sets: 15.0,
                unit: VolumeUnit::Sets,
                reasoning: "Perfil no calibrado, rango genérico de 10-20 series".to_string(),
            }
        }
    };

    let advanced = score.is_advanced();
    let phase_factor = phase.volume_factor();

    if settings.training_mode == TrainingMode::Powerlifting {
        let (monthly_min, monthly_max) = if advanced { (1300.0, 2500.0) } else { (1000.0, 1300.0) };
        let min = (monthly_min / 4.0 * phase_factor).round();
        let max = (monthly_max / 4.0 * phase_factor).round();
        return VolumeRecommendation {
            min_sets: min,
            max_sets: max,
            optimal_sets: ((min + max) / 2.0).round(),
            unit: VolumeUnit::Lifts,
            reasoning: format!(
                "Powerlifting por número de levantamientos, fase {:?} ({}x)",
                phase, phase_factor
            ),
        };
    }

    let (base_min, base_max) = if advanced { (14.0, 22.0) } else { (10.0, 14.0) };
    let intensity_factor = settings.preferred_intensity.volume_factor();
    let min = (base_min * phase_factor * intensity_factor).round().max(1.0);
    let max = (base_max * phase_factor * intensity_factor).round().max(min + 2.0);

    VolumeRecommendation {
        min_sets: min,
        max_sets: max,
        optimal_sets: ((min + max) / 2.0).round(),
        unit: VolumeUnit::Sets,
        reasoning: format!(
            "Hipertrofia: base {}-{} · fase {:?} ({}x) · intensidad ({}x)",
            base_min, base_max, phase, phase_factor, intensity_factor
        ),
    }
}

const MAX_PRODUCTIVE_SESSION_SETS: f64 = 12.0;
const SESSION_WARNING_SETS: f64 = 10.0;
const DEFICIT_SESSION_FACTOR: f64 = 0.8;

/// Outcome of a per-session volume check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionVolumeCheck {
    pub is_valid: bool,
    pub message: Option<String>,
}

/// Checks sets for one muscle in one session against the productive cap
pub fn validate_session_volume(sets: f64, muscle_group: &str, deficit: bool) -> SessionVolumeCheck {
    let factor = if deficit { DEFICIT_SESSION_FACTOR } else { 1.0 };
    let max_sets = (MAX_PRODUCTIVE_SESSION_SETS * factor).round();
    let warn_sets = (SESSION_WARNING_SETS * factor).round();

    if sets > max_sets {
        let message = if deficit {
            format!(
                "En déficit: {} series de {} superan el límite recomendado ({})",
                sets, muscle_group, max_sets
            )
        } else {
            format!(
                "{} series de {} en una sesión superan el límite productivo ({}), reparte en dos días",
                sets, muscle_group, max_sets
            )
        };
        return SessionVolumeCheck { is_valid: false, message: Some(message) };
    }

    if sets >= warn_sets {
        return SessionVolumeCheck {
            is_valid: true,
            message: Some(format!("Cerca del límite por sesión ({}/{})", sets, max_sets)),
        };
    }

    SessionVolumeCheck { is_valid: true, message: None }
}
