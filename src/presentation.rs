//! Display-ready views over the engine outputs
//!
//! Pure mappings from numbers to labels and color tiers. Rendering itself is
//! left to the caller.

use crate::hierarchy::normalize_muscle_name;
use crate::models::{BatterySystem, DetailedMuscleVolumeAnalysis, TrainingMode};
use crate::recovery::BatteryReport;
use crate::thresholds::{classify, MuscleVolumeThresholds, VolumeStatus};
use serde::{Deserialize, Serialize};

/// Color family for a displayed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTier {
    Muted,
    Info,
    Good,
    Warning,
    Critical,
}

impl ColorTier {
    pub fn for_volume(status: VolumeStatus) -> Self {
        match status {
            VolumeStatus::Inactive => ColorTier::Muted,
            VolumeStatus::Maintenance => ColorTier::Info,
            VolumeStatus::Optimal => ColorTier::Good,
            VolumeStatus::Overreach => ColorTier::Critical,
        }
    }

    pub fn for_battery(value: f64) -> Self {
        if value >= 70.0 {
            ColorTier::Good
        } else if value >= 40.0 {
            ColorTier::Warning
        } else {
            ColorTier::Critical
        }
    }
}

/// One muscle group row of the volume view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeViewItem {
    pub muscle_group: String,
    pub sets: f64,
    pub label: String,
    pub status: VolumeStatus,
    pub color_tier: ColorTier,
    /// Sets as a share of the max threshold, capped at 100
    pub percent: f64,
    pub range_label: String,
}

/// Classify every analyzed muscle group against its thresholds
pub fn volume_view<F>(
    analysis: &[DetailedMuscleVolumeAnalysis],
    thresholds: F,
    mode: TrainingMode,
) -> Vec<VolumeViewItem>
where
    F: Fn(&str) -> MuscleVolumeThresholds,
{
    analysis
        .iter()
        .map(|item| {
            let limits = thresholds(&item.muscle_group);
            let sets = item.display_volume;
            let status = classify(sets, &limits, mode);
            let percent = if limits.max > 0.0 {
                (sets / limits.max * 100.0).clamp(0.0, 100.0).round()
            } else {
                0.0
            };

            VolumeViewItem {
                muscle_group: item.muscle_group.clone(),
                sets,
                label: status.short_label(mode).to_string(),
                status,
                color_tier: ColorTier::for_volume(status),
                percent,
                range_label: limits.range_label,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryViewItem {
    pub system: BatterySystem,
    pub label: String,
    pub value: f64,
    pub color_tier: ColorTier,
}

pub fn battery_view(report: &BatteryReport) -> Vec<BatteryViewItem> {
    [
        (BatterySystem::Cns, report.cns),
        (BatterySystem::Muscular, report.muscular),
        (BatterySystem::Spinal, report.spinal),
    ]
    .into_iter()
    .map(|(system, value)| BatteryViewItem {
        system,
        label: system.to_string(),
        value: value.round(),
        color_tier: ColorTier::for_battery(value),
    })
    .collect()
}

/// Body regions and the display groups shown under each
pub const REGION_MAPPING: &[(&str, &[&str])] = &[
    ("Pecho y Core", &["Pectoral", "Abdomen", "Oblicuos"]),
    (
        "Espalda",
        &["Dorsales", "Trapecio", "Espalda Baja", "Erectores Espinales", "Cuadrado Lumbar"],
    ),
    ("Piernas", &["Cuádriceps", "Isquiosurales", "Glúteos", "Pantorrillas", "Aductores"]),
    (
        "Hombros",
        &["Deltoides", "Deltoides Anterior", "Deltoides Lateral", "Deltoides Posterior"],
    ),
    ("Brazos", &["Bíceps", "Tríceps", "Antebrazo", "Antebrazos", "Braquial"]),
];

pub fn region_of(muscle_group: &str) -> Option<&'static str> {
    let key = normalize_muscle_name(muscle_group);
    REGION_MAPPING
        .iter()
        .find(|(_, members)| members.iter().any(|m| normalize_muscle_name(m) == key))
        .map(|(region, _)| *region)
}

/// Items grouped by region in display order. Groups outside every region are
/// collected under "Otros".
pub fn group_by_region<T, F>(items: &[T], muscle_group: F) -> Vec<(String, Vec<&T>)>
where
    F: Fn(&T) -> &str,
{
    let mut regions: Vec<(String, Vec<&T>)> = REGION_MAPPING
        .iter()
        .map(|(region, _)| (region.to_string(), Vec::new()))
        .collect();
    let mut others = Vec::new();

    for item in items {
        match region_of(muscle_group(item)).and_then(|r| regions.iter_mut().find(|(name, _)| name == r)) {
            Some((_, members)) => members.push(item),
            None => others.push(item),
        }
    }

    if !others.is_empty() {
        regions.push(("Otros".to_string(), others));
    }
    regions.retain(|(_, members)| !members.is_empty());
    regions
}

/// Label and tier for a session stress score
pub fn classify_stress_level(score: f64) -> (&'static str, ColorTier) {
    if score < 40.0 {
        ("Bajo", ColorTier::Info)
    } else if score < 80.0 {
        ("Óptimo", ColorTier::Good)
    } else if score < 120.0 {
        ("Alto", ColorTier::Warning)
    } else {
        ("Excesivo", ColorTier::Critical)
    }
}

/// Interpretation and tier for an acute:chronic workload ratio
pub fn classify_acwr(acwr: f64) -> (&'static str, ColorTier) {
    if acwr < 0.8 {
        ("Sub-entrenando", ColorTier::Info)
    } else if acwr > 1.5 {
        ("Alto Riesgo", ColorTier::Critical)
    } else if acwr > 1.3 {
        ("Zona de Riesgo", ColorTier::Warning)
    } else {
        ("Zona Segura", ColorTier::Good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::{ThresholdContext, ThresholdEngine};

    fn create_test_analysis(group: &str, sets: f64) -> DetailedMuscleVolumeAnalysis {
        DetailedMuscleVolumeAnalysis {
            muscle_group: group.to_string(),
            display_volume: sets,
            fractional_volume: sets,
            direct_exercises: Vec::new(),
            indirect_exercises: Vec::new(),
            frequency: 1.0,
            indirect_frequency: 0.0,
        }
    }

    #[test]
    fn test_volume_view_powerlifting() {
        let engine = ThresholdEngine::new();
        let ctx = ThresholdContext {
            program_mode: Some(TrainingMode::Powerlifting),
            ..ThresholdContext::default()
        };
        let analysis = vec![
            create_test_analysis("Cuádriceps", 13.0),
            create_test_analysis("Pectoral", 12.0),
            create_test_analysis("Bíceps", 5.0),
            create_test_analysis("Tríceps", 0.0),
        ];

        let view = volume_view(&analysis, |g| engine.thresholds_for(g, &ctx), TrainingMode::Powerlifting);
        let labels: Vec<&str> = view.iter().map(|v| v.label.as_str()).collect();

        assert_eq!(labels, vec!["Alto", "Óptimo", "Bajo", "Min"]);
        assert_eq!(view[0].color_tier, ColorTier::Critical);
        assert_eq!(view[0].percent, 100.0);
        assert_eq!(view[1].percent, 100.0);
    }

    #[test]
    fn test_battery_view_tiers() {
        let mut report = BatteryReport::fully_recovered();
        report.muscular = 55.0;
        report.spinal = 12.4;

        let view = battery_view(&report);
        assert_eq!(view[0].color_tier, ColorTier::Good);
        assert_eq!(view[1].color_tier, ColorTier::Warning);
        assert_eq!(view[2].color_tier, ColorTier::Critical);
        assert_eq!(view[2].label, "Columna");
        assert_eq!(view[2].value, 12.0);
    }

    #[test]
    fn test_group_by_region() {
        let analysis = vec![
            create_test_analysis("Cuádriceps", 10.0),
            create_test_analysis("Deltoides Lateral", 8.0),
            create_test_analysis("Cuello", 2.0),
            create_test_analysis("Pectoral", 12.0),
        ];

        let regions = group_by_region(&analysis, |a| a.muscle_group.as_str());
        let names: Vec<&str> = regions.iter().map(|(r, _)| r.as_str()).collect();

        assert_eq!(names, vec!["Pecho y Core", "Piernas", "Hombros", "Otros"]);
        assert_eq!(regions[3].1[0].muscle_group, "Cuello");
    }

    #[test]
    fn test_stress_and_acwr_labels() {
        assert_eq!(classify_stress_level(39.9).0, "Bajo");
        assert_eq!(classify_stress_level(80.0).0, "Alto");
        assert_eq!(classify_stress_level(150.0).0, "Excesivo");

        assert_eq!(classify_acwr(0.5).0, "Sub-entrenando");
        assert_eq!(classify_acwr(1.3).0, "Zona Segura");
        assert_eq!(classify_acwr(1.4).0, "Zona de Riesgo");
        assert_eq!(classify_acwr(1.6).0, "Alto Riesgo");
    }
}
