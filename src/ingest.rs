//! JSON ingestion
//!
//! Exported app data comes in several historical shapes: camelCase keys,
//! `completedExercises` or `exercises`, numbers stored as strings, exercise
//! ids under two different keys. Everything is normalized into
//! the canonical model here, once. Records that cannot be salvaged are
//! skipped with a warning; only a document with the wrong overall shape is
//! an error.

use crate::error::{IngestError, LiftRsError, Result};
use crate::hierarchy::{HierarchyDocument, MuscleHierarchy};
use crate::models::{
    AlgorithmSettings, AthleteScore, AthleteType, BatteryCalibration, Block, CalorieObjective, CompletedExercise,
    DailyWellbeingLog, DropSet, ExerciseMuscleInfo, ExerciseSet, ExerciseType, Gender, IntensityLevel,
    InvolvedMuscle, Macrocycle, Mesocycle, MesocyclePhase, MuscleFeedback, MuscleRole, NutritionLog,
    PlannedExercise, PostSessionFeedback, PreferredIntensity, ProfileLevel, Program, ProgramWeek, RestPause, Session, SessionPart, Settings, SleepLog,
    TrainingMode, UserVitals, VolumeLimit, WorkoutLog,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read and parse a JSON file
pub fn load_json_file<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let content = fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)?;
    debug!("Loaded {}", path.display());
    Ok(value)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The record list of a document: a bare array, or an object wrapping one
/// under any of `wrappers`
fn root_array<'a>(doc: &'a Value, what: &str, wrappers: &[&str]) -> std::result::Result<&'a [Value], IngestError> {
    if let Some(items) = doc.as_array() {
        return Ok(items);
    }
    wrappers
        .iter()
        .find_map(|key| doc.get(key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .ok_or_else(|| IngestError::UnexpectedRoot {
            expected: format!("an array of {}", what),
            found: kind_of(doc).to_string(),
        })
}

/// First present, non-null field among `keys`
fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(k).filter(|v| !v.is_null()))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn number(value: &Value, keys: &[&str]) -> Option<f64> {
    field(value, keys).and_then(as_number)
}

fn count(value: &Value, keys: &[&str]) -> Option<u32> {
    number(value, keys).map(|n| if n > 0.0 { n.round() as u32 } else { 0 })
}

fn text(value: &Value, keys: &[&str]) -> Option<String> {
    match field(value, keys)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: &Value, keys: &[&str]) -> bool {
    match field(value, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn strings(value: &Value, keys: &[&str]) -> Vec<String> {
    field(value, keys)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn items<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    field(value, keys).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// RFC 3339, a naive timestamp (taken as UTC) or a bare date at midnight UTC
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(raw).map(|dt| dt.date_naive()))
}

fn lowercase(value: &Value, keys: &[&str]) -> Option<String> {
    text(value, keys).map(|s| s.to_lowercase())
}

/// Keep the parsed records, log and drop the rest
fn collect_records<T>(
    records: &[Value],
    what: &str,
    parse: impl Fn(&Value) -> std::result::Result<T, IngestError>,
) -> Vec<T> {
    let mut parsed = Vec::with_capacity(records.len());
    for record in records {
        match parse(record) {
            Ok(item) => parsed.push(item),
            Err(e) => warn!("Skipping {}: {}", what, e),
        }
    }
    if parsed.len() < records.len() {
        info!("Loaded {} of {} {}", parsed.len(), records.len(), what);
    }
    parsed
}

// ---- catalog ----

fn parse_role(raw: Option<String>) -> MuscleRole {
    match raw.as_deref().map(str::parse::<MuscleRole>) {
        Some(Ok(role)) => role,
        Some(Err(e)) => {
            debug!("{}, counting as secondary", e);
            MuscleRole::Secondary
        }
        None => MuscleRole::Secondary,
    }
}

fn parse_involved_entry(value: &Value) -> Option<InvolvedMuscle> {
    let muscle = text(value, &["muscle", "name"])?;
    let role = parse_role(text(value, &["role"]));
    let activation = number(value, &["activation"]).unwrap_or(1.0);
    Some(InvolvedMuscle::new(muscle, role, activation))
}

/// Involved muscles; anything other than a list is malformed and skipped
fn parse_involved_muscles(value: Option<&Value>) -> Vec<InvolvedMuscle> {
    match value {
        Some(Value::Array(entries)) => entries.iter().filter_map(parse_involved_entry).collect(),
        Some(other) => {
            debug!("Ignoring involved muscles given as {}", kind_of(other));
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn parse_exercise_type(raw: Option<String>) -> ExerciseType {
    match raw.map(|s| s.to_lowercase()).as_deref() {
        Some("básico" | "basico" | "basic" | "compound") => ExerciseType::Basic,
        Some("aislamiento" | "isolation") => ExerciseType::Isolation,
        _ => ExerciseType::Accessory,
    }
}

/// One catalog entry. Needs at least an id or a name.
pub fn parse_catalog_entry(value: &Value) -> std::result::Result<ExerciseMuscleInfo, IngestError> {
    let id = text(value, &["id"]);
    let name = text(value, &["name"]);
    if id.is_none() && name.is_none() {
        return Err(IngestError::MissingField {
            record: "catalog entry".to_string(),
            field: "name".to_string(),
        });
    }
    let name = name.or_else(|| id.clone()).unwrap_or_default();
    let id = id.unwrap_or_else(|| name.to_lowercase().replace(' ', "-"));

    let mut info = ExerciseMuscleInfo::new(id, name);
    info.equipment = text(value, &["equipment"]).unwrap_or_default();
    info.category = text(value, &["category"]).unwrap_or_default();
    info.force = text(value, &["force"]).unwrap_or_default();
    info.exercise_type = parse_exercise_type(text(value, &["type", "exerciseType"]));
    info.involved_muscles = parse_involved_muscles(field(value, &["involvedMuscles", "involved_muscles"]));
    info.efc = number(value, &["efc"]);
    info.ssc = number(value, &["ssc", "axialLoadFactor"]);
    info.cnc = number(value, &["cnc"]);
    info.posture_factor = number(value, &["postureFactor", "posture_factor"]);
    info.calculated_1rm = number(value, &["calculated1RM", "calculated_1rm"]).filter(|rm| *rm > 0.0);
    info.is_custom = flag(value, &["isCustom", "is_custom"]);
    Ok(info)
}

/// Exercise catalog document
pub fn parse_catalog(doc: &Value) -> Result<Vec<ExerciseMuscleInfo>> {
    let records = root_array(doc, "exercises", &["exercises", "exerciseList", "catalog"])?;
    Ok(collect_records(records, "catalog entries", parse_catalog_entry))
}

// ---- sets and exercises ----

fn parse_set(value: &Value) -> ExerciseSet {
    let mode = lowercase(value, &["intensityMode"]);
    let performance = lowercase(value, &["performanceMode"]);

    ExerciseSet {
        weight: number(value, &["weight", "consolidatedWeight"]),
        target_reps: count(value, &["targetReps", "target_reps"]),
        completed_reps: count(value, &["completedReps", "completed_reps", "reps"]),
        target_rpe: number(value, &["targetRPE", "targetRpe", "target_rpe"]),
        completed_rpe: number(value, &["completedRPE", "completedRpe", "completed_rpe", "rpe"]),
        target_rir: number(value, &["targetRIR", "targetRir", "target_rir"]),
        completed_rir: number(value, &["completedRIR", "completedRir", "completed_rir", "rir"]),
        is_failure: flag(value, &["isFailure", "is_failure"])
            || performance.as_deref() == Some("failure")
            || mode.as_deref() == Some("failure"),
        is_amrap: flag(value, &["isAmrap", "is_amrap"]) || mode.as_deref() == Some("amrap"),
        is_ineffective: flag(value, &["isIneffective", "is_ineffective"]),
        drop_sets: items(value, &["dropSets", "drop_sets"])
            .iter()
            .map(|d| DropSet {
                weight: number(d, &["weight"]),
                reps: count(d, &["reps"]).unwrap_or(0),
            })
            .filter(|d| d.reps > 0)
            .collect(),
        rest_pauses: items(value, &["restPauses", "rest_pauses"])
            .iter()
            .map(|r| RestPause {
                reps: count(r, &["reps"]).unwrap_or(0),
            })
            .filter(|r| r.reps > 0)
            .collect(),
        partial_reps: count(value, &["partialReps", "partial_reps"]).unwrap_or(0),
    }
}

fn parse_sets(value: &Value) -> Vec<ExerciseSet> {
    items(value, &["sets"]).iter().map(parse_set).collect()
}

fn parse_completed_exercise(value: &Value) -> Option<CompletedExercise> {
    let db_id = text(value, &["exerciseDbId", "exercise_db_id"]);
    let name = text(value, &["exerciseName", "exercise_name", "name"]);
    if db_id.is_none() && name.is_none() {
        debug!("Dropping exercise with neither catalog id nor name");
        return None;
    }

    let mut exercise = CompletedExercise::new(name.unwrap_or_default(), parse_sets(value));
    if let Some(id) = text(value, &["exerciseId", "exercise_id", "id"]) {
        exercise.exercise_id = id;
    }
    // older exports only carried the catalog id in exerciseId
    exercise.exercise_db_id = db_id.or_else(|| text(value, &["exerciseId"]));
    Some(exercise)
}

fn parse_planned_exercise(value: &Value) -> Option<PlannedExercise> {
    let db_id = text(value, &["exerciseDbId", "exercise_db_id", "exerciseId"]);
    let name = text(value, &["name", "exerciseName"]);
    if db_id.is_none() && name.is_none() {
        return None;
    }

    let mut exercise = PlannedExercise::new(name.unwrap_or_default(), parse_sets(value));
    if let Some(id) = text(value, &["id"]) {
        exercise.id = id;
    }
    exercise.exercise_db_id = db_id;
    exercise.rest_seconds = count(value, &["restTime", "rest_seconds", "restSeconds"]);
    Some(exercise)
}

// ---- workout logs ----

/// One workout log. Needs an id and a parseable date.
pub fn parse_workout_log(value: &Value) -> std::result::Result<WorkoutLog, IngestError> {
    let id = text(value, &["id"]).ok_or_else(|| IngestError::MissingField {
        record: "workout log".to_string(),
        field: "id".to_string(),
    })?;
    let record = format!("workout log {}", id);
    let raw_date = text(value, &["date"]).ok_or_else(|| IngestError::MissingField {
        record: record.clone(),
        field: "date".to_string(),
    })?;
    let date = parse_datetime(&raw_date).ok_or(IngestError::InvalidDate {
        record,
        value: raw_date,
    })?;

    let exercises = items(value, &["completedExercises", "completed_exercises", "exercises"])
        .iter()
        .filter_map(parse_completed_exercise)
        .collect();

    let mut log = WorkoutLog::new(id, date, exercises);
    log.program_id = text(value, &["programId", "program_id"]).unwrap_or_default();
    log.session_id = text(value, &["sessionId", "session_id"]).unwrap_or_default();
    log.session_name = text(value, &["sessionName", "session_name"]).unwrap_or_default();
    log.duration_seconds = number(value, &["duration", "durationSeconds", "duration_seconds"])
        .filter(|d| *d > 0.0)
        .map(|d| d.round() as u32);
    log.discomforts = strings(value, &["discomforts"]);
    Ok(log)
}

/// Workout history document, sorted by date
pub fn parse_workout_logs(doc: &Value) -> Result<Vec<WorkoutLog>> {
    let records = root_array(doc, "workout logs", &["history", "workoutLogs", "logs"])?;
    let mut logs = collect_records(records, "workout logs", parse_workout_log);
    logs.sort_by_key(|l| l.date);
    Ok(logs)
}

// ---- planned sessions and programs ----

pub fn parse_session(value: &Value) -> std::result::Result<Session, IngestError> {
    let id = text(value, &["id"]).unwrap_or_default();
    let name = text(value, &["name"]).unwrap_or_else(|| id.clone());
    let exercises = items(value, &["exercises"]).iter().filter_map(parse_planned_exercise).collect();

    let mut session = Session::new(id, name, exercises);
    session.day_of_week = count(value, &["dayOfWeek", "day_of_week"]).and_then(|d| u8::try_from(d).ok());
    session.parts = items(value, &["parts"])
        .iter()
        .map(|part| SessionPart {
            name: text(part, &["name"]),
            exercises: items(part, &["exercises"]).iter().filter_map(parse_planned_exercise).collect(),
        })
        .collect();
    Ok(session)
}

pub fn parse_sessions(doc: &Value) -> Result<Vec<Session>> {
    let records = root_array(doc, "sessions", &["sessions"])?;
    Ok(collect_records(records, "sessions", parse_session))
}

fn parse_week(value: &Value) -> std::result::Result<ProgramWeek, IngestError> {
    let id = text(value, &["id"]).unwrap_or_default();
    let records = items(value, &["sessions"]);
    Ok(ProgramWeek {
        name: text(value, &["name"]).unwrap_or_else(|| id.clone()),
        id,
        sessions: collect_records(records, "sessions", parse_session),
    })
}

fn parse_phase(raw: Option<String>) -> MesocyclePhase {
    match raw.map(|s| s.to_lowercase()).as_deref() {
        Some("intensificación" | "intensificacion" | "intensification") => MesocyclePhase::Intensification,
        Some("realización" | "realizacion" | "realization" | "peaking") => MesocyclePhase::Realization,
        Some("descarga" | "deload") => MesocyclePhase::Deload,
        Some("acumulación" | "acumulacion" | "accumulation") | None => MesocyclePhase::Accumulation,
        Some(_) => MesocyclePhase::Custom,
    }
}

/// Full program tree
pub fn parse_program(doc: &Value) -> Result<Program> {
    if !doc.is_object() {
        return Err(IngestError::UnexpectedRoot {
            expected: "a program object".to_string(),
            found: kind_of(doc).to_string(),
        }
        .into());
    }

    let named = |v: &Value| {
        let id = text(v, &["id"]).unwrap_or_default();
        let name = text(v, &["name"]).unwrap_or_else(|| id.clone());
        (id, name)
    };

    let macrocycles = items(doc, &["macrocycles"])
        .iter()
        .map(|macro_value| {
            let (id, name) = named(macro_value);
            let blocks = items(macro_value, &["blocks"])
                .iter()
                .map(|block_value| {
                    let (id, name) = named(block_value);
                    let mesocycles = items(block_value, &["mesocycles"])
                        .iter()
                        .map(|meso_value| {
                            let (id, name) = named(meso_value);
                            Mesocycle {
                                id,
                                name,
                                goal: parse_phase(text(meso_value, &["goal"])),
                                weeks: collect_records(items(meso_value, &["weeks"]), "weeks", parse_week),
                            }
                        })
                        .collect();
                    Block { id, name, mesocycles }
                })
                .collect();
            Macrocycle { id, name, blocks }
        })
        .collect();

    let (id, name) = named(doc);
    Ok(Program {
        id,
        name,
        mode: text(doc, &["mode", "trainingMode"])
            .and_then(|m| m.parse().ok())
            .unwrap_or_default(),
        macrocycles,
    })
}

/// Weeks from either a week list or a whole program
pub fn parse_weeks(doc: &Value) -> Result<Vec<ProgramWeek>> {
    if doc.get("macrocycles").is_some() {
        let program = parse_program(doc)?;
        return Ok(program.all_weeks().into_iter().cloned().collect());
    }
    let records = root_array(doc, "weeks", &["weeks"])?;
    Ok(collect_records(records, "weeks", parse_week))
}

// ---- lifestyle logs ----

fn parse_sleep_log(value: &Value) -> std::result::Result<SleepLog, IngestError> {
    let raw_end = text(value, &["endTime", "end_time"]).ok_or_else(|| IngestError::MissingField {
        record: "sleep log".to_string(),
        field: "endTime".to_string(),
    })?;
    let end_time = parse_datetime(&raw_end).ok_or_else(|| IngestError::InvalidDate {
        record: "sleep log".to_string(),
        value: raw_end.clone(),
    })?;
    let date = text(value, &["date"])
        .and_then(|d| parse_date(&d))
        .unwrap_or_else(|| end_time.date_naive());
    let duration_hours = number(value, &["duration", "durationHours", "duration_hours"]).unwrap_or(0.0);

    Ok(SleepLog {
        date,
        end_time,
        duration_hours,
    })
}

pub fn parse_sleep_logs(doc: &Value) -> Result<Vec<SleepLog>> {
    let records = root_array(doc, "sleep logs", &["sleepLogs"])?;
    Ok(collect_records(records, "sleep logs", parse_sleep_log))
}

fn parse_intensity(raw: Option<String>) -> Option<IntensityLevel> {
    match raw?.to_lowercase().as_str() {
        "light" | "ligera" => Some(IntensityLevel::Light),
        "moderate" | "moderada" => Some(IntensityLevel::Moderate),
        "high" | "alta" => Some(IntensityLevel::High),
        _ => None,
    }
}

fn scale(value: &Value, keys: &[&str], default: u8) -> u8 {
    count(value, keys).map_or(default, |v| v.clamp(1, 5) as u8)
}

fn parse_wellbeing_log(value: &Value) -> std::result::Result<DailyWellbeingLog, IngestError> {
    let raw_date = text(value, &["date"]).ok_or_else(|| IngestError::MissingField {
        record: "wellbeing log".to_string(),
        field: "date".to_string(),
    })?;
    let date = parse_date(&raw_date).ok_or(IngestError::InvalidDate {
        record: "wellbeing log".to_string(),
        value: raw_date,
    })?;

    Ok(DailyWellbeingLog {
        date,
        sleep_quality: scale(value, &["sleepQuality", "sleep_quality"], 3),
        stress_level: scale(value, &["stressLevel", "stress_level"], 3),
        doms: scale(value, &["doms"], 1),
        motivation: scale(value, &["motivation"], 3),
        work_intensity: parse_intensity(text(value, &["workIntensity", "work_intensity"])),
        study_intensity: parse_intensity(text(value, &["studyIntensity", "study_intensity"])),
    })
}

pub fn parse_wellbeing_logs(doc: &Value) -> Result<Vec<DailyWellbeingLog>> {
    let records = root_array(doc, "wellbeing logs", &["dailyWellbeingLogs", "wellbeingLogs"])?;
    Ok(collect_records(records, "wellbeing logs", parse_wellbeing_log))
}

fn parse_nutrition_log(value: &Value) -> std::result::Result<NutritionLog, IngestError> {
    let raw_date = text(value, &["date"]).ok_or_else(|| IngestError::MissingField {
        record: "nutrition log".to_string(),
        field: "date".to_string(),
    })?;
    let date = parse_datetime(&raw_date).ok_or(IngestError::InvalidDate {
        record: "nutrition log".to_string(),
        value: raw_date,
    })?;

    let calories = number(value, &["calories"]).or_else(|| {
        let foods = items(value, &["foods"]);
        let total: f64 = foods.iter().filter_map(|f| number(f, &["calories"])).sum();
        (!foods.is_empty()).then_some(total)
    });

    Ok(NutritionLog { date, calories })
}

/// Nutrition logs; planned meals are not counted
pub fn parse_nutrition_logs(doc: &Value) -> Result<Vec<NutritionLog>> {
    let records = root_array(doc, "nutrition logs", &["nutritionLogs"])?;
    let consumed: Vec<Value> = records
        .iter()
        .filter(|r| lowercase(r, &["status"]).as_deref() != Some("planned"))
        .cloned()
        .collect();
    Ok(collect_records(&consumed, "nutrition logs", parse_nutrition_log))
}

fn parse_muscle_feedback(value: &Value) -> MuscleFeedback {
    MuscleFeedback {
        doms: scale(value, &["doms"], 1),
        joint_pain: flag(value, &["jointPain", "joint_pain"]),
        strength_capacity: count(value, &["strengthCapacity", "strength_capacity"]).map(|v| v.min(10) as u8),
        notes: text(value, &["notes"]).unwrap_or_default(),
    }
}

fn parse_feedback_entry(value: &Value) -> std::result::Result<PostSessionFeedback, IngestError> {
    let raw_date = text(value, &["date"]).ok_or_else(|| IngestError::MissingField {
        record: "session feedback".to_string(),
        field: "date".to_string(),
    })?;
    let date = parse_datetime(&raw_date).ok_or(IngestError::InvalidDate {
        record: "session feedback".to_string(),
        value: raw_date,
    })?;

    let feedback = field(value, &["feedback"])
        .and_then(Value::as_object)
        .map(|muscles| {
            muscles
                .iter()
                .filter(|(muscle, report)| !muscle.trim().is_empty() && report.is_object())
                .map(|(muscle, report)| (muscle.trim().to_string(), parse_muscle_feedback(report)))
                .collect()
        })
        .unwrap_or_default();

    Ok(PostSessionFeedback {
        log_id: text(value, &["logId", "log_id"]).unwrap_or_default(),
        date,
        cns_recovery: number(value, &["cnsRecovery", "cns_recovery"]),
        feedback,
    })
}

/// Post-session questionnaires with per-muscle soreness
pub fn parse_post_session_feedback(doc: &Value) -> Result<Vec<PostSessionFeedback>> {
    let records = root_array(doc, "session feedback", &["postSessionFeedback", "feedback"])?;
    Ok(collect_records(records, "session feedback", parse_feedback_entry))
}

// ---- hierarchy and settings ----

/// Hierarchy document, wrapped in `bodyPartHierarchy` or bare
pub fn parse_hierarchy(doc: &Value) -> Result<MuscleHierarchy> {
    if !doc.is_object() {
        return Err(IngestError::UnexpectedRoot {
            expected: "a muscle hierarchy object".to_string(),
            found: kind_of(doc).to_string(),
        }
        .into());
    }
    let wrapped = doc.get("bodyPartHierarchy").or_else(|| doc.get("body_part_hierarchy"));
    let body_parts = wrapped.unwrap_or(doc).clone();
    let document = HierarchyDocument {
        body_part_hierarchy: serde_json::from_value(body_parts)?,
    };
    Ok(MuscleHierarchy::from(document))
}

fn parse_athlete_type(raw: Option<String>) -> AthleteType {
    match raw.map(|s| s.to_lowercase()).as_deref() {
        Some("hybrid") => AthleteType::Hybrid,
        Some("calisthenics") => AthleteType::Calisthenics,
        Some("bodybuilder") => AthleteType::Bodybuilder,
        Some("powerbuilder") => AthleteType::Powerbuilder,
        Some("powerlifter" | "zercher_lifter") => AthleteType::Powerlifter,
        Some("weightlifter") => AthleteType::Weightlifter,
        Some("parapowerlifter") => AthleteType::Parapowerlifter,
        _ => AthleteType::Enthusiast,
    }
}

fn parse_preferred_intensity(raw: Option<String>) -> PreferredIntensity {
    match raw.map(|s| s.to_lowercase()).as_deref() {
        Some("failure") => PreferredIntensity::Failure,
        Some("rir_low") => PreferredIntensity::RirLow,
        _ => PreferredIntensity::RirHigh,
    }
}

fn parse_gender(raw: Option<String>) -> Option<Gender> {
    match raw?.to_lowercase().as_str() {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        "transmale" => Some(Gender::Transmale),
        "transfemale" => Some(Gender::Transfemale),
        "other" => Some(Gender::Other),
        _ => None,
    }
}

fn parse_calorie_objective(raw: Option<String>) -> CalorieObjective {
    match raw.map(|s| s.to_lowercase()).as_deref() {
        Some("deficit") => CalorieObjective::Deficit,
        Some("surplus") => CalorieObjective::Surplus,
        _ => CalorieObjective::Maintenance,
    }
}

/// App settings. Every field is optional; unknown keys are ignored.
pub fn parse_settings(doc: &Value) -> Result<Settings> {
    if !doc.is_object() {
        return Err(LiftRsError::Ingest(IngestError::UnexpectedRoot {
            expected: "a settings object".to_string(),
            found: kind_of(doc).to_string(),
        }));
    }

    let mut settings = Settings {
        athlete_type: parse_athlete_type(text(doc, &["athleteType", "athlete_type"])),
        preferred_intensity: parse_preferred_intensity(text(doc, &["preferredIntensity", "preferred_intensity"])),
        calorie_goal_objective: parse_calorie_objective(text(doc, &["calorieGoalObjective", "calorie_goal_objective"])),
        daily_calorie_goal: number(doc, &["dailyCalorieGoal", "daily_calorie_goal"]).filter(|g| *g > 0.0),
        ..Settings::default()
    };

    if let Some(mode) = text(doc, &["trainingMode", "training_mode", "trainingProfile"]) {
        match mode.parse::<TrainingMode>() {
            Ok(mode) => settings.training_mode = mode,
            Err(e) => warn!("{}, keeping {:?}", e, settings.training_mode),
        }
    }

    if let Some(score) = field(doc, &["athleteScore", "athlete_score"]) {
        let level = match lowercase(score, &["profileLevel", "profile_level"]).as_deref() {
            Some("advanced" | "avanzado") => ProfileLevel::Advanced,
            _ => ProfileLevel::Beginner,
        };
        settings.athlete_score = Some(AthleteScore {
            total_score: number(score, &["totalScore", "total_score"]).unwrap_or(0.0),
            profile_level: level,
        });
    }

    if let Some(Value::Object(limits)) = field(doc, &["volumeLimits", "volume_limits"]) {
        settings.volume_limits = limits
            .iter()
            .filter_map(|(muscle, limit)| {
                let max = number(limit, &["max"])?;
                Some((
                    muscle.clone(),
                    VolumeLimit {
                        min: number(limit, &["min"]),
                        max,
                        max_session: number(limit, &["maxSession", "max_session"]),
                    },
                ))
            })
            .collect::<BTreeMap<_, _>>();
    }

    if let Some(calibration) = field(doc, &["batteryCalibration", "battery_calibration"]) {
        settings.battery_calibration = BatteryCalibration {
            cns_delta: number(calibration, &["cnsDelta", "cns_delta"]).unwrap_or(0.0),
            muscular_delta: number(calibration, &["muscularDelta", "muscular_delta"]).unwrap_or(0.0),
            spinal_delta: number(calibration, &["spinalDelta", "spinal_delta"]).unwrap_or(0.0),
            last_calibrated: text(calibration, &["lastCalibrated", "last_calibrated"]).and_then(|d| parse_datetime(&d)),
        };
    }

    if let Some(vitals) = field(doc, &["userVitals", "user_vitals"]) {
        settings.user_vitals = UserVitals {
            age: count(vitals, &["age"]).filter(|a| *a > 0),
            gender: parse_gender(text(vitals, &["gender"])),
            work_intensity: parse_intensity(text(vitals, &["workIntensity", "work_intensity"])),
        };
    }

    if let Some(algorithm) = field(doc, &["algorithmSettings", "algorithm"]) {
        let toggle = |keys: &[&str]| match field(algorithm, keys) {
            Some(_) => flag(algorithm, keys),
            None => true,
        };
        settings.algorithm = AlgorithmSettings {
            sleep_tracking: toggle(&["augeEnableSleepTracking", "sleep_tracking"]),
            nutrition_tracking: toggle(&["augeEnableNutritionTracking", "nutrition_tracking"]),
        };
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_shapes() {
        let doc = json!([
            {
                "id": "sq",
                "name": "Sentadilla",
                "type": "Básico",
                "equipment": "Barra",
                "involvedMuscles": [
                    {"muscle": "Cuádriceps", "role": "primary", "activation": "1"},
                    {"muscle": "Glúteos", "role": "secondary", "activation": 0.7}
                ],
                "axialLoadFactor": 1.5,
                "calculated1RM": "140"
            },
            {"id": "curl", "name": "Curl", "involvedMuscles": {"Bíceps": "primary"}},
            {"id": "press", "name": "Press", "involvedMuscles": {"muscle": "Pectoral", "role": "primary"}},
            {"id": "odd", "name": "Raro", "involvedMuscles": "Pectoral"},
            {"equipment": "Barra"}
        ]);

        let catalog = parse_catalog(&doc).unwrap();
        assert_eq!(catalog.len(), 4);

        let squat = &catalog[0];
        assert_eq!(squat.exercise_type, ExerciseType::Basic);
        assert_eq!(squat.involved_muscles.len(), 2);
        assert_eq!(squat.involved_muscles[1].activation, 0.7);
        assert_eq!(squat.ssc, Some(1.5));
        assert_eq!(squat.calculated_1rm, Some(140.0));

        assert_eq!(catalog[1].name, "Curl");
        assert!(catalog[1..].iter().all(|e| e.involved_muscles.is_empty()));
    }

    #[test]
    fn test_wrong_root_is_an_error() {
        let err = parse_catalog(&json!("nope")).unwrap_err();
        assert!(matches!(err, LiftRsError::Ingest(IngestError::UnexpectedRoot { .. })));

        let wrapped = parse_catalog(&json!({"exercises": [{"id": "a", "name": "A"}]})).unwrap();
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn test_legacy_workout_log() {
        let doc = json!([
            {
                "id": "w2",
                "date": "2024-03-02",
                "sessionName": "Pierna",
                "duration": 5400,
                "exercises": [
                    {"exerciseId": "sq", "name": "Sentadilla", "sets": [
                        {"weight": "100", "reps": 5, "completedRPE": 8},
                        {"weight": 100, "completedReps": 4, "isFailure": true,
                         "dropSets": [{"weight": 80, "reps": 6}]}
                    ]}
                ],
                "discomforts": ["Rodilla"]
            },
            {
                "id": "w1",
                "date": "2024-03-01T18:30:00.000Z",
                "completedExercises": [
                    {"exerciseDbId": "bp", "exerciseName": "Press Banca", "sets": []}
                ]
            },
            {"id": "broken", "date": "ayer"},
            {"date": "2024-03-03"}
        ]);

        let logs = parse_workout_logs(&doc).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, "w1");
        assert_eq!(logs[0].completed_exercises[0].exercise_db_id.as_deref(), Some("bp"));

        let legs = &logs[1];
        assert_eq!(legs.duration_seconds, Some(5400));
        assert_eq!(legs.discomforts, vec!["Rodilla".to_string()]);
        let squat = &legs.completed_exercises[0];
        assert_eq!(squat.exercise_name, "Sentadilla");
        assert_eq!(squat.exercise_db_id.as_deref(), Some("sq"));
        assert_eq!(squat.sets[0].weight, Some(100.0));
        assert_eq!(squat.sets[0].completed_reps, Some(5));
        assert!(squat.sets[1].is_failure);
        assert_eq!(squat.sets[1].drop_sets[0].reps, 6);
    }

    #[test]
    fn test_invalid_date_error() {
        let err = parse_workout_log(&json!({"id": "x", "date": "31/02/2024"})).unwrap_err();
        assert!(matches!(err, IngestError::InvalidDate { .. }));
        let err = parse_workout_log(&json!({"date": "2024-01-01"})).unwrap_err();
        assert!(matches!(err, IngestError::MissingField { .. }));
    }

    #[test]
    fn test_sessions_with_parts() {
        let doc = json!([{
            "id": "s1",
            "name": "Torso",
            "parts": [{"name": "Principal", "exercises": [
                {"id": "e1", "name": "Press Banca", "exerciseDbId": "bp", "restTime": 180,
                 "sets": [{"targetReps": 5, "targetRPE": 8}]}
            ]}]
        }]);

        let sessions = parse_sessions(&doc).unwrap();
        let exercises: Vec<_> = sessions[0].all_exercises().collect();
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].rest_seconds, Some(180));
        assert_eq!(exercises[0].sets[0].target_reps, Some(5));
    }

    #[test]
    fn test_program_weeks() {
        let doc = json!({
            "id": "p",
            "name": "Bloque",
            "mode": "powerlifting",
            "macrocycles": [{"id": "m", "blocks": [{"id": "b", "mesocycles": [
                {"id": "me", "goal": "Descarga", "weeks": [
                    {"id": "w1", "sessions": [{"id": "s", "exercises": []}]},
                    {"id": "w2", "sessions": []}
                ]}
            ]}]}]
        });

        let program = parse_program(&doc).unwrap();
        assert_eq!(program.mode, TrainingMode::Powerlifting);
        assert_eq!(program.macrocycles[0].blocks[0].mesocycles[0].goal, MesocyclePhase::Deload);
        assert_eq!(parse_weeks(&doc).unwrap().len(), 2);
    }

    #[test]
    fn test_lifestyle_logs() {
        let sleep = parse_sleep_logs(&json!([
            {"date": "2024-03-01", "endTime": "2024-03-01T07:00:00Z", "duration": 6.5},
            {"date": "2024-03-02"}
        ]))
        .unwrap();
        assert_eq!(sleep.len(), 1);
        assert_eq!(sleep[0].duration_hours, 6.5);

        let wellbeing = parse_wellbeing_logs(&json!([
            {"date": "2024-03-01", "stressLevel": 9, "doms": 4, "workIntensity": "high"}
        ]))
        .unwrap();
        assert_eq!(wellbeing[0].stress_level, 5);
        assert_eq!(wellbeing[0].work_intensity, Some(IntensityLevel::High));

        let nutrition = parse_nutrition_logs(&json!([
            {"date": "2024-03-01T13:00:00Z", "calories": 900},
            {"date": "2024-03-01T20:00:00Z", "status": "planned", "calories": 700},
            {"date": "2024-03-01T21:00:00Z", "foods": [{"calories": 200}, {"calories": "150"}]}
        ]))
        .unwrap();
        assert_eq!(nutrition.len(), 2);
        assert_eq!(nutrition[1].calories, Some(350.0));

        let feedback = parse_post_session_feedback(&json!({"postSessionFeedback": [
            {
                "logId": "w1",
                "date": "2024-03-01T19:00:00Z",
                "cnsRecovery": 3,
                "feedback": {
                    "Cuádriceps": {"doms": 4, "jointPain": true, "strengthCapacity": 7, "notes": ""},
                    "Gemelos": "ok"
                }
            },
            {"logId": "w2"}
        ]}))
        .unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].feedback.len(), 1);
        let quads = &feedback[0].feedback["Cuádriceps"];
        assert_eq!(quads.doms, 4);
        assert!(quads.joint_pain);
        assert_eq!(quads.strength_capacity, Some(7));
    }

    #[test]
    fn test_hierarchy_wrapped_and_bare() {
        let body = json!({"Pierna": [{"Cuádriceps": ["vasto-lateral"]}, "Aductores"]});
        let bare = parse_hierarchy(&body).unwrap();
        let wrapped = parse_hierarchy(&json!({"bodyPartHierarchy": body})).unwrap();

        assert_eq!(bare.parent_of("Vasto Lateral"), Some("Cuádriceps"));
        assert_eq!(wrapped.body_part_of("aductores"), Some("Pierna"));
        assert!(parse_hierarchy(&json!([])).is_err());
    }

    #[test]
    fn test_settings_from_app_export() {
        let doc = json!({
            "athleteType": "zercher_lifter",
            "trainingProfile": "Powerbuilding",
            "preferredIntensity": "Failure",
            "athleteScore": {"totalScore": 17, "profileLevel": "Advanced"},
            "volumeLimits": {"Pectoral": {"max": 18, "maxSession": 8}},
            "batteryCalibration": {"cnsDelta": 12.5, "muscularDelta": 0, "spinalDelta": -4,
                                   "lastCalibrated": "2024-02-01T10:00:00Z"},
            "calorieGoalObjective": "deficit",
            "userVitals": {"age": 41, "gender": "female"},
            "algorithmSettings": {"augeEnableSleepTracking": false},
            "apiKeys": {"gemini": "ignored"}
        });

        let settings = parse_settings(&doc).unwrap();
        assert_eq!(settings.athlete_type, AthleteType::Powerlifter);
        assert_eq!(settings.training_mode, TrainingMode::Powerbuilding);
        assert_eq!(settings.preferred_intensity, PreferredIntensity::Failure);
        assert!(settings.athlete_score.as_ref().unwrap().is_advanced());
        assert_eq!(settings.volume_limits["Pectoral"].max_session, Some(8.0));
        assert_eq!(settings.battery_calibration.cns_delta, 12.5);
        assert!(settings.battery_calibration.last_calibrated.is_some());
        assert_eq!(settings.calorie_goal_objective, CalorieObjective::Deficit);
        assert_eq!(settings.user_vitals.age, Some(41));
        assert!(!settings.algorithm.sleep_tracking);
        assert!(settings.algorithm.nutrition_tracking);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, LiftRsError::Ingest(IngestError::FileNotFound { .. })));

        let path = dir.path().join("logs.json");
        fs::write(&path, "[{\"id\": \"w\", \"date\": \"2024-01-01\"}]").unwrap();
        let doc = load_json_file(&path).unwrap();
        assert_eq!(parse_workout_logs(&doc).unwrap().len(), 1);
    }
}
