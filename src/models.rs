use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role a muscle plays in an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuscleRole {
    /// Agonist, the muscle the exercise is programmed for
    Primary,
    /// Dynamic synergist
    Secondary,
    /// Isometric stabilizer
    Stabilizer,
    /// Neutralizer (cancels unwanted joint actions)
    Neutralizer,
}

impl MuscleRole {
    /// Primary roles count as direct volume, everything else as indirect
    pub fn is_direct(&self) -> bool {
        matches!(self, MuscleRole::Primary)
    }

    /// Ordering used when one exercise lists the same muscle more than once
    pub fn rank(&self) -> u8 {
        match self {
            MuscleRole::Primary => 3,
            MuscleRole::Secondary => 2,
            MuscleRole::Stabilizer => 1,
            MuscleRole::Neutralizer => 0,
        }
    }

    /// Mechanical stimulus a set gives this muscle, for hypertrophy volume
    pub fn hypertrophy_multiplier(&self) -> f64 {
        match self {
            MuscleRole::Primary => 1.0,
            MuscleRole::Secondary => 0.5,
            MuscleRole::Stabilizer | MuscleRole::Neutralizer => 0.0,
        }
    }

    /// Systemic cost a set puts on this muscle
    pub fn fatigue_multiplier(&self) -> f64 {
        match self {
            MuscleRole::Primary => 1.0,
            MuscleRole::Secondary => 0.6,
            MuscleRole::Stabilizer => 0.3,
            MuscleRole::Neutralizer => 0.15,
        }
    }
}

impl std::str::FromStr for MuscleRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "primario" | "agonista" => Ok(MuscleRole::Primary),
            "secondary" | "secundario" | "sinergista" => Ok(MuscleRole::Secondary),
            "stabilizer" | "estabilizador" => Ok(MuscleRole::Stabilizer),
            "neutralizer" | "neutralizador" => Ok(MuscleRole::Neutralizer),
            _ => Err(format!("Invalid muscle role: {}", s)),
        }
    }
}

fn default_activation() -> f64 {
    1.0
}

/// One muscle trained by a catalog exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvolvedMuscle {
    /// Muscle name as tagged in the catalog (granular or group level)
    pub muscle: String,

    pub role: MuscleRole,

    /// Activation coefficient in [0, 1]
    #[serde(default = "default_activation")]
    pub activation: f64,
}

impl InvolvedMuscle {
    pub fn new(muscle: impl Into<String>, role: MuscleRole, activation: f64) -> Self {
        Self {
            muscle: muscle.into(),
            role,
            activation: activation.clamp(0.0, 1.0),
        }
    }
}

/// Structural class of an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExerciseType {
    /// Multi-joint compound lift
    #[serde(alias = "Básico")]
    Basic,
    #[default]
    #[serde(alias = "Accesorio")]
    Accessory,
    #[serde(alias = "Aislamiento")]
    Isolation,
}

/// Catalog entry describing which muscles an exercise trains and what it costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseMuscleInfo {
    pub id: String,

    pub name: String,

    /// Equipment tag (e.g. "Barra", "Mancuerna", "Polea")
    #[serde(default)]
    pub equipment: String,

    #[serde(default)]
    pub category: String,

    /// Movement pattern tag (e.g. "Empuje", "Bisagra")
    #[serde(default)]
    pub force: String,

    #[serde(default)]
    pub exercise_type: ExerciseType,

    #[serde(default)]
    pub involved_muscles: Vec<InvolvedMuscle>,

    /// Local fatigue cost (1-5)
    pub efc: Option<f64>,

    /// Spinal/structural cost (0-2)
    pub ssc: Option<f64>,

    /// Central nervous cost (1-5)
    pub cnc: Option<f64>,

    /// Posture multiplier for axial load (e.g. low bar = 1.2)
    pub posture_factor: Option<f64>,

    /// Known one-rep max for this exercise, in kg
    pub calculated_1rm: Option<f64>,

    #[serde(default)]
    pub is_custom: bool,
}

impl ExerciseMuscleInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            equipment: String::new(),
            category: String::new(),
            force: String::new(),
            exercise_type: ExerciseType::default(),
            involved_muscles: Vec::new(),
            efc: None,
            ssc: None,
            cnc: None,
            posture_factor: None,
            calculated_1rm: None,
            is_custom: false,
        }
    }

    pub fn with_muscle(mut self, muscle: impl Into<String>, role: MuscleRole, activation: f64) -> Self {
        self.involved_muscles.push(InvolvedMuscle::new(muscle, role, activation));
        self
    }

    pub fn with_type(mut self, exercise_type: ExerciseType) -> Self {
        self.exercise_type = exercise_type;
        self
    }

    pub fn with_equipment(mut self, equipment: impl Into<String>) -> Self {
        self.equipment = equipment.into();
        self
    }
}

/// Reps performed after a load drop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DropSet {
    pub weight: Option<f64>,
    pub reps: u32,
}

/// Mini-set after a short intra-set rest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RestPause {
    pub reps: u32,
}

/// A single set, either planned or completed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExerciseSet {
    /// Load in kg (None or 0 for bodyweight / not yet entered)
    pub weight: Option<f64>,

    pub target_reps: Option<u32>,

    pub completed_reps: Option<u32>,

    pub target_rpe: Option<f64>,

    pub completed_rpe: Option<f64>,

    pub target_rir: Option<f64>,

    pub completed_rir: Option<f64>,

    #[serde(default)]
    pub is_failure: bool,

    #[serde(default)]
    pub is_amrap: bool,

    /// Flagged by the user as not counting toward volume
    #[serde(default)]
    pub is_ineffective: bool,

    #[serde(default)]
    pub drop_sets: Vec<DropSet>,

    #[serde(default)]
    pub rest_pauses: Vec<RestPause>,

    #[serde(default)]
    pub partial_reps: u32,
}

impl ExerciseSet {
    /// Completed set with load, reps and optional RPE
    pub fn completed(weight: f64, reps: u32, rpe: Option<f64>) -> Self {
        Self {
            weight: Some(weight),
            completed_reps: Some(reps),
            completed_rpe: rpe,
            ..Self::default()
        }
    }

    /// Planned set with target reps and optional target RPE
    pub fn planned(reps: u32, rpe: Option<f64>) -> Self {
        Self {
            target_reps: Some(reps),
            target_rpe: rpe,
            ..Self::default()
        }
    }

    /// Completed reps, falling back to the target
    pub fn reps(&self) -> u32 {
        self.completed_reps.or(self.target_reps).unwrap_or(0)
    }

    pub fn load(&self) -> f64 {
        self.weight.unwrap_or(0.0).max(0.0)
    }
}

/// Exercise inside a planned session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub id: String,

    pub name: String,

    /// Catalog id of the exercise, if linked
    pub exercise_db_id: Option<String>,

    #[serde(default)]
    pub sets: Vec<ExerciseSet>,

    /// Rest between sets in seconds
    pub rest_seconds: Option<u32>,
}

impl PlannedExercise {
    pub fn new(name: impl Into<String>, sets: Vec<ExerciseSet>) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name,
            exercise_db_id: None,
            sets,
            rest_seconds: None,
        }
    }

    pub fn with_db_id(mut self, id: impl Into<String>) -> Self {
        self.exercise_db_id = Some(id.into());
        self
    }
}

/// Superset / block grouping inside a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionPart {
    pub name: Option<String>,

    #[serde(default)]
    pub exercises: Vec<PlannedExercise>,
}

/// A training session. Exercises live either directly in `exercises` or
/// one level deeper inside `parts`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    pub name: String,

    /// 0 = Sunday
    pub day_of_week: Option<u8>,

    #[serde(default)]
    pub exercises: Vec<PlannedExercise>,

    #[serde(default)]
    pub parts: Vec<SessionPart>,
}

impl Session {
    pub fn new(id: impl Into<String>, name: impl Into<String>, exercises: Vec<PlannedExercise>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            day_of_week: None,
            exercises,
            parts: Vec::new(),
        }
    }

    /// All exercises of the session, flattening `parts` when present
    pub fn all_exercises(&self) -> Box<dyn Iterator<Item = &PlannedExercise> + '_> {
        if self.parts.is_empty() {
            Box::new(self.exercises.iter())
        } else {
            Box::new(self.parts.iter().flat_map(|p| p.exercises.iter()))
        }
    }
}

impl From<&WorkoutLog> for Session {
    fn from(log: &WorkoutLog) -> Self {
        Session {
            id: log.id.clone(),
            name: log.session_name.clone(),
            day_of_week: None,
            exercises: log
                .completed_exercises
                .iter()
                .map(|ex| PlannedExercise {
                    id: ex.exercise_id.clone(),
                    name: ex.exercise_name.clone(),
                    exercise_db_id: ex.exercise_db_id.clone(),
                    sets: ex.sets.clone(),
                    rest_seconds: None,
                })
                .collect(),
            parts: Vec::new(),
        }
    }
}

/// Training mode of a program or athlete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    #[default]
    Hypertrophy,
    Powerlifting,
    Strength,
    Powerbuilding,
}

impl TrainingMode {
    /// Powerlifting and strength programs use fixed set-count breakpoints
    pub fn uses_fixed_breakpoints(&self) -> bool {
        matches!(self, TrainingMode::Powerlifting | TrainingMode::Strength)
    }
}

impl std::str::FromStr for TrainingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hypertrophy" | "aesthetics" | "bodybuilding" => Ok(TrainingMode::Hypertrophy),
            "powerlifting" => Ok(TrainingMode::Powerlifting),
            "strength" => Ok(TrainingMode::Strength),
            "powerbuilding" => Ok(TrainingMode::Powerbuilding),
            _ => Err(format!("Invalid training mode: {}", s)),
        }
    }
}

/// Mesocycle goal, scales recommended volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MesocyclePhase {
    #[default]
    #[serde(alias = "Acumulación")]
    Accumulation,
    #[serde(alias = "Intensificación")]
    Intensification,
    #[serde(alias = "Realización")]
    Realization,
    #[serde(alias = "Descarga")]
    Deload,
    Custom,
}

impl MesocyclePhase {
    pub fn volume_factor(&self) -> f64 {
        match self {
            MesocyclePhase::Accumulation | MesocyclePhase::Custom => 1.0,
            MesocyclePhase::Intensification => 0.75,
            MesocyclePhase::Realization => 0.5,
            MesocyclePhase::Deload => 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgramWeek {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesocycle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub goal: MesocyclePhase,
    #[serde(default)]
    pub weeks: Vec<ProgramWeek>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mesocycles: Vec<Mesocycle>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Macrocycle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Program tree: Program → Macrocycle → Block → Mesocycle → Week → Session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: TrainingMode,
    #[serde(default)]
    pub macrocycles: Vec<Macrocycle>,
}

impl Program {
    /// Every week of the program in tree order
    pub fn all_weeks(&self) -> Vec<&ProgramWeek> {
        self.macrocycles
            .iter()
            .flat_map(|m| m.blocks.iter())
            .flat_map(|b| b.mesocycles.iter())
            .flat_map(|meso| meso.weeks.iter())
            .collect()
    }
}

/// Exercise as recorded in a finished workout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletedExercise {
    pub exercise_id: String,

    pub exercise_db_id: Option<String>,

    pub exercise_name: String,

    #[serde(default)]
    pub sets: Vec<ExerciseSet>,
}

impl CompletedExercise {
    pub fn new(name: impl Into<String>, sets: Vec<ExerciseSet>) -> Self {
        let name = name.into();
        Self {
            exercise_id: name.to_lowercase().replace(' ', "-"),
            exercise_db_id: None,
            exercise_name: name,
            sets,
        }
    }
}

/// A completed session record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: String,

    pub date: DateTime<Utc>,

    #[serde(default)]
    pub program_id: String,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub session_name: String,

    /// Session duration in seconds
    pub duration_seconds: Option<u32>,

    #[serde(default)]
    pub completed_exercises: Vec<CompletedExercise>,

    /// Muscles or joints the athlete reported discomfort in
    #[serde(default)]
    pub discomforts: Vec<String>,
}

impl WorkoutLog {
    pub fn new(id: impl Into<String>, date: DateTime<Utc>, exercises: Vec<CompletedExercise>) -> Self {
        let id = id.into();
        Self {
            session_name: id.clone(),
            id,
            date,
            program_id: String::new(),
            session_id: String::new(),
            duration_seconds: None,
            completed_exercises: exercises,
            discomforts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepLog {
    pub date: NaiveDate,
    pub end_time: DateTime<Utc>,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Light,
    Moderate,
    High,
}

/// Daily self-report (1-5 scales)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWellbeingLog {
    pub date: NaiveDate,
    pub sleep_quality: u8,
    pub stress_level: u8,
    pub doms: u8,
    pub motivation: u8,
    pub work_intensity: Option<IntensityLevel>,
    pub study_intensity: Option<IntensityLevel>,
}

/// Soreness reported for one muscle after a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MuscleFeedback {
    /// 1-5
    pub doms: u8,
    pub joint_pain: bool,
    pub strength_capacity: Option<u8>,
    pub notes: String,
}

/// Questionnaire answered after a logged session, keyed by muscle name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSessionFeedback {
    pub log_id: String,
    pub date: DateTime<Utc>,
    pub cns_recovery: Option<f64>,
    pub feedback: BTreeMap<String, MuscleFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionLog {
    pub date: DateTime<Utc>,
    pub calories: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileLevel {
    #[default]
    Beginner,
    Advanced,
}

/// Athlete experience assessment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AthleteScore {
    pub total_score: f64,
    pub profile_level: ProfileLevel,
}

impl AthleteScore {
    pub fn is_advanced(&self) -> bool {
        self.profile_level == ProfileLevel::Advanced || self.total_score >= 15.0
    }
}

/// Athlete archetype, sets the minimum per-muscle work capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AthleteType {
    #[default]
    Enthusiast,
    Hybrid,
    Calisthenics,
    Bodybuilder,
    Powerbuilder,
    Powerlifter,
    Weightlifter,
    Parapowerlifter,
}

impl AthleteType {
    pub fn capacity_floor(&self) -> f64 {
        match self {
            AthleteType::Enthusiast => 500.0,
            AthleteType::Hybrid => 650.0,
            AthleteType::Calisthenics => 600.0,
            AthleteType::Bodybuilder => 1000.0,
            AthleteType::Powerbuilder => 1100.0,
            AthleteType::Powerlifter => 1200.0,
            AthleteType::Weightlifter => 1000.0,
            AthleteType::Parapowerlifter => 1100.0,
        }
    }
}

/// User-calibrated weekly volume limits for one muscle group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeLimit {
    pub min: Option<f64>,
    pub max: f64,
    pub max_session: Option<f64>,
}

/// The three battery systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatterySystem {
    Cns,
    Muscular,
    Spinal,
}

impl std::fmt::Display for BatterySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatterySystem::Cns => write!(f, "SNC"),
            BatterySystem::Muscular => write!(f, "Muscular"),
            BatterySystem::Spinal => write!(f, "Columna"),
        }
    }
}

/// Persisted manual calibration. Each delta is `computed - user value` at the
/// time of calibration and is subtracted from every later computation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryCalibration {
    pub cns_delta: f64,
    pub muscular_delta: f64,
    pub spinal_delta: f64,
    pub last_calibrated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalorieObjective {
    Deficit,
    #[default]
    Maintenance,
    Surplus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Transmale,
    Transfemale,
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserVitals {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub work_intensity: Option<IntensityLevel>,
}

/// Toggles for the auxiliary recovery signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmSettings {
    pub sleep_tracking: bool,
    pub nutrition_tracking: bool,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            sleep_tracking: true,
            nutrition_tracking: true,
        }
    }
}

/// How close to failure the athlete usually trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredIntensity {
    /// RPE 10
    Failure,
    /// RPE 8-9
    #[default]
    RirHigh,
    /// RPE 6-7
    RirLow,
}

impl PreferredIntensity {
    pub fn volume_factor(&self) -> f64 {
        match self {
            PreferredIntensity::Failure => 0.6,
            PreferredIntensity::RirHigh => 1.0,
            PreferredIntensity::RirLow => 1.2,
        }
    }
}

/// Athlete settings consumed by the engines
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub training_mode: TrainingMode,
    pub athlete_score: Option<AthleteScore>,
    pub athlete_type: AthleteType,
    pub volume_limits: BTreeMap<String, VolumeLimit>,
    pub battery_calibration: BatteryCalibration,
    pub calorie_goal_objective: CalorieObjective,
    pub daily_calorie_goal: Option<f64>,
    pub user_vitals: UserVitals,
    pub algorithm: AlgorithmSettings,
    pub preferred_intensity: PreferredIntensity,
}

/// Sets attributed to a muscle group by one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseVolume {
    pub name: String,
    pub sets: f64,
}

/// Indirect contribution of one exercise to a muscle group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndirectExerciseVolume {
    pub name: String,
    pub sets: f64,
    pub role: MuscleRole,
    pub activation_percentage: f64,
}

/// Per muscle group volume analysis. `display_volume` is always the sum of
/// `direct_exercises` sets; indirect sets are tracked separately
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedMuscleVolumeAnalysis {
    pub muscle_group: String,

    /// Weekly direct sets
    pub display_volume: f64,

    /// Direct sets plus indirect sets weighted by hypertrophy role multiplier
    pub fractional_volume: f64,

    pub direct_exercises: Vec<ExerciseVolume>,

    pub indirect_exercises: Vec<IndirectExerciseVolume>,

    /// Weekly sessions with direct stimulus
    pub frequency: f64,

    /// Weekly sessions with only stabilizer involvement
    pub indirect_frequency: f64,
}
