//! Background computation with request versioning and memoization
//!
//! Inputs change faster than the batteries can be recomputed. Every request
//! gets a version from a [`RequestSequencer`]; results land in a
//! [`LatestSlot`] that only accepts the newest version, so an older
//! computation finishing late is dropped instead of overwriting fresh data.

use crate::config::EngineConfig;
use crate::error::{LiftRsError, Result};
use crate::hierarchy::MuscleHierarchy;
use crate::models::{
    DailyWellbeingLog, DetailedMuscleVolumeAnalysis, ExerciseMuscleInfo, NutritionLog, PostSessionFeedback,
    ProgramWeek, Session, Settings, SleepLog, WorkoutLog,
};
use crate::recovery::{BatteryReport, RecoveryEngine, RecoveryInputs};
use crate::resolver::ExerciseIndex;
use crate::volume::{VolumeAggregator, VolumeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Issues monotonically increasing request versions
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

/// Version handed out for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn version(&self) -> u64 {
        self.0
    }
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest()
    }
}

/// Holds the result of the newest request only
#[derive(Debug)]
pub struct LatestSlot<T> {
    sequencer: RequestSequencer,
    value: Mutex<Option<(u64, T)>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            sequencer: RequestSequencer::new(),
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request. Any ticket issued earlier becomes stale.
    pub fn begin(&self) -> RequestTicket {
        self.sequencer.issue()
    }

    /// Store `value` if `ticket` is still the newest request. Returns whether
    /// the value was accepted.
    pub fn offer(&self, ticket: RequestTicket, value: T) -> bool {
        if !self.sequencer.is_current(ticket) {
            debug!("Discarding result of superseded request v{}", ticket.0);
            return false;
        }
        if let Ok(mut guard) = self.value.lock() {
            if guard.as_ref().map_or(true, |(version, _)| *version < ticket.0) {
                *guard = Some((ticket.0, value));
                return true;
            }
        }
        false
    }

    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|(_, value)| value.clone()))
    }

    /// Version of the stored value
    pub fn version(&self) -> Option<u64> {
        self.value.lock().ok().and_then(|guard| guard.as_ref().map(|(v, _)| *v))
    }
}

/// Stable identity of a request's inputs
pub type Fingerprint = [u8; 32];

fn fingerprint_of<T: Serialize>(value: &T) -> Result<Fingerprint> {
    let bytes = bincode::serialize(value)
        .map_err(|e| LiftRsError::Internal(format!("Failed to serialize request: {}", e)))?;
    Ok(Sha256::digest(&bytes).into())
}

/// Owned inputs of a battery computation
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatteryRequest {
    pub history: Vec<WorkoutLog>,
    pub catalog: Vec<ExerciseMuscleInfo>,
    pub sleep_logs: Vec<SleepLog>,
    pub wellbeing_logs: Vec<DailyWellbeingLog>,
    pub nutrition_logs: Vec<NutritionLog>,
    pub post_session_feedback: Vec<PostSessionFeedback>,
    pub settings: Option<Settings>,
    pub now: DateTime<Utc>,
}

impl BatteryRequest {
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        fingerprint_of(self)
    }
}

/// System batteries together with the per-muscle map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySnapshot {
    pub report: BatteryReport,
    pub muscles: BTreeMap<String, f64>,
}

/// What a volume request aggregates
#[derive(Debug, Clone, Serialize)]
pub enum VolumeSource {
    Weeks(Vec<ProgramWeek>),
    Sessions(Vec<Session>),
    Logs(Vec<WorkoutLog>),
}

/// Owned inputs of a volume computation
#[derive(Debug, Clone, Serialize)]
pub struct VolumeRequest {
    pub catalog: Vec<ExerciseMuscleInfo>,
    pub hierarchy: MuscleHierarchy,
    pub source: VolumeSource,
}

impl VolumeRequest {
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        fingerprint_of(self)
    }
}

/// Bounded first-in-first-out memo
#[derive(Debug)]
struct Memo<V> {
    entries: HashMap<Fingerprint, V>,
    order: VecDeque<Fingerprint>,
    capacity: usize,
}

impl<V: Clone> Memo<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &Fingerprint) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: Fingerprint, value: V) {
        if self.entries.insert(key, value).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Memo hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

const DEFAULT_MEMO_CAPACITY: usize = 32;

/// Runs battery and volume computations on the blocking pool
#[derive(Debug, Clone)]
pub struct ComputeService {
    engine: Arc<RecoveryEngine>,
    volume_config: VolumeConfig,
    battery_memo: Arc<Mutex<Memo<BatterySnapshot>>>,
    volume_memo: Arc<Mutex<Memo<Vec<DetailedMuscleVolumeAnalysis>>>>,
    battery_slot: Arc<LatestSlot<BatterySnapshot>>,
    volume_slot: Arc<LatestSlot<Vec<DetailedMuscleVolumeAnalysis>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for ComputeService {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl ComputeService {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_memo_capacity(config, DEFAULT_MEMO_CAPACITY)
    }

    pub fn with_memo_capacity(config: &EngineConfig, capacity: usize) -> Self {
        let engine = RecoveryEngine::with_config(config.recovery.clone()).with_family_match(config.volume.family_match);
        Self {
            engine: Arc::new(engine),
            volume_config: config.volume.clone(),
            battery_memo: Arc::new(Mutex::new(Memo::new(capacity))),
            volume_memo: Arc::new(Mutex::new(Memo::new(capacity))),
            battery_slot: Arc::new(LatestSlot::new()),
            volume_slot: Arc::new(LatestSlot::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn memo_lookup<V: Clone>(&self, memo: &Mutex<Memo<V>>, key: &Fingerprint) -> Option<V> {
        let cached = memo.lock().ok().and_then(|m| m.get(key));
        match cached {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        cached
    }

    /// Batteries and per-muscle map for `request`, memoized by input fingerprint
    pub async fn batteries(&self, request: BatteryRequest) -> Result<BatterySnapshot> {
        let key = request.fingerprint()?;
        if let Some(snapshot) = self.memo_lookup(&self.battery_memo, &key) {
            debug!("Battery memo hit");
            return Ok(snapshot);
        }

        let engine = Arc::clone(&self.engine);
        let snapshot = tokio::task::spawn_blocking(move || {
            let index = ExerciseIndex::build(&request.catalog);
            let mut inputs = RecoveryInputs::new(&request.history, &index)
                .with_sleep(&request.sleep_logs)
                .with_wellbeing(&request.wellbeing_logs)
                .with_nutrition(&request.nutrition_logs)
                .with_feedback(&request.post_session_feedback);
            if let Some(settings) = request.settings.as_ref() {
                inputs = inputs.with_settings(settings);
            }

            BatterySnapshot {
                report: engine.compute_batteries(&inputs, request.now),
                muscles: engine.per_muscle_batteries(&inputs, request.now),
            }
        })
        .await
        .map_err(|e| LiftRsError::Computation(format!("Battery computation failed: {}", e)))?;

        if let Ok(mut memo) = self.battery_memo.lock() {
            memo.insert(key, snapshot.clone());
        }
        Ok(snapshot)
    }

    /// Muscle volume for `request`, memoized by input fingerprint
    pub async fn volume(&self, request: VolumeRequest) -> Result<Vec<DetailedMuscleVolumeAnalysis>> {
        let key = request.fingerprint()?;
        if let Some(volume) = self.memo_lookup(&self.volume_memo, &key) {
            debug!("Volume memo hit");
            return Ok(volume);
        }

        let config = self.volume_config.clone();
        let volume = tokio::task::spawn_blocking(move || {
            let index = ExerciseIndex::build(&request.catalog);
            let aggregator = VolumeAggregator::new(&index, &request.hierarchy).with_mode(config.mode);
            match &request.source {
                VolumeSource::Weeks(weeks) => aggregator.aggregate_weeks(weeks),
                VolumeSource::Sessions(sessions) => aggregator.aggregate_sessions(sessions),
                VolumeSource::Logs(logs) => aggregator.aggregate_logs(logs),
            }
        })
        .await
        .map_err(|e| LiftRsError::Computation(format!("Volume computation failed: {}", e)))?;

        if let Ok(mut memo) = self.volume_memo.lock() {
            memo.insert(key, volume.clone());
        }
        Ok(volume)
    }

    /// Recompute batteries and publish them unless a newer refresh started
    /// meanwhile. Returns whether this result was published.
    pub async fn refresh_batteries(&self, request: BatteryRequest) -> Result<bool> {
        let ticket = self.battery_slot.begin();
        let snapshot = self.batteries(request).await?;
        Ok(self.battery_slot.offer(ticket, snapshot))
    }

    /// Recompute volume and publish it unless a newer refresh started meanwhile
    pub async fn refresh_volume(&self, request: VolumeRequest) -> Result<bool> {
        let ticket = self.volume_slot.begin();
        let volume = self.volume(request).await?;
        Ok(self.volume_slot.offer(ticket, volume))
    }

    pub fn latest_batteries(&self) -> Option<BatterySnapshot> {
        self.battery_slot.get()
    }

    pub fn latest_volume(&self) -> Option<Vec<DetailedMuscleVolumeAnalysis>> {
        self.volume_slot.get()
    }
}
