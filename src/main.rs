use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use liftrs::compute::{BatteryRequest, ComputeService, VolumeRequest, VolumeSource};
use liftrs::config::EngineConfig;
use liftrs::error::LiftRsError;
use liftrs::fatigue::acute_chronic_ratio;
use liftrs::hierarchy::MuscleHierarchy;
use liftrs::ingest;
use liftrs::logging::init_logging;
use liftrs::models::{MesocyclePhase, Settings, TrainingMode};
use liftrs::presentation::{
    battery_view, classify_acwr, group_by_region, volume_view, ColorTier, REGION_MAPPING,
};
use liftrs::recovery::{MuscleRecoveryStatus, RecoveryEngine, TrafficLight, TRACKED_MUSCLES};
use liftrs::resolver::ExerciseIndex;
use liftrs::thresholds::{weekly_volume_recommendation, ThresholdContext, ThresholdEngine};
use liftrs::volume::VolumeMode;

/// liftrs - Strength training volume and recovery CLI
///
/// Reads exported training data as JSON and reports weekly sets per muscle
/// group, recovery batteries and spinal load.
#[derive(Parser)]
#[command(name = "liftrs")]
#[command(author = "liftrs contributors")]
#[command(version)]
#[command(about = "Muscle volume and recovery battery analysis", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Weekly sets per muscle group
    Volume {
        /// Exercise catalog
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Muscle hierarchy (built-in hierarchy if omitted)
        #[arg(long, value_name = "FILE")]
        hierarchy: Option<PathBuf>,

        /// Completed workout logs
        #[arg(long, value_name = "FILE", conflicts_with_all = ["sessions", "program"])]
        logs: Option<PathBuf>,

        /// Planned sessions
        #[arg(long, value_name = "FILE", conflicts_with = "program")]
        sessions: Option<PathBuf>,

        /// Program tree or week list
        #[arg(long, value_name = "FILE")]
        program: Option<PathBuf>,

        /// App settings, used for thresholds
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Counting mode (simple, complex)
        #[arg(short, long)]
        mode: Option<VolumeMode>,

        /// Training mode for thresholds (hypertrophy, powerlifting, strength, powerbuilding)
        #[arg(short, long)]
        training_mode: Option<TrainingMode>,
    },

    /// CNS, muscular and spinal recovery batteries
    Batteries {
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Workout history
        #[arg(long, value_name = "FILE")]
        history: PathBuf,

        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        sleep: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        wellbeing: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        nutrition: Option<PathBuf>,

        /// Post-session soreness questionnaires
        #[arg(long, value_name = "FILE")]
        feedback: Option<PathBuf>,

        /// Show the per-muscle batteries
        #[arg(long)]
        muscles: bool,

        /// Show every contribution to each battery
        #[arg(long)]
        audit: bool,
    },

    /// Spinal load per exercise, heaviest first
    Spinal {
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        #[arg(long, value_name = "FILE")]
        history: PathBuf,

        /// Window in days (all history if omitted)
        #[arg(short, long)]
        days: Option<u32>,

        /// Number of exercises to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Weekly set thresholds per muscle group
    Thresholds {
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        #[arg(short, long)]
        training_mode: Option<TrainingMode>,

        /// Muscle groups to show (every region group if omitted)
        groups: Vec<String>,
    },
}

#[derive(Tabled)]
struct VolumeRow {
    #[tabled(rename = "Grupo")]
    group: String,
    #[tabled(rename = "Series")]
    sets: String,
    #[tabled(rename = "Estado")]
    status: String,
    #[tabled(rename = "%")]
    percent: String,
    #[tabled(rename = "Rango")]
    range: String,
}

#[derive(Tabled)]
struct BatteryRow {
    #[tabled(rename = "Sistema")]
    system: String,
    #[tabled(rename = "Batería")]
    value: String,
    #[tabled(rename = "Sin calibrar")]
    raw: String,
}

#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "Sistema")]
    system: String,
    #[tabled(rename = "Evento")]
    label: String,
    #[tabled(rename = "Tipo")]
    kind: String,
    #[tabled(rename = "Puntos")]
    value: String,
}

#[derive(Tabled)]
struct MuscleRow {
    #[tabled(rename = "Músculo")]
    muscle: String,
    #[tabled(rename = "Batería")]
    value: String,
    #[tabled(rename = "Estado")]
    status: String,
}

#[derive(Tabled)]
struct SpinalRow {
    #[tabled(rename = "Ejercicio")]
    exercise: String,
    #[tabled(rename = "Carga axial")]
    drain: String,
}

#[derive(Tabled)]
struct ThresholdRow {
    #[tabled(rename = "Grupo")]
    group: String,
    #[tabled(rename = "Mínimo")]
    min: String,
    #[tabled(rename = "Óptimo")]
    optimal: String,
    #[tabled(rename = "Máximo")]
    max: String,
}

fn paint(text: &str, tier: ColorTier) -> ColoredString {
    match tier {
        ColorTier::Muted => text.dimmed(),
        ColorTier::Info => text.cyan(),
        ColorTier::Good => text.green(),
        ColorTier::Warning => text.yellow(),
        ColorTier::Critical => text.red().bold(),
    }
}

fn load<T>(path: &Path, parse: impl Fn(&Value) -> liftrs::Result<T>) -> Result<T> {
    let doc = ingest::load_json_file(path).with_context(|| format!("Failed to load {}", path.display()))?;
    parse(&doc).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_optional<T: Default>(path: Option<&Path>, parse: impl Fn(&Value) -> liftrs::Result<T>) -> Result<T> {
    match path {
        Some(path) => load(path, parse),
        None => Ok(T::default()),
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let label = "error:".red().bold();
        match e.downcast_ref::<LiftRsError>() {
            Some(err) if e.to_string() != err.to_string() => eprintln!("{} {}: {}", label, e, err.user_message()),
            Some(err) => eprintln!("{} {}", label, err.user_message()),
            None => eprintln!("{} {:#}", label, e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };
    init_logging(&config.logging.clone().with_verbosity(cli.verbose))?;

    match cli.command {
        Commands::Volume {
            catalog,
            hierarchy,
            logs,
            sessions,
            program,
            settings,
            mode,
            training_mode,
        } => {
            let catalog = load(&catalog, ingest::parse_catalog)?;
            let hierarchy = match hierarchy {
                Some(path) => load(&path, ingest::parse_hierarchy)?,
                None => MuscleHierarchy::standard(),
            };
            let source = match (logs, sessions, program) {
                (Some(path), _, _) => VolumeSource::Logs(load(&path, ingest::parse_workout_logs)?),
                (_, Some(path), _) => VolumeSource::Sessions(load(&path, ingest::parse_sessions)?),
                (_, _, Some(path)) => VolumeSource::Weeks(load(&path, ingest::parse_weeks)?),
                _ => bail!("one of --logs, --sessions or --program is required"),
            };
            let settings: Option<Settings> = match settings {
                Some(path) => Some(load(&path, ingest::parse_settings)?),
                None => None,
            };

            let mut engine_config = config.clone();
            if let Some(mode) = mode {
                engine_config.volume.mode = mode;
            }
            let service = ComputeService::new(&engine_config);
            let analysis = service
                .volume(VolumeRequest {
                    catalog,
                    hierarchy,
                    source,
                })
                .await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
                return Ok(());
            }

            let ctx = ThresholdContext {
                program_mode: training_mode,
                settings: settings.as_ref(),
                ..ThresholdContext::default()
            };
            let thresholds = ThresholdEngine::with_config(config.thresholds.clone());
            let view = volume_view(&analysis, |g| thresholds.thresholds_for(g, &ctx), ctx.mode());

            if view.is_empty() {
                println!("{}", "No hay volumen registrado".dimmed());
                return Ok(());
            }
            for (region, items) in group_by_region(&view, |v| v.muscle_group.as_str()) {
                println!("\n{}", region.bold());
                let rows = items
                    .iter()
                    .map(|v| VolumeRow {
                        group: v.muscle_group.clone(),
                        sets: format!("{:.1}", v.sets),
                        status: v.label.clone(),
                        percent: format!("{}%", v.percent),
                        range: v.range_label.clone(),
                    })
                    .collect();
                print_table::<VolumeRow>(rows);
            }
        }

        Commands::Batteries {
            catalog,
            history,
            settings,
            sleep,
            wellbeing,
            nutrition,
            feedback,
            muscles,
            audit,
        } => {
            let now = Utc::now();
            let settings = match settings {
                Some(path) => Some(load(&path, ingest::parse_settings)?),
                None => None,
            };
            let request = BatteryRequest {
                history: load(&history, ingest::parse_workout_logs)?,
                catalog: load(&catalog, ingest::parse_catalog)?,
                sleep_logs: load_optional(sleep.as_deref(), ingest::parse_sleep_logs)?,
                wellbeing_logs: load_optional(wellbeing.as_deref(), ingest::parse_wellbeing_logs)?,
                nutrition_logs: load_optional(nutrition.as_deref(), ingest::parse_nutrition_logs)?,
                post_session_feedback: load_optional(feedback.as_deref(), ingest::parse_post_session_feedback)?,
                settings,
                now,
            };

            let service = ComputeService::new(&config);
            let snapshot = service.batteries(request.clone()).await?;

            let index = ExerciseIndex::build(&request.catalog);
            let acwr = acute_chronic_ratio(&request.history, &index, now);
            let engine = RecoveryEngine::with_config(config.recovery.clone());
            let readiness = engine.daily_readiness(
                &request.sleep_logs,
                &request.wellbeing_logs,
                &request.settings.clone().unwrap_or_default(),
                snapshot.report.cns,
                now,
            );

            if cli.json {
                let out = json!({
                    "batteries": snapshot.report,
                    "muscles": snapshot.muscles,
                    "acwr": acwr,
                    "readiness": readiness,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            let raw = &snapshot.report.raw;
            let rows = battery_view(&snapshot.report)
                .into_iter()
                .map(|item| BatteryRow {
                    system: item.label.clone(),
                    value: format!("{}%", item.value),
                    raw: format!("{}%", raw.get(item.system).round()),
                })
                .collect();
            print_table::<BatteryRow>(rows);

            let lowest = snapshot.report.values().lowest();
            println!(
                "{} {}",
                "Veredicto:".bold(),
                paint(snapshot.report.verdict.label(), ColorTier::for_battery(lowest))
            );

            if let Some(ratio) = acwr {
                let (label, tier) = classify_acwr(ratio);
                println!("{} {:.2} ({})", "ACWR:".bold(), ratio, paint(label, tier));
            }

            let light = match readiness.status {
                TrafficLight::Green => "VERDE".green().bold(),
                TrafficLight::Yellow => "AMARILLO".yellow().bold(),
                TrafficLight::Red => "ROJO".red().bold(),
            };
            println!("{} {} · {}", "Preparación:".bold(), light, readiness.recommendation);
            for line in &readiness.diagnostics {
                println!("  {}", line.dimmed());
            }

            if audit {
                let logs = &snapshot.report.audit_logs;
                let rows = [("SNC", &logs.cns), ("Muscular", &logs.muscular), ("Columna", &logs.spinal)]
                    .into_iter()
                    .flat_map(|(system, events)| {
                        events.iter().map(move |event| AuditRow {
                            system: system.to_string(),
                            label: event.label.clone(),
                            kind: format!("{:?}", event.kind),
                            value: format!("{:+.1}", event.val),
                        })
                    })
                    .collect();
                println!("\n{}", "Auditoría".bold());
                print_table::<AuditRow>(rows);
            }

            if muscles {
                let rows = TRACKED_MUSCLES
                    .iter()
                    .filter_map(|m| snapshot.muscles.get(m.id).map(|score| (m, *score)))
                    .map(|(m, score)| MuscleRow {
                        muscle: m.label.to_string(),
                        value: format!("{}%", score.round()),
                        status: MuscleRecoveryStatus::from_score(score).label().to_string(),
                    })
                    .collect();
                println!("\n{}", "Músculos".bold());
                print_table::<MuscleRow>(rows);
            }
        }

        Commands::Spinal {
            catalog,
            history,
            days,
            limit,
        } => {
            let catalog = load(&catalog, ingest::parse_catalog)?;
            let history = load(&history, ingest::parse_workout_logs)?;
            let index = ExerciseIndex::build(&catalog);
            let engine = RecoveryEngine::with_config(config.recovery.clone());
            let ranking = engine.spinal_drain_by_exercise(&history, &index, days, Utc::now());

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&ranking)?);
                return Ok(());
            }
            if ranking.is_empty() {
                println!("{}", "Sin carga axial en la ventana".dimmed());
                return Ok(());
            }

            let rows = ranking
                .iter()
                .take(limit)
                .map(|entry| SpinalRow {
                    exercise: entry.exercise_name.clone(),
                    drain: format!("{}", entry.total_spinal_drain),
                })
                .collect();
            print_table::<SpinalRow>(rows);
        }

        Commands::Thresholds {
            settings,
            training_mode,
            groups,
        } => {
            let settings = match settings {
                Some(path) => load(&path, ingest::parse_settings)?,
                None => Settings::default(),
            };
            let groups: Vec<String> = if groups.is_empty() {
                REGION_MAPPING
                    .iter()
                    .flat_map(|(_, members)| members.iter().map(|m| m.to_string()))
                    .collect()
            } else {
                groups
            };

            let ctx = ThresholdContext {
                program_mode: training_mode,
                settings: Some(&settings),
                ..ThresholdContext::default()
            };
            let engine = ThresholdEngine::with_config(config.thresholds.clone());
            let thresholds: Vec<_> = groups
                .iter()
                .map(|g| (g.clone(), engine.thresholds_for(g, &ctx)))
                .collect();

            if cli.json {
                let out: serde_json::Map<String, Value> = thresholds
                    .iter()
                    .map(|(g, t)| Ok((g.clone(), serde_json::to_value(t)?)))
                    .collect::<Result<_>>()?;
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!("{} {:?}", "Modo:".bold(), ctx.mode());
            let rows = thresholds
                .into_iter()
                .map(|(group, t)| ThresholdRow {
                    group,
                    min: format!("{}", t.min),
                    optimal: format!("{}-{}", t.optimal.0, t.optimal.1),
                    max: format!("{}", t.max),
                })
                .collect();
            print_table::<ThresholdRow>(rows);

            let recommendation =
                weekly_volume_recommendation(settings.athlete_score.as_ref(), &settings, MesocyclePhase::default());
            println!(
                "{} {}-{} ({:?}) · {}",
                "Semanal:".bold(),
                recommendation.min_sets,
                recommendation.max_sets,
                recommendation.unit,
                recommendation.reasoning.dimmed()
            );
        }
    }

    Ok(())
}
