use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use gluco_core::alert::select_alerts;
use gluco_core::export::{export_alerts, export_readings};
use gluco_core::store::calendar_date;
use gluco_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "gluco")]
#[command(about = "Diabetes care records with glucose and adherence alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load configuration from this file instead of the default path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage physicians
    #[command(subcommand)]
    Physician(PhysicianCommand),

    /// Manage patients and their assigned physician
    #[command(subcommand)]
    Patient(PatientCommand),

    /// Manage the medication formulary
    #[command(subcommand)]
    Medication(MedicationCommand),

    /// Prescribe and manage therapies
    #[command(subcommand)]
    Therapy(TherapyCommand),

    /// Record glucose readings
    #[command(subcommand)]
    Reading(ReadingCommand),

    /// Record medication intakes
    #[command(subcommand)]
    Intake(IntakeCommand),

    /// Medication adherence monitor
    #[command(subcommand)]
    Monitor(MonitorCommand),

    /// Review alerts
    #[command(subcommand)]
    Alerts(AlertsCommand),

    /// Glucose report for a patient
    Report {
        #[arg(long)]
        patient: Uuid,

        /// Window in days (defaults to report.default_days)
        #[arg(long)]
        days: Option<i64>,

        /// Also append the window's readings to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PhysicianCommand {
    /// Register a physician
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

#[derive(Args)]
struct RiskFlags {
    #[arg(long)]
    smoker: bool,
    #[arg(long)]
    former_smoker: bool,
    #[arg(long)]
    alcohol_problems: bool,
    #[arg(long)]
    substance_problems: bool,
    #[arg(long)]
    obesity: bool,
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Register a patient
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// YYYY-MM-DD
        #[arg(long)]
        birth_date: NaiveDate,
        /// Assigned physician id
        #[arg(long)]
        physician: Option<Uuid>,
        #[command(flatten)]
        risk: RiskFlags,
        #[arg(long, default_value = "")]
        past_conditions: String,
        #[arg(long, default_value = "")]
        comorbidities: String,
    },

    /// Change or clear a patient's assigned physician
    Assign {
        #[arg(long)]
        patient: Uuid,
        #[arg(long, conflicts_with = "none", required_unless_present = "none")]
        physician: Option<Uuid>,
        /// Leave the patient without an assigned physician
        #[arg(long)]
        none: bool,
    },
}

#[derive(Subcommand)]
enum MedicationCommand {
    /// Add a medication to the formulary
    Add {
        #[arg(long)]
        name: String,
        /// insulin or oral
        #[arg(long)]
        kind: MedicationKind,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand)]
enum TherapyCommand {
    /// Prescribe a therapy
    Prescribe {
        #[arg(long)]
        patient: Uuid,
        #[arg(long)]
        physician: Uuid,
        #[arg(long)]
        medication: Uuid,
        /// YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,
        /// YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        daily_intakes: u32,
        #[arg(long)]
        quantity: f64,
        #[arg(long, default_value = "")]
        instructions: String,
    },

    /// Stop a therapy
    Deactivate {
        #[arg(long)]
        therapy: Uuid,
    },

    /// List therapies
    List {
        #[arg(long)]
        patient: Option<Uuid>,
    },
}

#[derive(Subcommand)]
enum ReadingCommand {
    /// Record a glucose reading and classify it
    Add {
        #[arg(long)]
        patient: Uuid,
        /// mg/dL
        #[arg(long)]
        value: f64,
        /// pre or post
        #[arg(long)]
        moment: MealMoment,
        /// breakfast, lunch or dinner
        #[arg(long)]
        meal: Meal,
        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum IntakeCommand {
    /// Record a medication intake
    Add {
        #[arg(long)]
        patient: Uuid,
        #[arg(long)]
        therapy: Uuid,
        #[arg(long)]
        quantity: f64,
        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum MonitorCommand {
    /// Check every active therapy once (schedule daily)
    Run {
        /// Clinic date to evaluate (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum AlertsCommand {
    /// List alerts, newest first
    List {
        #[arg(long)]
        patient: Option<Uuid>,
        #[arg(long)]
        physician: Option<Uuid>,
        #[arg(long)]
        unresolved: bool,
        /// low, medium or high
        #[arg(long)]
        min_severity: Option<Severity>,
    },

    /// Mark an alert resolved
    Resolve {
        #[arg(long)]
        alert: Uuid,
        #[arg(long)]
        physician: Uuid,
    },

    /// Append alerts to a CSV file
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        unresolved: bool,
    },
}

fn main() -> Result<()> {
    gluco_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let mut store = FileStore::open(data_dir, config.calendar.offset()?)?;

    match cli.command {
        Commands::Physician(cmd) => cmd_physician(&mut store, cmd),
        Commands::Patient(cmd) => cmd_patient(&mut store, cmd),
        Commands::Medication(cmd) => cmd_medication(&mut store, cmd),
        Commands::Therapy(cmd) => cmd_therapy(&mut store, cmd),
        Commands::Reading(ReadingCommand::Add {
            patient,
            value,
            moment,
            meal,
            at,
        }) => {
            let reading = GlucoseReading {
                id: Uuid::new_v4(),
                patient_id: patient,
                taken_at: at.unwrap_or_else(Utc::now),
                value,
                moment,
                meal,
            };
            let id = reading.id;
            let outcome = record_reading(&mut store, reading)?;
            println!("✓ Reading recorded");
            println!("  id: {}", id);
            print_outcome(outcome.as_ref());
            Ok(())
        }
        Commands::Intake(IntakeCommand::Add {
            patient,
            therapy,
            quantity,
            at,
        }) => {
            let intake = MedicationIntake {
                id: Uuid::new_v4(),
                patient_id: patient,
                therapy_id: therapy,
                medication_id: Uuid::nil(),
                taken_at: at.unwrap_or_else(Utc::now),
                quantity,
            };
            let id = intake.id;
            let outcome = record_intake(&mut store, intake)?;
            println!("✓ Intake recorded");
            println!("  id: {}", id);
            print_outcome(outcome.as_ref());
            Ok(())
        }
        Commands::Monitor(MonitorCommand::Run { date }) => cmd_monitor(&mut store, date),
        Commands::Alerts(cmd) => cmd_alerts(&mut store, cmd),
        Commands::Report {
            patient,
            days,
            export,
        } => cmd_report(
            &store,
            patient,
            days.unwrap_or(config.report.default_days),
            export,
        ),
    }
}

fn cmd_physician(store: &mut FileStore, cmd: PhysicianCommand) -> Result<()> {
    match cmd {
        PhysicianCommand::Add {
            first_name,
            last_name,
        } => {
            let physician = Physician {
                id: Uuid::new_v4(),
                first_name,
                last_name,
            };
            let name = physician.display_name();
            let id = physician.id;
            store.update_registry(|registry| registry.add_physician(physician))?;
            println!("✓ Added physician {}", name);
            println!("  id: {}", id);
        }
    }
    Ok(())
}

fn cmd_patient(store: &mut FileStore, cmd: PatientCommand) -> Result<()> {
    match cmd {
        PatientCommand::Add {
            first_name,
            last_name,
            birth_date,
            physician,
            risk,
            past_conditions,
            comorbidities,
        } => {
            let patient = Patient {
                id: Uuid::new_v4(),
                first_name,
                last_name,
                birth_date,
                assigned_physician: physician,
                risk_factors: RiskFactors {
                    smoker: risk.smoker,
                    former_smoker: risk.former_smoker,
                    alcohol_problems: risk.alcohol_problems,
                    substance_problems: risk.substance_problems,
                    obesity: risk.obesity,
                },
                past_conditions,
                comorbidities,
            };
            let name = patient.full_name();
            let id = patient.id;
            store.update_registry(|registry| registry.add_patient(patient))?;
            println!("✓ Added patient {}", name);
            println!("  id: {}", id);
            if physician.is_none() {
                println!("  ⚠ No assigned physician: alerts for this patient will be skipped");
            }
        }
        PatientCommand::Assign {
            patient,
            physician,
            none: _,
        } => {
            store.update_registry(|registry| registry.assign_physician(patient, physician))?;
            match physician {
                Some(id) => println!("✓ Patient {} assigned to physician {}", patient, id),
                None => println!("✓ Patient {} has no assigned physician", patient),
            }
        }
    }
    Ok(())
}

fn cmd_medication(store: &mut FileStore, cmd: MedicationCommand) -> Result<()> {
    match cmd {
        MedicationCommand::Add {
            name,
            kind,
            description,
        } => {
            let medication = Medication {
                id: Uuid::new_v4(),
                name,
                kind,
                description,
            };
            let id = medication.id;
            let label = medication.name.clone();
            store.update_registry(|registry| registry.add_medication(medication))?;
            println!("✓ Added medication {}", label);
            println!("  id: {}", id);
        }
    }
    Ok(())
}

fn cmd_therapy(store: &mut FileStore, cmd: TherapyCommand) -> Result<()> {
    match cmd {
        TherapyCommand::Prescribe {
            patient,
            physician,
            medication,
            start,
            end,
            daily_intakes,
            quantity,
            instructions,
        } => {
            let therapy = Therapy {
                id: Uuid::new_v4(),
                patient_id: patient,
                physician_id: physician,
                medication_id: medication,
                start_date: start,
                end_date: end,
                daily_intakes,
                quantity_per_intake: quantity,
                instructions,
                active: true,
            };
            let id = therapy.id;
            let entry = prescribe_therapy(store, therapy)?;
            println!("✓ Therapy prescribed: {}", entry.details);
            println!("  id: {}", id);
        }
        TherapyCommand::Deactivate { therapy } => {
            store.update_registry(|registry| registry.set_therapy_active(therapy, false))?;
            println!("✓ Therapy {} deactivated", therapy);
        }
        TherapyCommand::List { patient } => {
            let registry = store.registry();
            let mut therapies: Vec<&Therapy> = match patient {
                Some(id) => registry.therapies_for(id),
                None => registry.therapies.values().collect(),
            };
            therapies.sort_by(|a, b| b.start_date.cmp(&a.start_date));

            if therapies.is_empty() {
                println!("No therapies found.");
            }
            for therapy in therapies {
                let medication = registry
                    .medication(therapy.medication_id)
                    .map(|m| m.name.as_str())
                    .unwrap_or("<unknown medication>");
                println!(
                    "{}  {}  {} → {}  {}×{} per day{}",
                    therapy.id,
                    medication,
                    therapy.start_date,
                    therapy.end_date,
                    therapy.daily_intakes,
                    therapy.quantity_per_intake,
                    if therapy.active { "" } else { "  (inactive)" }
                );
            }
        }
    }
    Ok(())
}

fn cmd_monitor(store: &mut FileStore, date: Option<NaiveDate>) -> Result<()> {
    let now = Utc::now();
    let today = date.unwrap_or_else(|| calendar_date(now, store.calendar_offset()));

    let report = run_adherence_monitor(store, today, now)?;

    println!("✓ Adherence check for {}", today);
    println!("  Therapies checked: {}", report.therapies_checked);
    println!("  Reminders: {}", report.reminders);
    println!("  Escalations: {}", report.escalations);
    if report.skipped_no_physician > 0 {
        println!(
            "  Skipped (no assigned physician): {}",
            report.skipped_no_physician
        );
    }
    if !report.failures.is_empty() {
        eprintln!("⚠ {} therapies failed:", report.failures.len());
        for failure in &report.failures {
            eprintln!("  - {}: {}", failure.therapy_id, failure.error);
        }
    }
    Ok(())
}

fn cmd_alerts(store: &mut FileStore, cmd: AlertsCommand) -> Result<()> {
    match cmd {
        AlertsCommand::List {
            patient,
            physician,
            unresolved,
            min_severity,
        } => {
            let filter = AlertFilter {
                patient_id: patient,
                physician_id: physician,
                unresolved_only: unresolved,
                min_severity,
            };
            let alerts = select_alerts(store.alerts()?, &filter);
            if alerts.is_empty() {
                println!("No alerts.");
            }
            for alert in &alerts {
                println!(
                    "{} [{}] {} {}{}",
                    alert.created_at.format("%Y-%m-%d %H:%M"),
                    alert.severity,
                    alert.kind,
                    alert.description,
                    if alert.resolved { " (resolved)" } else { "" }
                );
                println!("  id: {}", alert.id);
            }
        }
        AlertsCommand::Resolve { alert, physician } => {
            let resolved = store.resolve_alert(alert, physician, Utc::now())?;
            println!("✓ Alert resolved: {}", resolved.description);
        }
        AlertsCommand::Export { out, unresolved } => {
            let filter = AlertFilter {
                unresolved_only: unresolved,
                ..Default::default()
            };
            let alerts = select_alerts(store.alerts()?, &filter);
            let count = export_alerts(&alerts, &out)?;
            println!("✓ Exported {} alerts to CSV", count);
            println!("  CSV: {}", out.display());
        }
    }
    Ok(())
}

fn cmd_report(
    store: &FileStore,
    patient_id: Uuid,
    days: i64,
    export: Option<PathBuf>,
) -> Result<()> {
    let patient = store.patient(patient_id)?;
    let report = build_report(&store.readings()?, patient_id, days, Utc::now())?;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  GLUCOSE REPORT · last {} days", days);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", patient.full_name());
    print_stats("All readings", &report.overall);
    print_stats("Pre-meal", &report.pre_meal);
    print_stats("Post-meal", &report.post_meal);
    println!();

    for reading in &report.readings {
        println!(
            "  {}  {:>5} mg/dL  {} {}{}",
            reading.taken_at.format("%Y-%m-%d %H:%M"),
            reading.value,
            reading.moment.label(),
            reading.meal.label(),
            if reading.is_normal() { "" } else { "  ⚠" }
        );
    }

    if let Some(path) = export {
        let count = export_readings(&report.readings, &path)?;
        println!();
        println!("✓ Exported {} readings to {}", count, path.display());
    }

    Ok(())
}

fn print_stats(label: &str, stats: &report::ReadingStats) {
    match (stats.mean, stats.min, stats.max) {
        (Some(mean), Some(min), Some(max)) => println!(
            "  {}: {} readings, mean {:.1} mg/dL (min {}, max {}), {} out of range",
            label, stats.count, mean, min, max, stats.abnormal
        ),
        _ => println!("  {}: no readings", label),
    }
}

fn print_outcome(outcome: Option<&AlertOutcome>) {
    match outcome {
        None => {}
        Some(AlertOutcome::Raised(alert)) => {
            println!("  ⚠ {} alert raised: {}", alert.severity, alert.description);
        }
        Some(AlertOutcome::SkippedNoPhysician { .. }) => {
            println!("  ⚠ Alert skipped: patient has no assigned physician");
        }
    }
}
