//! Raw API records → export document.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use intervals_icu_client::{ActivityRecord, ApiRecord, DateRange, TrainingSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AI_INSTRUCTION: &str =
    "DO NOT calculate totals from individual activities. Use pre-calculated values.";
pub const ANONYMOUS_ACTIVITY_NAME: &str = "Training Session";

/// Time constant in days of chronic training load (fitness).
const CTL_TIME_CONSTANT: f64 = 42.0;
/// Time constant in days of acute training load (fatigue).
const ATL_TIME_CONSTANT: f64 = 7.0;

/// Raw keys that identify the athlete in a single activity record.
const IDENTIFYING_KEYS: &[&str] = &["athlete_id", "icu_athlete_id"];
const GPS_KEYS: &[&str] = &["start_latlng", "end_latlng"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    #[serde(rename = "READ_THIS_FIRST")]
    pub read_this_first: ReadThisFirst,
    pub metadata: Metadata,
    pub summary: ActivitySummary,
    pub current_status: CurrentStatus,
    pub recent_activities: Vec<ExportActivity>,
    pub wellness_data: Vec<ExportWellness>,
    pub planned_workouts: Vec<PlannedWorkout>,
    pub weekly_summary: WeeklySummary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadThisFirst {
    pub instruction_for_ai: String,
    pub data_period: String,
    pub quick_stats: QuickStats,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuickStats {
    pub total_training_hours: f64,
    pub total_activities: usize,
    pub total_tss: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_name: Option<String>,
    pub last_updated: String,
    pub data_range_days: u32,
    pub oldest: String,
    pub newest: String,
    pub anonymized: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivitySummary {
    pub total_activities: usize,
    pub total_duration_hours: f64,
    pub total_distance_km: f64,
    pub total_tss: f64,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurrentStatus {
    pub fitness: Fitness,
    pub thresholds: Thresholds,
    pub current_metrics: CurrentMetrics,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Fitness {
    pub ctl: Option<f64>,
    pub atl: Option<f64>,
    pub tsb: Option<f64>,
    pub ramp_rate: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub ftp: Option<f64>,
    pub lthr: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CurrentMetrics {
    pub weight_kg: Option<f64>,
    pub resting_hr: Option<f64>,
    pub hrv: Option<f64>,
}

/// One activity in export form. Missing values serialize as `null`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportActivity {
    pub id: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub duration_hours: f64,
    pub distance_km: f64,
    pub tss: Option<f64>,
    pub avg_power: Option<f64>,
    pub normalized_power: Option<f64>,
    pub avg_hr: Option<f64>,
    pub decoupling: Option<f64>,
    pub start_latlng: Option<Value>,
    pub end_latlng: Option<Value>,
}

impl ExportActivity {
    fn is_virtual(&self) -> bool {
        self.kind.as_deref().is_some_and(|k| k.contains("Virtual"))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportWellness {
    pub date: Option<String>,
    pub hrv_rmssd: Option<f64>,
    pub resting_hr: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub weight_kg: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlannedWorkout {
    pub date: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeeklySummary {
    pub activities_count: usize,
    pub training_hours: f64,
    pub avg_hrv: Option<f64>,
    pub avg_resting_hr: Option<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct NormalizeOptions {
    /// `--days` as given by the user, used for the period label.
    pub days: u32,
    pub generated_at: DateTime<Local>,
}

/// Map a fetched snapshot onto the export schema. Does not anonymize.
pub fn normalize(
    snapshot: &TrainingSnapshot,
    range: &DateRange,
    options: &NormalizeOptions,
) -> ExportDocument {
    let activities: Vec<ExportActivity> = snapshot.activities.iter().map(activity).collect();
    let wellness: Vec<ExportWellness> = snapshot.wellness.iter().map(wellness_day).collect();

    let total_hours = round2(sum(&snapshot.activities, "moving_time") / 3600.0);
    let total_tss = sum(&snapshot.activities, "icu_training_load");

    ExportDocument {
        read_this_first: ReadThisFirst {
            instruction_for_ai: AI_INSTRUCTION.into(),
            data_period: format!("Last {} days", options.days),
            quick_stats: QuickStats {
                total_training_hours: total_hours,
                total_activities: activities.len(),
                total_tss: total_tss.round(),
            },
        },
        metadata: Metadata {
            athlete_id: snapshot
                .athlete
                .str_field("id")
                .filter(|id| !id.is_empty()),
            athlete_name: snapshot.athlete.str_field("name"),
            last_updated: options.generated_at.to_rfc3339(),
            data_range_days: options.days,
            oldest: range.oldest().format("%Y-%m-%d").to_string(),
            newest: range.newest().format("%Y-%m-%d").to_string(),
            anonymized: false,
        },
        summary: summarize(&snapshot.activities, &activities),
        current_status: CurrentStatus {
            fitness: fitness_from_yesterday(snapshot.yesterday_wellness.as_ref()),
            thresholds: cycling_thresholds(&snapshot.athlete),
            current_metrics: current_metrics(&snapshot.athlete, snapshot.wellness.last()),
        },
        planned_workouts: snapshot.events.iter().map(planned_workout).collect(),
        weekly_summary: WeeklySummary {
            activities_count: activities.len(),
            training_hours: total_hours,
            avg_hrv: mean(wellness.iter().filter_map(|w| w.hrv_rmssd)),
            avg_resting_hr: mean(wellness.iter().filter_map(|w| w.resting_hr)),
        },
        recent_activities: activities,
        wellness_data: wellness,
    }
}

/// Strip what identifies the athlete. Applying it twice changes nothing.
pub fn anonymize(mut doc: ExportDocument) -> ExportDocument {
    doc.metadata.athlete_id = None;
    doc.metadata.athlete_name = None;
    doc.metadata.anonymized = true;
    for (i, act) in doc.recent_activities.iter_mut().enumerate() {
        act.id = Some(format!("activity_{}", i + 1));
        if !act.is_virtual() {
            act.name = Some(ANONYMOUS_ACTIVITY_NAME.into());
        }
        act.start_latlng = None;
        act.end_latlng = None;
    }
    doc
}

/// Same treatment for a single raw activity (the latest-workout file).
pub fn anonymize_record(mut record: ActivityRecord) -> ActivityRecord {
    let is_virtual = record
        .str_field("type")
        .is_some_and(|t| t.contains("Virtual"));
    let map = &mut record.0;
    if map.contains_key("id") {
        map.insert("id".into(), Value::String("activity_1".into()));
    }
    if !is_virtual && map.contains_key("name") {
        map.insert("name".into(), Value::String(ANONYMOUS_ACTIVITY_NAME.into()));
    }
    for key in IDENTIFYING_KEYS {
        map.remove(*key);
    }
    for key in GPS_KEYS {
        if map.contains_key(*key) {
            map.insert((*key).into(), Value::Null);
        }
    }
    record
}

/// Log the raw field names of every category. Diagnostic only.
pub fn log_raw_fields(snapshot: &TrainingSnapshot) {
    let athlete: BTreeSet<&str> = snapshot.athlete.keys().collect();
    tracing::debug!(fields = ?athlete, "raw athlete fields");
    for (category, records) in [
        ("activities", &snapshot.activities),
        ("wellness", &snapshot.wellness),
        ("events", &snapshot.events),
    ] {
        tracing::debug!(
            count = records.len(),
            fields = ?raw_field_set(records),
            "raw {category} fields"
        );
    }
}

/// Union of keys across `records`, sorted.
pub fn raw_field_set(records: &[ApiRecord]) -> BTreeSet<&str> {
    records.iter().flat_map(ApiRecord::keys).collect()
}

fn activity(raw: &ActivityRecord) -> ExportActivity {
    ExportActivity {
        id: raw.str_field("id"),
        date: raw.str_field("start_date_local"),
        kind: raw.str_field("type"),
        name: raw.str_field("name"),
        duration_hours: round2(raw.f64_field("moving_time").unwrap_or(0.0) / 3600.0),
        distance_km: round2(raw.f64_field("distance").unwrap_or(0.0) / 1000.0),
        tss: raw.f64_field("icu_training_load"),
        avg_power: raw.f64_field("average_watts"),
        normalized_power: raw.f64_field("icu_weighted_avg_watts"),
        avg_hr: raw
            .f64_field("icu_average_hr")
            .or_else(|| raw.f64_field("average_heartrate")),
        decoupling: raw.f64_field("icu_hr_decoupling"),
        start_latlng: raw.get("start_latlng").cloned(),
        end_latlng: raw.get("end_latlng").cloned(),
    }
}

fn wellness_day(raw: &ApiRecord) -> ExportWellness {
    ExportWellness {
        date: raw.str_field("id"),
        hrv_rmssd: raw.f64_field("hrv"),
        resting_hr: raw.f64_field("restingHR"),
        sleep_hours: raw.f64_field("sleepSecs").map(|s| round2(s / 3600.0)),
        weight_kg: raw.f64_field("weight"),
    }
}

fn planned_workout(raw: &ApiRecord) -> PlannedWorkout {
    PlannedWorkout {
        date: raw.str_field("start_date_local"),
        name: raw.str_field("name"),
        category: raw.str_field("category"),
        kind: raw.str_field("type"),
    }
}

fn summarize(raw: &[ActivityRecord], activities: &[ExportActivity]) -> ActivitySummary {
    let mut by_type = BTreeMap::new();
    for act in activities {
        let kind = act.kind.clone().unwrap_or_else(|| "Unknown".into());
        *by_type.entry(kind).or_insert(0) += 1;
    }
    ActivitySummary {
        total_activities: activities.len(),
        total_duration_hours: round2(sum(raw, "moving_time") / 3600.0),
        total_distance_km: round2(sum(raw, "distance") / 1000.0),
        total_tss: sum(raw, "icu_training_load").round(),
        by_type,
    }
}

/// Today's values estimated from yesterday's by one day of exponential decay.
fn fitness_from_yesterday(yesterday: Option<&ApiRecord>) -> Fitness {
    let Some(day) = yesterday else {
        return Fitness::default();
    };
    let ctl_decay = (-1.0 / CTL_TIME_CONSTANT).exp();
    let atl_decay = (-1.0 / ATL_TIME_CONSTANT).exp();

    let ctl = day.f64_field("ctl").map(|v| round2(v * ctl_decay));
    let atl = day.f64_field("atl").map(|v| round2(v * atl_decay));
    let ramp_rate = day.f64_field("rampRate").map(|v| round2(v * ctl_decay));
    let tsb = match (ctl, atl) {
        (Some(c), Some(a)) => Some(round2(c - a)),
        _ => None,
    };
    Fitness {
        ctl,
        atl,
        tsb,
        ramp_rate,
    }
}

/// FTP and LTHR from the first cycling sport settings.
fn cycling_thresholds(athlete: &ApiRecord) -> Thresholds {
    let cycling = athlete
        .get("sportSettings")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|sport| {
            sport
                .get("types")
                .and_then(Value::as_array)
                .is_some_and(|types| {
                    types
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|t| t == "Ride" || t == "VirtualRide")
                })
        });
    match cycling {
        Some(sport) => Thresholds {
            ftp: sport.get("ftp").and_then(Value::as_f64),
            lthr: sport.get("lthr").and_then(Value::as_f64),
        },
        None => Thresholds::default(),
    }
}

fn current_metrics(athlete: &ApiRecord, latest: Option<&ApiRecord>) -> CurrentMetrics {
    let from_latest = |key: &str| latest.and_then(|w| w.f64_field(key));
    CurrentMetrics {
        weight_kg: from_latest("weight").or_else(|| athlete.f64_field("icu_weight")),
        resting_hr: from_latest("restingHR").or_else(|| athlete.f64_field("icu_resting_hr")),
        hrv: from_latest("hrv"),
    }
}

fn sum(records: &[ApiRecord], key: &str) -> f64 {
    records.iter().filter_map(|r| r.f64_field(key)).sum()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (total, count) = values.fold((0.0, 0usize), |(t, c), v| (t + v, c + 1));
    (count > 0).then(|| round2(total / count as f64))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
