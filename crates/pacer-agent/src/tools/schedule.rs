//! Training schedule tools.
//!
//! An in-memory calendar of workouts keyed by date. Dates are `YYYY-MM-DD`,
//! `today` or `tomorrow`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use pacer_core::{ToolExecutor, ToolInvocation, ToolOutput};

pub const PLAN_WORKOUT: &str = "plan_workout";
pub const GET_SCHEDULE: &str = "get_schedule";
pub const DELETE_WORKOUT: &str = "delete_workout";

fn resolve_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "tomorrow" => today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| "Date out of range".to_string()),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", raw.trim())),
    }
}

fn summarize(workout: &Value) -> String {
    match workout.get("type").and_then(Value::as_str) {
        Some(kind) => match workout.get("description").and_then(Value::as_str) {
            Some(desc) => format!("{} ({})", kind, desc),
            None => kind.to_string(),
        },
        None => workout.to_string(),
    }
}

/// Workout calendar executor.
#[derive(Debug, Default)]
pub struct TrainingScheduleTools {
    workouts: RwLock<BTreeMap<NaiveDate, Value>>,
}

impl TrainingScheduleTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workout_on(&self, date: NaiveDate) -> Option<Value> {
        self.workouts.read().get(&date).cloned()
    }

    pub fn len(&self) -> usize {
        self.workouts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.read().is_empty()
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn plan_workout(&self, invocation: &ToolInvocation) -> Result<String, String> {
        let date = resolve_date(invocation.require("date")?, Self::today())?;
        let raw = invocation.require("workout_json")?;
        let workout: Value =
            serde_json::from_str(raw).map_err(|e| format!("Invalid workout_json: {}", e))?;
        if !workout.is_object() {
            return Err("workout_json must be a JSON object".to_string());
        }

        let summary = summarize(&workout);
        let replaced = self.workouts.write().insert(date, workout).is_some();
        Ok(if replaced {
            format!("Replaced the workout on {} with {}", date, summary)
        } else {
            format!("Planned {} on {}", summary, date)
        })
    }

    fn get_schedule(&self, invocation: &ToolInvocation) -> Result<String, String> {
        let workouts = self.workouts.read();
        match invocation.param("date") {
            Some(raw) => {
                let date = resolve_date(raw, Self::today())?;
                Ok(match workouts.get(&date) {
                    Some(workout) => format!("{}: {}", date, summarize(workout)),
                    None => format!("No workout planned on {}", date),
                })
            }
            None if workouts.is_empty() => Ok("No workouts planned".to_string()),
            None => Ok(workouts
                .iter()
                .map(|(date, workout)| format!("{}: {}", date, summarize(workout)))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn delete_workout(&self, invocation: &ToolInvocation) -> Result<String, String> {
        let date = resolve_date(invocation.require("date")?, Self::today())?;
        match self.workouts.write().remove(&date) {
            Some(workout) => Ok(format!("Deleted {} on {}", summarize(&workout), date)),
            None => Err(format!("No workout planned on {}", date)),
        }
    }
}

#[async_trait]
impl ToolExecutor for TrainingScheduleTools {
    fn tool_names(&self) -> Vec<String> {
        vec![
            PLAN_WORKOUT.to_string(),
            GET_SCHEDULE.to_string(),
            DELETE_WORKOUT.to_string(),
        ]
    }

    fn describe(&self, name: &str) -> Option<String> {
        let text = match name {
            PLAN_WORKOUT => "Planning your workout",
            GET_SCHEDULE => "Checking your schedule",
            DELETE_WORKOUT => "Removing the workout",
            _ => return None,
        };
        Some(text.to_string())
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolOutput {
        let result = match invocation.name.as_str() {
            PLAN_WORKOUT => self.plan_workout(invocation),
            GET_SCHEDULE => self.get_schedule(invocation),
            DELETE_WORKOUT => self.delete_workout(invocation),
            other => Err(format!("Unknown tool: {}", other)),
        };
        match result {
            Ok(text) => ToolOutput::success(text),
            Err(error) => ToolOutput::failure(error),
        }
    }
}
