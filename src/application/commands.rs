use crate::application::bootstrap::bootstrap_workspace;
use crate::application::cycle_tracker::{
    MAX_HISTORY_ENTRIES, attach_period_end, average_cycle_length, average_period_length,
    current_cycle_day, days_since_start, merge_history, next_period_estimate,
};
use crate::application::plan_editor::{
    EDIT_HORIZON_DAYS, add_rule, normalize_rules, remove_rule, set_rule_end, set_rule_start,
    set_rule_type, toggle_open_end,
};
use crate::application::schedule::{
    Advice, CalendarDayInfo, SlotProjection, active_rule, advice_for, calendar_day_info,
    project_slots,
};
use crate::domain::models::{
    CycleEntry, DEFAULT_PLAN_ID, FastingRule, FastingTypeDef, FastingTypeId, Plan, PlanSnapshot,
    UserSettings, built_in_fasting_types, default_plan, validate_hhmm,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_store::{
    export_document, load_settings, parse_import_payload, save_settings,
};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const STATUS_UNINITIALIZED: &str = "uninitialized";
const STATUS_ACTIVE: &str = "active";
const CALENDAR_RANGE_MAX_DAYS: i64 = 62;
const DEFAULT_SEED_MONTHS: u32 = 12;
const MAX_SEED_MONTHS: u32 = 24;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    data_dir: PathBuf,
    logs_dir: PathBuf,
    settings: Mutex<UserSettings>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let _ = bootstrap_workspace(&workspace_root)?;
        let data_dir = workspace_root.join("data");
        let logs_dir = workspace_root.join("logs");
        let settings = load_settings(&data_dir)?;

        Ok(Self {
            data_dir,
            logs_dir,
            settings: Mutex::new(settings),
            log_guard: Mutex::new(()),
        })
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

fn lock_settings(state: &AppState) -> Result<MutexGuard<'_, UserSettings>, InfraError> {
    state
        .settings
        .lock()
        .map_err(|error| InfraError::InvalidInput(format!("settings lock poisoned: {error}")))
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_cycle_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_rule: Option<FastingRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fasting_type: Option<FastingTypeDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<SlotProjection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_period_estimate: Option<NaiveDate>,
    pub is_fasting_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerResponse {
    pub cycle_length: u32,
    pub period_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_period_start: Option<NaiveDate>,
    pub cycle_history: Vec<CycleEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanListItem {
    #[serde(flatten)]
    pub plan: Plan,
    pub is_builtin: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferencesResponse {
    pub cycle_length: u32,
    pub period_length: u32,
    pub fasting_window_start: String,
    pub fasting_window_end: String,
    pub is_fasting_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSettingsResponse {
    pub cycle_history_entries: usize,
    pub custom_plans: usize,
    pub custom_fasting_types: usize,
}

/// The rendering contract for a given date: either an explicit
/// "uninitialized" signal (no period logged yet, drives onboarding) or the
/// resolved cycle day, rule, schedule and advice. Everything is recomputed
/// from the persisted aggregate on every call.
pub fn get_cycle_status_impl(
    state: &AppState,
    date: Option<String>,
) -> Result<CycleStatusResponse, InfraError> {
    let target_date = resolve_date_input(date.as_deref())?;
    let settings = lock_settings(state)?.clone();

    let Some(last_start) = settings.latest_period_start() else {
        return Ok(CycleStatusResponse {
            status: STATUS_UNINITIALIZED.to_string(),
            current_cycle_day: None,
            days_since_start: None,
            plan_name: None,
            active_rule: None,
            fasting_type: None,
            schedule: None,
            advice: None,
            next_period_estimate: None,
            is_fasting_enabled: settings.is_fasting_enabled,
        });
    };

    let cycle_day = current_cycle_day(target_date, last_start, settings.cycle_length);
    let plan = settings.selected_plan();
    let rule = active_rule(&plan.rules, cycle_day, settings.cycle_length).cloned();

    let mut fasting_type = None;
    let mut schedule = None;
    let mut advice = None;
    if let Some(rule) = &rule {
        let def = settings.resolve_fasting_type(&rule.fasting_type);
        advice = Some(advice_for(rule, def.as_ref(), &settings));
        schedule = def
            .as_ref()
            .map(|def| project_slots(def, cycle_day, rule.day_start));
        fasting_type = def;
    }

    Ok(CycleStatusResponse {
        status: STATUS_ACTIVE.to_string(),
        current_cycle_day: Some(cycle_day),
        days_since_start: Some(days_since_start(target_date, last_start)),
        plan_name: Some(plan.name),
        active_rule: rule,
        fasting_type,
        schedule,
        advice,
        next_period_estimate: Some(next_period_estimate(
            target_date,
            last_start,
            settings.cycle_length,
        )),
        is_fasting_enabled: settings.is_fasting_enabled,
    })
}

pub fn log_period_start_impl(state: &AppState, date: String) -> Result<LedgerResponse, InfraError> {
    let start_date = parse_date_input(&date, "date")?;
    if start_date > today() {
        return Err(InfraError::InvalidInput(
            "period start must not be in the future".to_string(),
        ));
    }

    let mut settings = lock_settings(state)?;
    let plan = settings.selected_plan();
    let entry = CycleEntry {
        start_date,
        end_date: None,
        plan_snapshot: Some(PlanSnapshot {
            id: plan.id,
            name: plan.name,
        }),
    };
    settings.cycle_history = merge_history(&settings.cycle_history, entry);
    settings.last_period_start = settings.cycle_history.first().map(|entry| entry.start_date);
    if let Some(cycle_length) = average_cycle_length(&settings.cycle_history) {
        settings.cycle_length = cycle_length;
    }
    save_settings(&state.data_dir, &settings)?;
    let response = ledger_response(&settings);
    drop(settings);

    state.log_info(
        "log_period_start",
        &format!("logged period start {start_date}"),
    );
    Ok(response)
}

pub fn log_period_end_impl(state: &AppState, date: String) -> Result<LedgerResponse, InfraError> {
    let end_date = parse_date_input(&date, "date")?;
    if end_date > today() {
        return Err(InfraError::InvalidInput(
            "period end must not be in the future".to_string(),
        ));
    }

    let mut settings = lock_settings(state)?;
    let Some(history) = attach_period_end(&settings.cycle_history, end_date) else {
        return Err(InfraError::InvalidInput(
            "no period start on or before that date".to_string(),
        ));
    };
    settings.cycle_history = history;
    if let Some(period_length) = average_period_length(&settings.cycle_history) {
        settings.period_length = period_length;
    }
    save_settings(&state.data_dir, &settings)?;
    let response = ledger_response(&settings);
    drop(settings);

    state.log_info("log_period_end", &format!("logged period end {end_date}"));
    Ok(response)
}

pub fn list_cycle_history_impl(state: &AppState) -> Result<LedgerResponse, InfraError> {
    let settings = lock_settings(state)?;
    Ok(ledger_response(&settings))
}

pub fn calendar_days_impl(
    state: &AppState,
    start: String,
    end: String,
) -> Result<Vec<CalendarDayInfo>, InfraError> {
    let start_date = parse_date_input(&start, "start")?;
    let end_date = parse_date_input(&end, "end")?;
    if end_date < start_date {
        return Err(InfraError::InvalidInput(
            "end must not be before start".to_string(),
        ));
    }
    let span_days = (end_date - start_date).num_days() + 1;
    if span_days > CALENDAR_RANGE_MAX_DAYS {
        return Err(InfraError::InvalidInput(format!(
            "date range is capped at {CALENDAR_RANGE_MAX_DAYS} days"
        )));
    }

    let settings = lock_settings(state)?.clone();
    let mut days = Vec::with_capacity(span_days as usize);
    let mut cursor = start_date;
    while cursor <= end_date {
        if let Some(info) = calendar_day_info(&settings, cursor) {
            days.push(info);
        }
        cursor += Duration::days(1);
    }
    Ok(days)
}

pub fn list_plans_impl(state: &AppState) -> Result<Vec<PlanListItem>, InfraError> {
    let settings = lock_settings(state)?;
    let mut plans = vec![PlanListItem {
        plan: default_plan(),
        is_builtin: true,
        is_active: settings.selected_plan_id == DEFAULT_PLAN_ID,
    }];
    for plan in &settings.custom_plans {
        plans.push(PlanListItem {
            is_active: settings.selected_plan_id == plan.id,
            plan: plan.clone(),
            is_builtin: false,
        });
    }
    Ok(plans)
}

pub fn select_plan_impl(state: &AppState, plan_id: String) -> Result<Plan, InfraError> {
    let plan_id = plan_id.trim();
    if plan_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "plan_id must not be empty".to_string(),
        ));
    }

    let mut settings = lock_settings(state)?;
    let Some(plan) = settings.find_plan(plan_id) else {
        return Err(InfraError::InvalidInput(format!(
            "plan not found: {plan_id}"
        )));
    };
    settings.selected_plan_id = plan_id.to_string();
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("select_plan", &format!("selected plan_id={plan_id}"));
    Ok(plan)
}

pub fn add_plan_impl(state: &AppState, mut plan: Plan) -> Result<Plan, InfraError> {
    plan.id = plan.id.trim().to_string();
    plan.name = plan.name.trim().to_string();
    if plan.id.is_empty() {
        plan.id = next_id("plan");
    }

    let mut settings = lock_settings(state)?;
    if plan.id == DEFAULT_PLAN_ID
        || settings
            .custom_plans
            .iter()
            .any(|existing| existing.id == plan.id)
    {
        return Err(InfraError::InvalidInput(format!(
            "plan id already exists: {}",
            plan.id
        )));
    }
    plan.rules = normalize_rules(&plan.rules, &settings, EDIT_HORIZON_DAYS);
    plan.validate().map_err(InfraError::InvalidInput)?;
    settings.custom_plans.push(plan.clone());
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("add_plan", &format!("added plan_id={}", plan.id));
    Ok(plan)
}

pub fn update_plan_impl(state: &AppState, plan: Plan) -> Result<Plan, InfraError> {
    let plan_id = plan.id.trim().to_string();
    if plan_id == DEFAULT_PLAN_ID {
        return Err(InfraError::InvalidInput(
            "the built-in plan is read-only".to_string(),
        ));
    }

    let mut settings = lock_settings(state)?;
    let Some(position) = settings
        .custom_plans
        .iter()
        .position(|existing| existing.id == plan_id)
    else {
        return Err(InfraError::InvalidInput(format!(
            "plan not found: {plan_id}"
        )));
    };

    let mut updated = plan;
    updated.id = plan_id.clone();
    updated.name = updated.name.trim().to_string();
    updated.rules = normalize_rules(&updated.rules, &settings, EDIT_HORIZON_DAYS);
    updated.validate().map_err(InfraError::InvalidInput)?;
    settings.custom_plans[position] = updated.clone();
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("update_plan", &format!("updated plan_id={plan_id}"));
    Ok(updated)
}

pub fn delete_plan_impl(state: &AppState, plan_id: String) -> Result<bool, InfraError> {
    let plan_id = plan_id.trim();
    if plan_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "plan_id must not be empty".to_string(),
        ));
    }
    if plan_id == DEFAULT_PLAN_ID {
        return Err(InfraError::InvalidInput(
            "the built-in plan cannot be deleted".to_string(),
        ));
    }

    let mut settings = lock_settings(state)?;
    let before = settings.custom_plans.len();
    settings.custom_plans.retain(|plan| plan.id != plan_id);
    if settings.custom_plans.len() == before {
        return Ok(false);
    }
    if settings.selected_plan_id == plan_id {
        settings.selected_plan_id = DEFAULT_PLAN_ID.to_string();
    }
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("delete_plan", &format!("deleted plan_id={plan_id}"));
    Ok(true)
}

pub fn list_fasting_types_impl(state: &AppState) -> Result<Vec<FastingTypeDef>, InfraError> {
    let settings = lock_settings(state)?;
    let mut types = settings.custom_fasting_types.clone();
    types.extend(built_in_fasting_types());
    Ok(types)
}

pub fn add_fasting_type_impl(
    state: &AppState,
    mut def: FastingTypeDef,
) -> Result<FastingTypeDef, InfraError> {
    def.name = def.name.trim().to_string();
    if def.id.as_str().trim().is_empty() {
        def.id = FastingTypeId::Custom(next_id("type"));
    }
    if def.id.is_builtin() {
        return Err(InfraError::InvalidInput(
            "system fasting type ids are reserved".to_string(),
        ));
    }
    if def.slots.is_empty() {
        return Err(InfraError::InvalidInput(
            "a fasting type needs at least one fasting slot".to_string(),
        ));
    }
    def.is_system = false;
    def.validate().map_err(InfraError::InvalidInput)?;

    let mut settings = lock_settings(state)?;
    if settings
        .custom_fasting_types
        .iter()
        .any(|existing| existing.id == def.id)
    {
        return Err(InfraError::InvalidInput(format!(
            "fasting type id already exists: {}",
            def.id
        )));
    }
    settings.custom_fasting_types.push(def.clone());
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("add_fasting_type", &format!("added type_id={}", def.id));
    Ok(def)
}

pub fn update_fasting_type_impl(
    state: &AppState,
    mut def: FastingTypeDef,
) -> Result<FastingTypeDef, InfraError> {
    if def.id.is_builtin() {
        return Err(InfraError::InvalidInput(
            "system fasting types are read-only".to_string(),
        ));
    }
    if def.slots.is_empty() {
        return Err(InfraError::InvalidInput(
            "a fasting type needs at least one fasting slot".to_string(),
        ));
    }
    def.name = def.name.trim().to_string();
    def.is_system = false;
    def.validate().map_err(InfraError::InvalidInput)?;

    let mut settings = lock_settings(state)?;
    let Some(position) = settings
        .custom_fasting_types
        .iter()
        .position(|existing| existing.id == def.id)
    else {
        return Err(InfraError::InvalidInput(format!(
            "fasting type not found: {}",
            def.id
        )));
    };
    settings.custom_fasting_types[position] = def.clone();
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("update_fasting_type", &format!("updated type_id={}", def.id));
    Ok(def)
}

pub fn delete_fasting_type_impl(state: &AppState, id: String) -> Result<bool, InfraError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(InfraError::InvalidInput("id must not be empty".to_string()));
    }
    let id = FastingTypeId::from(id.to_string());
    if id.is_builtin() {
        return Err(InfraError::InvalidInput(
            "system fasting types cannot be deleted".to_string(),
        ));
    }

    let mut settings = lock_settings(state)?;
    let before = settings.custom_fasting_types.len();
    settings.custom_fasting_types.retain(|def| def.id != id);
    if settings.custom_fasting_types.len() == before {
        return Ok(false);
    }
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("delete_fasting_type", &format!("deleted type_id={id}"));
    Ok(true)
}

pub fn update_preferences_impl(
    state: &AppState,
    cycle_length: Option<u32>,
    period_length: Option<u32>,
    fasting_window_start: Option<String>,
    fasting_window_end: Option<String>,
    is_fasting_enabled: Option<bool>,
) -> Result<PreferencesResponse, InfraError> {
    if cycle_length == Some(0) {
        return Err(InfraError::InvalidInput(
            "cycle_length must be >= 1".to_string(),
        ));
    }
    if period_length == Some(0) {
        return Err(InfraError::InvalidInput(
            "period_length must be >= 1".to_string(),
        ));
    }
    if let Some(value) = fasting_window_start.as_deref() {
        validate_hhmm(value, "fasting_window_start").map_err(InfraError::InvalidInput)?;
    }
    if let Some(value) = fasting_window_end.as_deref() {
        validate_hhmm(value, "fasting_window_end").map_err(InfraError::InvalidInput)?;
    }

    let mut settings = lock_settings(state)?;
    if let Some(value) = cycle_length {
        settings.cycle_length = value;
    }
    if let Some(value) = period_length {
        settings.period_length = value;
    }
    if let Some(value) = fasting_window_start {
        settings.fasting_window_start = value;
    }
    if let Some(value) = fasting_window_end {
        settings.fasting_window_end = value;
    }
    if let Some(value) = is_fasting_enabled {
        settings.is_fasting_enabled = value;
    }
    save_settings(&state.data_dir, &settings)?;
    let response = PreferencesResponse {
        cycle_length: settings.cycle_length,
        period_length: settings.period_length,
        fasting_window_start: settings.fasting_window_start.clone(),
        fasting_window_end: settings.fasting_window_end.clone(),
        is_fasting_enabled: settings.is_fasting_enabled,
    };
    drop(settings);

    state.log_info("update_preferences", "updated preferences");
    Ok(response)
}

pub fn editor_normalize_rules_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    Ok(normalize_rules(&rules, &settings, EDIT_HORIZON_DAYS))
}

pub fn editor_add_rule_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    add_rule(&rules, &settings, EDIT_HORIZON_DAYS)
}

pub fn editor_remove_rule_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
    index: usize,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    remove_rule(&rules, index, &settings, EDIT_HORIZON_DAYS)
}

pub fn editor_set_rule_start_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
    index: usize,
    day: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    set_rule_start(&rules, index, day, &settings, EDIT_HORIZON_DAYS)
}

pub fn editor_set_rule_end_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
    index: usize,
    day: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    set_rule_end(&rules, index, day, &settings, EDIT_HORIZON_DAYS)
}

pub fn editor_set_rule_type_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
    index: usize,
    fasting_type: String,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    set_rule_type(
        &rules,
        index,
        FastingTypeId::from(fasting_type),
        &settings,
        EDIT_HORIZON_DAYS,
    )
}

pub fn editor_toggle_open_end_impl(
    state: &AppState,
    rules: Vec<FastingRule>,
    index: usize,
) -> Result<Vec<FastingRule>, InfraError> {
    let settings = lock_settings(state)?;
    toggle_open_end(&rules, index, &settings, EDIT_HORIZON_DAYS)
}

pub fn export_settings_impl(state: &AppState) -> Result<String, InfraError> {
    let settings = lock_settings(state)?;
    let document = export_document(&settings)?;
    drop(settings);

    state.log_info("export_settings", "exported settings document");
    Ok(document)
}

/// Replaces the whole aggregate. A payload failing shape validation leaves
/// the current state untouched.
pub fn import_settings_impl(
    state: &AppState,
    payload: String,
) -> Result<ImportSettingsResponse, InfraError> {
    let imported = parse_import_payload(&payload)?;

    let mut settings = lock_settings(state)?;
    *settings = imported;
    save_settings(&state.data_dir, &settings)?;
    let response = ImportSettingsResponse {
        cycle_history_entries: settings.cycle_history.len(),
        custom_plans: settings.custom_plans.len(),
        custom_fasting_types: settings.custom_fasting_types.len(),
    };
    drop(settings);

    state.log_info(
        "import_settings",
        &format!(
            "imported settings with {} history entries",
            response.cycle_history_entries
        ),
    );
    Ok(response)
}

pub fn reset_settings_impl(state: &AppState) -> Result<(), InfraError> {
    let mut settings = lock_settings(state)?;
    *settings = UserSettings::default();
    save_settings(&state.data_dir, &settings)?;
    drop(settings);

    state.log_info("reset_settings", "reset settings to defaults");
    Ok(())
}

/// Fills the ledger with a deterministic, plausible history for demos.
pub fn seed_demo_history_impl(
    state: &AppState,
    months: Option<u32>,
) -> Result<LedgerResponse, InfraError> {
    let months = months.unwrap_or(DEFAULT_SEED_MONTHS).clamp(1, MAX_SEED_MONTHS);
    let today = today();

    let mut settings = lock_settings(state)?;
    let plan = settings.selected_plan();
    let snapshot = PlanSnapshot {
        id: plan.id,
        name: plan.name,
    };
    let mut history = generate_demo_history(today, months, &snapshot);
    history.truncate(MAX_HISTORY_ENTRIES);
    settings.cycle_history = history;
    settings.last_period_start = settings.cycle_history.first().map(|entry| entry.start_date);
    if let Some(cycle_length) = average_cycle_length(&settings.cycle_history) {
        settings.cycle_length = cycle_length;
    }
    if let Some(period_length) = average_period_length(&settings.cycle_history) {
        settings.period_length = period_length;
    }
    save_settings(&state.data_dir, &settings)?;
    let response = ledger_response(&settings);
    drop(settings);

    state.log_info(
        "seed_demo_history",
        &format!("seeded {} demo entries", response.cycle_history.len()),
    );
    Ok(response)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidInput(format!("{field_name} must be YYYY-MM-DD: {error}"))
    })
}

fn resolve_date_input(value: Option<&str>) -> Result<NaiveDate, InfraError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => parse_date_input(raw, "date"),
        None => Ok(today()),
    }
}

fn ledger_response(settings: &UserSettings) -> LedgerResponse {
    LedgerResponse {
        cycle_length: settings.cycle_length,
        period_length: settings.period_length,
        last_period_start: settings.last_period_start,
        cycle_history: settings.cycle_history.clone(),
    }
}

fn generate_demo_history(
    today: NaiveDate,
    months: u32,
    snapshot: &PlanSnapshot,
) -> Vec<CycleEntry> {
    let mut cursor = today - Duration::days(i64::from(months) * 30);
    cursor = cursor.with_day(1).unwrap_or(cursor);

    let mut history = Vec::new();
    let mut tick: u32 = 0;
    while cursor < today {
        // Fixed modular variation instead of randomness: cycles of 26 to 30
        // days with periods of 4 to 6 days, reproducible across runs.
        let cycle_length = 26 + (tick * 3) % 5;
        let period_length = 4 + (tick * 2) % 3;
        let period_end = cursor + Duration::days(i64::from(period_length) - 1);
        history.push(CycleEntry {
            start_date: cursor,
            end_date: (period_end < today).then_some(period_end),
            plan_snapshot: Some(snapshot.clone()),
        });
        cursor += Duration::days(i64::from(cycle_length));
        tick += 1;
    }

    history.sort_by(|left, right| right.start_date.cmp(&left.start_date));
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FastingSlot, RuleEnd};
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "fasting-cycles-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn sample_custom_plan() -> Plan {
        Plan {
            id: String::new(),
            name: "Summer Cut".to_string(),
            description: "Leaner weeks before vacation.".to_string(),
            rules: vec![
                FastingRule {
                    day_start: 1,
                    day_end: RuleEnd::Day(14),
                    fasting_type: FastingTypeId::Standard,
                    description: None,
                },
                FastingRule {
                    day_start: 15,
                    day_end: RuleEnd::Open,
                    fasting_type: FastingTypeId::NoFasting,
                    description: None,
                },
            ],
        }
    }

    fn sample_custom_type() -> FastingTypeDef {
        FastingTypeDef {
            id: FastingTypeId::Custom(String::new()),
            name: "Warrior Diet".to_string(),
            window_duration_hours: 48,
            slots: vec![FastingSlot {
                start_day_offset: 0,
                start_time: "18:00".to_string(),
                end_day_offset: 1,
                end_time: "18:00".to_string(),
            }],
            color: "#d96d4f".to_string(),
            description: "A full day of fasting every other day.".to_string(),
            is_system: false,
        }
    }

    #[test]
    fn period_logging_flow_updates_ledger_and_averages() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let started = log_period_start_impl(&state, "2024-03-01".to_string()).expect("log start");
        assert_eq!(started.cycle_history.len(), 1);
        assert_eq!(started.last_period_start, Some(date("2024-03-01")));
        assert_eq!(
            started.cycle_history[0]
                .plan_snapshot
                .as_ref()
                .map(|snapshot| snapshot.id.as_str()),
            Some(DEFAULT_PLAN_ID)
        );

        let ended = log_period_end_impl(&state, "2024-03-06".to_string()).expect("log end");
        assert_eq!(ended.cycle_history[0].end_date, Some(date("2024-03-06")));
        assert_eq!(ended.period_length, 6);

        let second = log_period_start_impl(&state, "2024-03-29".to_string()).expect("second start");
        assert_eq!(second.cycle_history.len(), 2);
        assert_eq!(second.cycle_length, 28);
        assert_eq!(second.last_period_start, Some(date("2024-03-29")));
    }

    #[test]
    fn outlier_gap_is_excluded_from_cycle_length() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        log_period_start_impl(&state, "2024-03-01".to_string()).expect("first");
        log_period_start_impl(&state, "2024-03-29".to_string()).expect("second");
        // A 5-day gap is logging noise and must not drag the average down.
        let ledger = log_period_start_impl(&state, "2024-04-03".to_string()).expect("third");
        assert_eq!(ledger.cycle_length, 28);
    }

    #[test]
    fn future_dates_are_rejected_without_mutation() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        assert!(log_period_start_impl(&state, "9999-01-01".to_string()).is_err());
        assert!(log_period_end_impl(&state, "9999-01-01".to_string()).is_err());
        let history = list_cycle_history_impl(&state).expect("list");
        assert!(history.cycle_history.is_empty());
    }

    #[test]
    fn period_end_requires_a_matching_start() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        log_period_start_impl(&state, "2024-03-10".to_string()).expect("log start");
        assert!(log_period_end_impl(&state, "2024-03-01".to_string()).is_err());
    }

    #[test]
    fn cycle_status_reports_uninitialized_then_active() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let status = get_cycle_status_impl(&state, None).expect("status");
        assert_eq!(status.status, STATUS_UNINITIALIZED);
        assert!(status.current_cycle_day.is_none());

        log_period_start_impl(&state, "2024-03-01".to_string()).expect("log start");

        let status =
            get_cycle_status_impl(&state, Some("2024-03-05".to_string())).expect("status");
        assert_eq!(status.status, STATUS_ACTIVE);
        assert_eq!(status.current_cycle_day, Some(5));
        assert_eq!(status.plan_name.as_deref(), Some("Hormonal Harmony"));
        assert_eq!(status.advice.as_ref().map(|advice| advice.title.as_str()), Some("Power Fast"));
        assert_eq!(
            status
                .schedule
                .expect("schedule for standard fasting")
                .slot_descriptions,
            vec!["20:00 to 12:00".to_string()]
        );
        assert_eq!(status.next_period_estimate, Some(date("2024-03-29")));

        let late = get_cycle_status_impl(&state, Some("2024-03-20".to_string())).expect("status");
        assert_eq!(late.current_cycle_day, Some(20));
        assert_eq!(late.advice.expect("advice").title, "Nourish");
    }

    #[test]
    fn plan_crud_flow_reverts_selection_on_delete() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let plan = add_plan_impl(&state, sample_custom_plan()).expect("add plan");
        assert!(!plan.id.is_empty());
        select_plan_impl(&state, plan.id.clone()).expect("select plan");

        let plans = list_plans_impl(&state).expect("list plans");
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().any(|item| item.plan.id == plan.id && item.is_active));

        let deleted = delete_plan_impl(&state, plan.id.clone()).expect("delete plan");
        assert!(deleted);
        let plans = list_plans_impl(&state).expect("list plans");
        assert_eq!(plans.len(), 1);
        assert!(plans[0].is_builtin);
        assert!(plans[0].is_active);
    }

    #[test]
    fn add_plan_rejects_invalid_payloads() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let mut unnamed = sample_custom_plan();
        unnamed.name = "   ".to_string();
        assert!(add_plan_impl(&state, unnamed).is_err());

        let mut empty = sample_custom_plan();
        empty.rules.clear();
        assert!(add_plan_impl(&state, empty).is_err());
    }

    #[test]
    fn update_plan_normalizes_rules_and_rejects_builtin() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let plan = add_plan_impl(&state, sample_custom_plan()).expect("add plan");
        let mut edited = plan.clone();
        edited.rules[0].day_end = RuleEnd::Day(40);
        let updated = update_plan_impl(&state, edited).expect("update plan");
        // Clamped into the editing horizon with one day reserved for the
        // terminal rule.
        assert_eq!(updated.rules[0].day_end, RuleEnd::Day(27));
        assert_eq!(updated.rules[1].day_start, 28);

        let mut builtin = default_plan();
        builtin.name = "Renamed".to_string();
        assert!(update_plan_impl(&state, builtin).is_err());
    }

    #[test]
    fn fasting_type_crud_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let created = add_fasting_type_impl(&state, sample_custom_type()).expect("add type");
        assert!(!created.is_system);
        assert!(matches!(created.id, FastingTypeId::Custom(_)));

        let listed = list_fasting_types_impl(&state).expect("list types");
        assert_eq!(listed.len(), 4);
        assert_eq!(listed[0].id, created.id);

        let mut edited = created.clone();
        edited.name = "Renamed Diet".to_string();
        let updated = update_fasting_type_impl(&state, edited).expect("update type");
        assert_eq!(updated.name, "Renamed Diet");

        let deleted = delete_fasting_type_impl(&state, created.id.as_str().to_string())
            .expect("delete type");
        assert!(deleted);
        assert_eq!(list_fasting_types_impl(&state).expect("list types").len(), 3);
    }

    #[test]
    fn fasting_type_guardrails() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let mut slotless = sample_custom_type();
        slotless.slots.clear();
        assert!(add_fasting_type_impl(&state, slotless).is_err());

        let mut reserved = sample_custom_type();
        reserved.id = FastingTypeId::Standard;
        assert!(add_fasting_type_impl(&state, reserved).is_err());

        assert!(delete_fasting_type_impl(&state, "NO_FASTING".to_string()).is_err());
    }

    #[test]
    fn update_preferences_applies_partial_changes() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let prefs = update_preferences_impl(
            &state,
            Some(30),
            Some(6),
            Some("19:00".to_string()),
            None,
            Some(false),
        )
        .expect("update preferences");
        assert_eq!(prefs.cycle_length, 30);
        assert_eq!(prefs.period_length, 6);
        assert_eq!(prefs.fasting_window_start, "19:00");
        assert_eq!(prefs.fasting_window_end, "12:00");
        assert!(!prefs.is_fasting_enabled);

        assert!(update_preferences_impl(&state, Some(0), None, None, None, None).is_err());
        assert!(
            update_preferences_impl(&state, None, None, Some("25:00".to_string()), None, None)
                .is_err()
        );
    }

    #[test]
    fn editor_commands_reshape_draft_rules() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let draft = default_plan().rules;
        let added = editor_add_rule_impl(&state, draft).expect("add rule");
        assert_eq!(added.len(), 5);
        assert_eq!(added[4].day_start, 28);

        let removed = editor_remove_rule_impl(&state, added, 4).expect("remove rule");
        assert_eq!(removed.len(), 4);

        let shifted = editor_set_rule_end_impl(&state, removed, 0, 12).expect("set end");
        assert_eq!(shifted[0].day_end, RuleEnd::Day(12));
        assert_eq!(shifted[1].day_start, 13);

        assert!(editor_set_rule_start_impl(&state, shifted.clone(), 0, 5).is_err());

        let toggled = editor_toggle_open_end_impl(&state, shifted, 3).expect("toggle");
        assert_eq!(toggled[3].day_end, RuleEnd::Open);
        let concrete = editor_toggle_open_end_impl(&state, toggled, 3).expect("toggle back");
        assert_eq!(concrete[3].day_end, RuleEnd::Day(EDIT_HORIZON_DAYS));
    }

    #[test]
    fn export_then_import_restores_the_aggregate() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        log_period_start_impl(&state, "2024-03-01".to_string()).expect("log start");
        log_period_end_impl(&state, "2024-03-06".to_string()).expect("log end");
        add_plan_impl(&state, sample_custom_plan()).expect("add plan");
        let before = lock_settings(&state).expect("lock").clone();
        let exported = export_settings_impl(&state).expect("export");

        reset_settings_impl(&state).expect("reset");
        assert!(lock_settings(&state).expect("lock").cycle_history.is_empty());

        let summary = import_settings_impl(&state, exported).expect("import");
        assert_eq!(summary.cycle_history_entries, 1);
        assert_eq!(summary.custom_plans, 1);
        let after = lock_settings(&state).expect("lock").clone();
        assert_eq!(after, before);
    }

    #[test]
    fn import_rejects_malformed_payloads() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        log_period_start_impl(&state, "2024-03-01".to_string()).expect("log start");
        assert!(import_settings_impl(&state, "not json".to_string()).is_err());
        assert!(import_settings_impl(&state, "{}".to_string()).is_err());

        // Failed imports leave the aggregate untouched.
        let history = list_cycle_history_impl(&state).expect("list");
        assert_eq!(history.cycle_history.len(), 1);
    }

    #[test]
    fn settings_persist_across_state_reloads() {
        let workspace = TempWorkspace::new();
        {
            let state = workspace.app_state();
            log_period_start_impl(&state, "2024-03-01".to_string()).expect("log start");
        }

        let state = workspace.app_state();
        let history = list_cycle_history_impl(&state).expect("list");
        assert_eq!(history.cycle_history.len(), 1);
        assert_eq!(history.last_period_start, Some(date("2024-03-01")));
    }

    #[test]
    fn calendar_days_project_period_and_rules() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        assert!(
            calendar_days_impl(
                &state,
                "2024-03-01".to_string(),
                "2024-03-07".to_string()
            )
            .expect("no history yet")
            .is_empty()
        );

        log_period_start_impl(&state, "2024-03-01".to_string()).expect("log start");
        let days = calendar_days_impl(
            &state,
            "2024-03-01".to_string(),
            "2024-03-07".to_string(),
        )
        .expect("calendar days");
        assert_eq!(days.len(), 7);
        assert!(days[0].is_period);
        assert_eq!(days[0].cycle_day, 1);
        assert!(!days[6].is_period);
        assert_eq!(days[6].cycle_day, 7);

        assert!(
            calendar_days_impl(&state, "2024-01-01".to_string(), "2024-12-31".to_string())
                .is_err()
        );
    }

    #[test]
    fn seed_demo_history_populates_a_plausible_ledger() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let ledger = seed_demo_history_impl(&state, Some(12)).expect("seed history");
        assert!(!ledger.cycle_history.is_empty());
        assert!(ledger.cycle_history.len() <= MAX_HISTORY_ENTRIES);
        assert!(
            ledger
                .cycle_history
                .windows(2)
                .all(|pair| pair[0].start_date > pair[1].start_date)
        );
        assert_eq!(
            ledger.last_period_start,
            Some(ledger.cycle_history[0].start_date)
        );
        assert!(ledger.cycle_length >= 26 && ledger.cycle_length <= 30);
        assert!(ledger.period_length >= 4 && ledger.period_length <= 6);

        // Same inputs, same ledger.
        let again = seed_demo_history_impl(&state, Some(12)).expect("seed again");
        assert_eq!(again.cycle_history, ledger.cycle_history);
    }
}
