mod application;
mod domain;
mod infrastructure;

#[cfg(feature = "desktop")]
use application::bootstrap::bootstrap_workspace;
#[cfg(feature = "desktop")]
use application::commands::{
    AppState, CycleStatusResponse, ImportSettingsResponse, LedgerResponse, PlanListItem,
    PreferencesResponse, add_fasting_type_impl, add_plan_impl, calendar_days_impl,
    delete_fasting_type_impl, delete_plan_impl, editor_add_rule_impl,
    editor_normalize_rules_impl, editor_remove_rule_impl, editor_set_rule_end_impl,
    editor_set_rule_start_impl, editor_set_rule_type_impl, editor_toggle_open_end_impl,
    export_settings_impl, get_cycle_status_impl, import_settings_impl, list_cycle_history_impl,
    list_fasting_types_impl, list_plans_impl, log_period_end_impl, log_period_start_impl,
    reset_settings_impl, seed_demo_history_impl, select_plan_impl, update_fasting_type_impl,
    update_plan_impl, update_preferences_impl,
};
#[cfg(feature = "desktop")]
use application::schedule::CalendarDayInfo;
#[cfg(feature = "desktop")]
use domain::models::{FastingRule, FastingTypeDef, Plan};
#[cfg(feature = "desktop")]
use serde::Serialize;
#[cfg(feature = "desktop")]
use std::path::PathBuf;

#[cfg(feature = "desktop")]
#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    settings_path: String,
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        settings_path: result.settings_path.display().to_string(),
    })
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_cycle_status(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
) -> Result<CycleStatusResponse, String> {
    get_cycle_status_impl(state.inner(), date)
        .map_err(|error| state.command_error("get_cycle_status", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn log_period_start(
    state: tauri::State<'_, AppState>,
    date: String,
) -> Result<LedgerResponse, String> {
    log_period_start_impl(state.inner(), date)
        .map_err(|error| state.command_error("log_period_start", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn log_period_end(
    state: tauri::State<'_, AppState>,
    date: String,
) -> Result<LedgerResponse, String> {
    log_period_end_impl(state.inner(), date)
        .map_err(|error| state.command_error("log_period_end", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn list_cycle_history(state: tauri::State<'_, AppState>) -> Result<LedgerResponse, String> {
    list_cycle_history_impl(state.inner())
        .map_err(|error| state.command_error("list_cycle_history", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn calendar_days(
    state: tauri::State<'_, AppState>,
    start: String,
    end: String,
) -> Result<Vec<CalendarDayInfo>, String> {
    calendar_days_impl(state.inner(), start, end)
        .map_err(|error| state.command_error("calendar_days", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn list_plans(state: tauri::State<'_, AppState>) -> Result<Vec<PlanListItem>, String> {
    list_plans_impl(state.inner()).map_err(|error| state.command_error("list_plans", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn select_plan(state: tauri::State<'_, AppState>, plan_id: String) -> Result<Plan, String> {
    select_plan_impl(state.inner(), plan_id)
        .map_err(|error| state.command_error("select_plan", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn add_plan(state: tauri::State<'_, AppState>, plan: Plan) -> Result<Plan, String> {
    add_plan_impl(state.inner(), plan).map_err(|error| state.command_error("add_plan", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn update_plan(state: tauri::State<'_, AppState>, plan: Plan) -> Result<Plan, String> {
    update_plan_impl(state.inner(), plan)
        .map_err(|error| state.command_error("update_plan", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn delete_plan(state: tauri::State<'_, AppState>, plan_id: String) -> Result<bool, String> {
    delete_plan_impl(state.inner(), plan_id)
        .map_err(|error| state.command_error("delete_plan", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn list_fasting_types(
    state: tauri::State<'_, AppState>,
) -> Result<Vec<FastingTypeDef>, String> {
    list_fasting_types_impl(state.inner())
        .map_err(|error| state.command_error("list_fasting_types", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn add_fasting_type(
    state: tauri::State<'_, AppState>,
    fasting_type: FastingTypeDef,
) -> Result<FastingTypeDef, String> {
    add_fasting_type_impl(state.inner(), fasting_type)
        .map_err(|error| state.command_error("add_fasting_type", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn update_fasting_type(
    state: tauri::State<'_, AppState>,
    fasting_type: FastingTypeDef,
) -> Result<FastingTypeDef, String> {
    update_fasting_type_impl(state.inner(), fasting_type)
        .map_err(|error| state.command_error("update_fasting_type", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn delete_fasting_type(
    state: tauri::State<'_, AppState>,
    fasting_type_id: String,
) -> Result<bool, String> {
    delete_fasting_type_impl(state.inner(), fasting_type_id)
        .map_err(|error| state.command_error("delete_fasting_type", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn update_preferences(
    state: tauri::State<'_, AppState>,
    cycle_length: Option<u32>,
    period_length: Option<u32>,
    fasting_window_start: Option<String>,
    fasting_window_end: Option<String>,
    is_fasting_enabled: Option<bool>,
) -> Result<PreferencesResponse, String> {
    update_preferences_impl(
        state.inner(),
        cycle_length,
        period_length,
        fasting_window_start,
        fasting_window_end,
        is_fasting_enabled,
    )
    .map_err(|error| state.command_error("update_preferences", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_normalize_rules(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
) -> Result<Vec<FastingRule>, String> {
    editor_normalize_rules_impl(state.inner(), rules)
        .map_err(|error| state.command_error("editor_normalize_rules", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_add_rule(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
) -> Result<Vec<FastingRule>, String> {
    editor_add_rule_impl(state.inner(), rules)
        .map_err(|error| state.command_error("editor_add_rule", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_remove_rule(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
    index: usize,
) -> Result<Vec<FastingRule>, String> {
    editor_remove_rule_impl(state.inner(), rules, index)
        .map_err(|error| state.command_error("editor_remove_rule", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_set_rule_start(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
    index: usize,
    day: u32,
) -> Result<Vec<FastingRule>, String> {
    editor_set_rule_start_impl(state.inner(), rules, index, day)
        .map_err(|error| state.command_error("editor_set_rule_start", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_set_rule_end(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
    index: usize,
    day: u32,
) -> Result<Vec<FastingRule>, String> {
    editor_set_rule_end_impl(state.inner(), rules, index, day)
        .map_err(|error| state.command_error("editor_set_rule_end", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_set_rule_type(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
    index: usize,
    fasting_type: String,
) -> Result<Vec<FastingRule>, String> {
    editor_set_rule_type_impl(state.inner(), rules, index, fasting_type)
        .map_err(|error| state.command_error("editor_set_rule_type", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn editor_toggle_open_end(
    state: tauri::State<'_, AppState>,
    rules: Vec<FastingRule>,
    index: usize,
) -> Result<Vec<FastingRule>, String> {
    editor_toggle_open_end_impl(state.inner(), rules, index)
        .map_err(|error| state.command_error("editor_toggle_open_end", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn export_settings(state: tauri::State<'_, AppState>) -> Result<String, String> {
    export_settings_impl(state.inner())
        .map_err(|error| state.command_error("export_settings", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn import_settings(
    state: tauri::State<'_, AppState>,
    payload: String,
) -> Result<ImportSettingsResponse, String> {
    import_settings_impl(state.inner(), payload)
        .map_err(|error| state.command_error("import_settings", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn reset_settings(state: tauri::State<'_, AppState>) -> Result<(), String> {
    reset_settings_impl(state.inner())
        .map_err(|error| state.command_error("reset_settings", &error))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn seed_demo_history(
    state: tauri::State<'_, AppState>,
    months: Option<u32>,
) -> Result<LedgerResponse, String> {
    seed_demo_history_impl(state.inner(), months)
        .map_err(|error| state.command_error("seed_demo_history", &error))
}

#[cfg(feature = "desktop")]
pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            get_cycle_status,
            log_period_start,
            log_period_end,
            list_cycle_history,
            calendar_days,
            list_plans,
            select_plan,
            add_plan,
            update_plan,
            delete_plan,
            list_fasting_types,
            add_fasting_type,
            update_fasting_type,
            delete_fasting_type,
            update_preferences,
            editor_normalize_rules,
            editor_add_rule,
            editor_remove_rule,
            editor_set_rule_start,
            editor_set_rule_end,
            editor_set_rule_type,
            editor_toggle_open_end,
            export_settings,
            import_settings,
            reset_settings,
            seed_demo_history
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
