use crate::domain::models::{SETTINGS_SCHEMA, UserSettings};
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_JSON: &str = "settings.json";

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_JSON)
}

pub fn ensure_default_settings(data_dir: &Path) -> Result<(), InfraError> {
    let path = settings_path(data_dir);
    if !path.exists() {
        write_settings_file(&path, &UserSettings::default())?;
    }
    Ok(())
}

pub fn load_settings(data_dir: &Path) -> Result<UserSettings, InfraError> {
    let path = settings_path(data_dir);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            InfraError::InvalidInput(format!("missing schema in {}", path.display()))
        })?;
    if schema != u64::from(SETTINGS_SCHEMA) {
        return Err(InfraError::InvalidInput(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(serde_json::from_value(parsed)?)
}

pub fn save_settings(data_dir: &Path, settings: &UserSettings) -> Result<(), InfraError> {
    write_settings_file(&settings_path(data_dir), settings)
}

pub fn export_document(settings: &UserSettings) -> Result<String, InfraError> {
    Ok(serde_json::to_string_pretty(settings)?)
}

/// Minimal shape check before an import replaces the whole aggregate: the
/// document must at least carry a numeric cycle length and a history array.
pub fn parse_import_payload(payload: &str) -> Result<UserSettings, InfraError> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if !value
        .get("cycle_length")
        .map(serde_json::Value::is_number)
        .unwrap_or(false)
    {
        return Err(InfraError::InvalidInput(
            "import document must carry a numeric cycle_length".to_string(),
        ));
    }
    if !value
        .get("cycle_history")
        .map(serde_json::Value::is_array)
        .unwrap_or(false)
    {
        return Err(InfraError::InvalidInput(
            "import document must carry a cycle_history array".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

fn write_settings_file(path: &Path, settings: &UserSettings) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(settings)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempDataDir {
        path: PathBuf,
    }

    impl TempDataDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "fasting-cycles-store-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp data dir");
            Self { path }
        }
    }

    impl Drop for TempDataDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn ensure_writes_defaults_once() {
        let dir = TempDataDir::new();
        ensure_default_settings(&dir.path).expect("ensure defaults");
        let loaded = load_settings(&dir.path).expect("load defaults");
        assert_eq!(loaded, UserSettings::default());

        let mut changed = loaded;
        changed.cycle_length = 31;
        save_settings(&dir.path, &changed).expect("save changed");
        ensure_default_settings(&dir.path).expect("ensure again");
        let reloaded = load_settings(&dir.path).expect("reload");
        assert_eq!(reloaded.cycle_length, 31);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDataDir::new();
        let mut settings = UserSettings::default();
        settings.last_period_start =
            Some(NaiveDate::parse_from_str("2024-03-01", "%Y-%m-%d").expect("valid date"));
        save_settings(&dir.path, &settings).expect("save");
        let loaded = load_settings(&dir.path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_rejects_unsupported_schema() {
        let dir = TempDataDir::new();
        fs::write(
            settings_path(&dir.path),
            "{\"schema\": 9, \"cycle_length\": 28}\n",
        )
        .expect("write file");
        assert!(load_settings(&dir.path).is_err());
    }

    #[test]
    fn import_payload_requires_shape() {
        assert!(parse_import_payload("{}").is_err());
        assert!(parse_import_payload("{\"cycle_length\": 28}").is_err());
        assert!(parse_import_payload("{\"cycle_length\": \"28\", \"cycle_history\": []}").is_err());

        let imported = parse_import_payload("{\"cycle_length\": 30, \"cycle_history\": []}")
            .expect("minimal import");
        assert_eq!(imported.cycle_length, 30);
        assert!(imported.cycle_history.is_empty());
    }

    #[test]
    fn export_then_import_is_identity() {
        let mut settings = UserSettings::default();
        settings.cycle_length = 29;
        settings.selected_plan_id = "custom-1".to_string();
        let document = export_document(&settings).expect("export");
        let imported = parse_import_payload(&document).expect("import");
        assert_eq!(imported, settings);
    }
}
