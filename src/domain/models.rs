use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const SETTINGS_SCHEMA: u8 = 1;
pub const DEFAULT_CYCLE_LENGTH: u32 = 28;
pub const DEFAULT_PERIOD_LENGTH: u32 = 5;
pub const DEFAULT_PLAN_ID: &str = "hormonal-harmony";
pub const DEFAULT_FASTING_WINDOW_START: &str = "20:00";
pub const DEFAULT_FASTING_WINDOW_END: &str = "12:00";

const HOURS_PER_DAY: u32 = 24;
const MINUTES_PER_DAY: u32 = 24 * 60;
const OPEN_END_TOKEN: &str = "END";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FastingTypeId {
    Standard,
    LimitHours,
    NoFasting,
    Custom(String),
}

impl FastingTypeId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard => "STANDARD",
            Self::LimitHours => "LIMIT_HOURS",
            Self::NoFasting => "NO_FASTING",
            Self::Custom(id) => id,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl From<String> for FastingTypeId {
    fn from(value: String) -> Self {
        match value.as_str() {
            "STANDARD" => Self::Standard,
            "LIMIT_HOURS" => Self::LimitHours,
            "NO_FASTING" => Self::NoFasting,
            _ => Self::Custom(value),
        }
    }
}

impl From<FastingTypeId> for String {
    fn from(value: FastingTypeId) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FastingTypeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A fasting interval anchored to day offsets inside a fasting type's window.
/// Day offset 0 is the first day of the window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FastingSlot {
    pub start_day_offset: u32,
    pub start_time: String,
    pub end_day_offset: u32,
    pub end_time: String,
}

impl FastingSlot {
    pub fn validate(&self) -> Result<(), String> {
        validate_hhmm(&self.start_time, "slot.start_time")?;
        validate_hhmm(&self.end_time, "slot.end_time")?;
        if self.end_minute_of_window() <= self.start_minute_of_window() {
            return Err("slot end must be after slot start".to_string());
        }
        Ok(())
    }

    pub fn start_minute_of_window(&self) -> u32 {
        minute_of_window(self.start_day_offset, &self.start_time)
    }

    pub fn end_minute_of_window(&self) -> u32 {
        minute_of_window(self.end_day_offset, &self.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FastingTypeDef {
    pub id: FastingTypeId,
    pub name: String,
    pub window_duration_hours: u32,
    pub slots: Vec<FastingSlot>,
    pub color: String,
    pub description: String,
    #[serde(default)]
    pub is_system: bool,
}

impl FastingTypeDef {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(self.id.as_str(), "fasting_type.id")?;
        validate_non_empty(&self.name, "fasting_type.name")?;
        if self.window_duration_hours == 0 || self.window_duration_hours % HOURS_PER_DAY != 0 {
            return Err(
                "fasting_type.window_duration_hours must be a positive multiple of 24".to_string(),
            );
        }
        for slot in &self.slots {
            slot.validate()?;
        }
        Ok(())
    }

    /// Number of calendar days one pass through the window spans.
    pub fn window_length_days(&self) -> u32 {
        self.window_duration_hours.div_ceil(HOURS_PER_DAY).max(1)
    }

    /// Granularity a plan rule referencing this type must keep its duration to.
    pub fn step_size(&self) -> u32 {
        ((self.window_duration_hours + HOURS_PER_DAY / 2) / HOURS_PER_DAY).max(1)
    }
}

/// Upper bound of a rule's day range: a concrete cycle day, or open-ended
/// through whatever cycle length is in effect when the plan is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEnd {
    Day(u32),
    Open,
}

impl RuleEnd {
    pub fn resolve(self, cycle_length: u32) -> u32 {
        match self {
            Self::Day(day) => day,
            Self::Open => cycle_length,
        }
    }
}

impl Serialize for RuleEnd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Day(day) => serializer.serialize_u32(*day),
            Self::Open => serializer.serialize_str(OPEN_END_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for RuleEnd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuleEndVisitor;

        impl Visitor<'_> for RuleEndVisitor {
            type Value = RuleEnd;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a day number or the string \"END\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RuleEnd, E> {
                u32::try_from(value)
                    .map(RuleEnd::Day)
                    .map_err(|_| E::custom("rule end day is out of range"))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RuleEnd, E> {
                u64::try_from(value)
                    .map_err(|_| E::custom("rule end day must not be negative"))
                    .and_then(|value| self.visit_u64(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RuleEnd, E> {
                if value == OPEN_END_TOKEN {
                    Ok(RuleEnd::Open)
                } else {
                    Err(E::custom(format!("unsupported rule end: {value}")))
                }
            }
        }

        deserializer.deserialize_any(RuleEndVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FastingRule {
    pub day_start: u32,
    pub day_end: RuleEnd,
    pub fasting_type: FastingTypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FastingRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.day_start == 0 {
            return Err("rule.day_start must be >= 1".to_string());
        }
        if let RuleEnd::Day(day) = self.day_end {
            if day < self.day_start {
                return Err("rule.day_end must be >= rule.day_start".to_string());
            }
        }
        Ok(())
    }

    pub fn contains(&self, cycle_day: u32, cycle_length: u32) -> bool {
        cycle_day >= self.day_start && cycle_day <= self.day_end.resolve(cycle_length)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules: Vec<FastingRule>,
}

impl Plan {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "plan.id")?;
        validate_non_empty(&self.name, "plan.name")?;
        if self.rules.is_empty() {
            return Err("plan.rules must not be empty".to_string());
        }
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate()?;
            if rule.day_end == RuleEnd::Open && index + 1 != self.rules.len() {
                return Err("only the last rule may be open-ended".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanSnapshot {
    pub id: String,
    pub name: String,
}

/// One observed period. The ledger keeps these newest-first, deduplicated by
/// start date and capped to the most recent entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleEntry {
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_snapshot: Option<PlanSnapshot>,
}

impl CycleEntry {
    /// Inclusive period duration in days, when the entry has ended.
    pub fn period_days(&self) -> Option<i64> {
        self.end_date
            .map(|end_date| (end_date - self.start_date).num_days() + 1)
    }
}

/// The single persisted aggregate every command reads and rewrites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSettings {
    #[serde(default = "default_schema")]
    pub schema: u8,
    #[serde(default = "default_cycle_length")]
    pub cycle_length: u32,
    #[serde(default = "default_period_length")]
    pub period_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_period_start: Option<NaiveDate>,
    #[serde(default)]
    pub cycle_history: Vec<CycleEntry>,
    #[serde(default = "default_selected_plan_id")]
    pub selected_plan_id: String,
    #[serde(default = "default_fasting_enabled")]
    pub is_fasting_enabled: bool,
    #[serde(default = "default_fasting_window_start")]
    pub fasting_window_start: String,
    #[serde(default = "default_fasting_window_end")]
    pub fasting_window_end: String,
    #[serde(default)]
    pub custom_plans: Vec<Plan>,
    #[serde(default)]
    pub custom_fasting_types: Vec<FastingTypeDef>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            schema: SETTINGS_SCHEMA,
            cycle_length: DEFAULT_CYCLE_LENGTH,
            period_length: DEFAULT_PERIOD_LENGTH,
            last_period_start: None,
            cycle_history: Vec::new(),
            selected_plan_id: DEFAULT_PLAN_ID.to_string(),
            is_fasting_enabled: true,
            fasting_window_start: DEFAULT_FASTING_WINDOW_START.to_string(),
            fasting_window_end: DEFAULT_FASTING_WINDOW_END.to_string(),
            custom_plans: Vec::new(),
            custom_fasting_types: Vec::new(),
        }
    }
}

impl UserSettings {
    /// Newest recorded period start, preferring the legacy mirror field and
    /// falling back to the ledger for imported documents that lack it.
    pub fn latest_period_start(&self) -> Option<NaiveDate> {
        self.last_period_start
            .or_else(|| self.cycle_history.first().map(|entry| entry.start_date))
    }

    pub fn find_plan(&self, plan_id: &str) -> Option<Plan> {
        if plan_id == DEFAULT_PLAN_ID {
            return Some(default_plan());
        }
        self.custom_plans
            .iter()
            .find(|plan| plan.id == plan_id)
            .cloned()
    }

    pub fn selected_plan(&self) -> Plan {
        self.find_plan(&self.selected_plan_id)
            .unwrap_or_else(default_plan)
    }

    /// User-defined definitions shadow the built-ins; a miss returns `None`
    /// and callers degrade to a generic rendering instead of failing.
    pub fn resolve_fasting_type(&self, id: &FastingTypeId) -> Option<FastingTypeDef> {
        self.custom_fasting_types
            .iter()
            .find(|def| &def.id == id)
            .cloned()
            .or_else(|| {
                built_in_fasting_types()
                    .into_iter()
                    .find(|def| &def.id == id)
            })
    }
}

pub fn built_in_fasting_types() -> Vec<FastingTypeDef> {
    vec![
        FastingTypeDef {
            id: FastingTypeId::Standard,
            name: "Standard (16:8)".to_string(),
            window_duration_hours: 24,
            slots: vec![FastingSlot {
                start_day_offset: 0,
                start_time: "20:00".to_string(),
                end_day_offset: 1,
                end_time: "12:00".to_string(),
            }],
            color: "#9b6bd3".to_string(),
            description: "Fasting from 20:00 to 12:00 next day.".to_string(),
            is_system: true,
        },
        FastingTypeDef {
            id: FastingTypeId::LimitHours,
            name: "Gentle Limit (12:12)".to_string(),
            window_duration_hours: 24,
            slots: vec![FastingSlot {
                start_day_offset: 0,
                start_time: "20:00".to_string(),
                end_day_offset: 1,
                end_time: "08:00".to_string(),
            }],
            color: "#5b5b6e".to_string(),
            description: "Fasting from 20:00 to 08:00 next day.".to_string(),
            is_system: true,
        },
        FastingTypeDef {
            id: FastingTypeId::NoFasting,
            name: "No Fasting".to_string(),
            window_duration_hours: 24,
            slots: Vec::new(),
            color: "#58b48c".to_string(),
            description: "No scheduled fasting.".to_string(),
            is_system: true,
        },
    ]
}

pub fn default_plan() -> Plan {
    Plan {
        id: DEFAULT_PLAN_ID.to_string(),
        name: "Hormonal Harmony".to_string(),
        description: "Aligns fasting intensity with your menstrual cycle hormones.".to_string(),
        rules: vec![
            FastingRule {
                day_start: 1,
                day_end: RuleEnd::Day(10),
                fasting_type: FastingTypeId::Standard,
                description: Some(
                    "Follicular Phase: High resilience. Standard fasting allowed.".to_string(),
                ),
            },
            FastingRule {
                day_start: 11,
                day_end: RuleEnd::Day(15),
                fasting_type: FastingTypeId::LimitHours,
                description: Some("Ovulation: Limit fasting stress.".to_string()),
            },
            FastingRule {
                day_start: 16,
                day_end: RuleEnd::Day(19),
                fasting_type: FastingTypeId::Standard,
                description: Some(
                    "Early Luteal: Resilience returns. Standard fasting allowed.".to_string(),
                ),
            },
            FastingRule {
                day_start: 20,
                day_end: RuleEnd::Open,
                fasting_type: FastingTypeId::NoFasting,
                description: Some(
                    "Late Luteal: Prepare for menstruation. No fasting recommended.".to_string(),
                ),
            },
        ],
    }
}

fn default_schema() -> u8 {
    SETTINGS_SCHEMA
}

fn default_cycle_length() -> u32 {
    DEFAULT_CYCLE_LENGTH
}

fn default_period_length() -> u32 {
    DEFAULT_PERIOD_LENGTH
}

fn default_selected_plan_id() -> String {
    DEFAULT_PLAN_ID.to_string()
}

fn default_fasting_enabled() -> bool {
    true
}

fn default_fasting_window_start() -> String {
    DEFAULT_FASTING_WINDOW_START.to_string()
}

fn default_fasting_window_end() -> String {
    DEFAULT_FASTING_WINDOW_END.to_string()
}

fn minute_of_window(day_offset: u32, time: &str) -> u32 {
    let minutes = parse_hhmm(time)
        .map(|value| value.hour() * 60 + value.minute())
        .unwrap_or(0);
    day_offset * MINUTES_PER_DAY + minutes
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}
