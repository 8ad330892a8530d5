use crate::application::cycle_tracker::current_cycle_day;
use crate::domain::models::{
    FastingRule, FastingSlot, FastingTypeDef, FastingTypeId, UserSettings,
};
use chrono::NaiveDate;
use serde::Serialize;

pub const NO_SCHEDULED_FASTING: &str = "No scheduled fasting.";

/// First rule whose range contains the cycle day. Normalization keeps plan
/// ranges non-overlapping, but imported plans may not be; first match wins.
pub fn active_rule<'a>(
    rules: &'a [FastingRule],
    cycle_day: u32,
    cycle_length: u32,
) -> Option<&'a FastingRule> {
    rules
        .iter()
        .find(|rule| rule.contains(cycle_day, cycle_length))
}

/// Where today falls inside a rule's recurring fasting window, plus the
/// rendered fasting intervals.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotProjection {
    pub window_length_days: u32,
    pub window_day_index: u32,
    pub slot_descriptions: Vec<String>,
}

pub fn project_slots(def: &FastingTypeDef, cycle_day: u32, rule_day_start: u32) -> SlotProjection {
    let window_length_days = def.window_length_days();
    let days_into_rule = cycle_day.saturating_sub(rule_day_start);
    let window_day_index = days_into_rule % window_length_days;

    let slot_descriptions = if def.slots.is_empty() {
        vec![NO_SCHEDULED_FASTING.to_string()]
    } else {
        def.slots
            .iter()
            .map(|slot| describe_slot(slot, window_length_days))
            .collect()
    };

    SlotProjection {
        window_length_days,
        window_day_index,
        slot_descriptions,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Advice {
    pub title: String,
    pub text: String,
}

/// Display guidance for the active rule. Custom types and stale references
/// both land on the generic "Flow" rendering instead of an error.
pub fn advice_for(
    rule: &FastingRule,
    def: Option<&FastingTypeDef>,
    settings: &UserSettings,
) -> Advice {
    match &rule.fasting_type {
        FastingTypeId::NoFasting => Advice {
            title: "Nourish".to_string(),
            text: "Focus on nutrient-dense foods. No fasting recommended.".to_string(),
        },
        FastingTypeId::LimitHours => Advice {
            title: "Gentle Fast".to_string(),
            text: "Keep the fast gentle: 12 hours overnight at most.".to_string(),
        },
        FastingTypeId::Standard => Advice {
            title: "Power Fast".to_string(),
            text: format!(
                "Standard fasting window: stop eating at {}, eat again at {}.",
                settings.fasting_window_start, settings.fasting_window_end
            ),
        },
        FastingTypeId::Custom(_) => Advice {
            title: "Flow".to_string(),
            text: def
                .map(|def| def.description.clone())
                .or_else(|| rule.description.clone())
                .unwrap_or_default(),
        },
    }
}

/// How one calendar date renders in the month grid.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDayInfo {
    pub date: NaiveDate,
    pub cycle_day: u32,
    pub is_period: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fasting_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub no_fasting: bool,
}

/// Project the selected plan onto an arbitrary date. `None` until a period
/// has been logged.
pub fn calendar_day_info(settings: &UserSettings, date: NaiveDate) -> Option<CalendarDayInfo> {
    let last_start = settings.latest_period_start()?;
    let cycle_day = current_cycle_day(date, last_start, settings.cycle_length);
    let plan = settings.selected_plan();
    let rule = active_rule(&plan.rules, cycle_day, settings.cycle_length);
    let def = rule.and_then(|rule| settings.resolve_fasting_type(&rule.fasting_type));

    Some(CalendarDayInfo {
        date,
        cycle_day,
        is_period: cycle_day <= settings.period_length,
        fasting_type_id: rule.map(|rule| rule.fasting_type.as_str().to_string()),
        color: def.map(|def| def.color),
        no_fasting: rule
            .map(|rule| rule.fasting_type == FastingTypeId::NoFasting)
            .unwrap_or(false),
    })
}

fn describe_slot(slot: &FastingSlot, window_length_days: u32) -> String {
    if window_length_days > 1 {
        format!(
            "Day {} {} to Day {} {}",
            slot.start_day_offset + 1,
            slot.start_time,
            slot.end_day_offset + 1,
            slot.end_time
        )
    } else {
        format!("{} to {}", slot.start_time, slot.end_time)
    }
}
