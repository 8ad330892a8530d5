use crate::domain::models::{FastingRule, FastingTypeId, RuleEnd, UserSettings};
use crate::infrastructure::error::InfraError;

/// Canonical cycle length used as the editing canvas. Stored plans still
/// apply to whatever cycle length is active at evaluation time through the
/// open-ended terminal rule.
pub const EDIT_HORIZON_DAYS: u32 = 28;

const DEFAULT_NEW_RULE_SPAN: u32 = 5;

pub fn step_size(settings: &UserSettings, fasting_type: &FastingTypeId) -> u32 {
    settings
        .resolve_fasting_type(fasting_type)
        .map(|def| def.step_size())
        .unwrap_or(1)
}

/// Rebuild a draft rule list into a valid one: starts are derived (the first
/// rule is pinned to day 1, every later rule starts right after its
/// predecessor), ends are clamped into the horizon while reserving one day
/// for each remaining rule, and every concrete duration is snapped to the
/// nearest positive multiple of its type's step size. Only the terminal rule
/// keeps an open end; open ends earlier in the list are repaired to concrete
/// days. Running the pass twice yields the same list as running it once.
pub fn normalize_rules(
    rules: &[FastingRule],
    settings: &UserSettings,
    horizon: u32,
) -> Vec<FastingRule> {
    let horizon = horizon.max(1);
    let count = rules.len();
    let mut normalized = Vec::with_capacity(count);
    let mut next_start = 1u32;

    for (index, rule) in rules.iter().enumerate() {
        let day_start = next_start;
        let is_last = index + 1 == count;

        if is_last && rule.day_end == RuleEnd::Open {
            let mut kept = rule.clone();
            kept.day_start = day_start;
            normalized.push(kept);
            break;
        }

        let step = step_size(settings, &rule.fasting_type);
        let remaining = (count - index - 1) as u32;
        let max_end = horizon.saturating_sub(remaining).max(day_start);
        let requested_end = match rule.day_end {
            RuleEnd::Day(day) => day,
            RuleEnd::Open => horizon,
        };

        let clamped_end = requested_end.clamp(day_start, max_end);
        let mut duration = snap_duration(clamped_end - day_start + 1, step);
        // Snapping to the nearest multiple can overrun the reservation; step
        // back down to the minimum of one step.
        while duration > step && day_start + duration - 1 > max_end {
            duration -= step;
        }

        let day_end = day_start + duration - 1;
        normalized.push(FastingRule {
            day_start,
            day_end: RuleEnd::Day(day_end),
            fasting_type: rule.fasting_type.clone(),
            description: rule.description.clone(),
        });
        next_start = day_end + 1;
    }

    normalized
}

/// Nearest positive multiple of `step`, never below one step.
pub fn snap_duration(duration: u32, step: u32) -> u32 {
    let step = step.max(1);
    ((duration + step / 2) / step).max(1) * step
}

/// Append a default rule right after the last one. When the horizon is full,
/// a prior rule with more than one step of slack donates exactly one step;
/// otherwise the add fails without touching the draft.
pub fn add_rule(
    rules: &[FastingRule],
    settings: &UserSettings,
    horizon: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    let horizon = horizon.max(1);
    let mut updated = normalize_rules(rules, settings, horizon);

    let Some(last) = updated.last_mut() else {
        let first = default_rule(1, DEFAULT_NEW_RULE_SPAN.min(horizon));
        return Ok(normalize_rules(&[first], settings, horizon));
    };

    let last_end = last.day_end.resolve(horizon);
    if last_end < horizon {
        let day_start = last_end + 1;
        let day_end = (day_start + DEFAULT_NEW_RULE_SPAN - 1).min(horizon);
        updated.push(default_rule(day_start, day_end));
        return Ok(normalize_rules(&updated, settings, horizon));
    }

    let step = step_size(settings, &last.fasting_type);
    let span = last_end + 1 - last.day_start;
    if span <= step {
        return Err(InfraError::NoRoomForRule);
    }

    // Shrinking an open-ended terminal rule makes its end concrete; the new
    // rule becomes the terminal range.
    let shrunk_end = last_end - step;
    last.day_end = RuleEnd::Day(shrunk_end);
    updated.push(default_rule(shrunk_end + 1, horizon));
    Ok(normalize_rules(&updated, settings, horizon))
}

pub fn remove_rule(
    rules: &[FastingRule],
    index: usize,
    settings: &UserSettings,
    horizon: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    if index >= rules.len() {
        return Err(rule_index_error(index));
    }
    let mut updated = rules.to_vec();
    updated.remove(index);
    Ok(normalize_rules(&updated, settings, horizon))
}

/// Starts are derived, so editing one is really editing the end of the rule
/// before it. The first rule is pinned to day 1.
pub fn set_rule_start(
    rules: &[FastingRule],
    index: usize,
    day: u32,
    settings: &UserSettings,
    horizon: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    if index >= rules.len() {
        return Err(rule_index_error(index));
    }
    if index == 0 {
        return Err(InfraError::InvalidInput(
            "the first rule always starts on day 1".to_string(),
        ));
    }
    set_rule_end(rules, index - 1, day.max(2) - 1, settings, horizon)
}

pub fn set_rule_end(
    rules: &[FastingRule],
    index: usize,
    day: u32,
    settings: &UserSettings,
    horizon: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    if index >= rules.len() {
        return Err(rule_index_error(index));
    }
    let mut updated = rules.to_vec();
    updated[index].day_end = RuleEnd::Day(day.max(1));
    Ok(normalize_rules(&updated, settings, horizon))
}

pub fn set_rule_type(
    rules: &[FastingRule],
    index: usize,
    fasting_type: FastingTypeId,
    settings: &UserSettings,
    horizon: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    if index >= rules.len() {
        return Err(rule_index_error(index));
    }
    let mut updated = rules.to_vec();
    updated[index].fasting_type = fasting_type;
    Ok(normalize_rules(&updated, settings, horizon))
}

/// Switch the terminal rule between an open end and a concrete one. The
/// horizon's last day stands in as the placeholder while the sentinel is off.
pub fn toggle_open_end(
    rules: &[FastingRule],
    index: usize,
    settings: &UserSettings,
    horizon: u32,
) -> Result<Vec<FastingRule>, InfraError> {
    if index >= rules.len() {
        return Err(rule_index_error(index));
    }
    if index + 1 != rules.len() {
        return Err(InfraError::InvalidInput(
            "only the last rule can run to the end of the cycle".to_string(),
        ));
    }
    let horizon = horizon.max(1);
    let mut updated = rules.to_vec();
    updated[index].day_end = match updated[index].day_end {
        RuleEnd::Open => RuleEnd::Day(horizon),
        RuleEnd::Day(_) => RuleEnd::Open,
    };
    Ok(normalize_rules(&updated, settings, horizon))
}

fn default_rule(day_start: u32, day_end: u32) -> FastingRule {
    FastingRule {
        day_start,
        day_end: RuleEnd::Day(day_end.max(day_start)),
        fasting_type: FastingTypeId::Standard,
        description: None,
    }
}

fn rule_index_error(index: usize) -> InfraError {
    InfraError::InvalidInput(format!("no rule at index {index}"))
}
