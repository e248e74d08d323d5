use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

/// Condition type reported on every SpringBoot
pub const READY_CONDITION: &str = "Ready";

/// Builds a condition stamped with the current time.
///
/// `status` maps onto the Kubernetes `"True"`/`"False"` strings.
pub fn condition(
    type_: &str,
    status: bool,
    reason: &str,
    message: impl Into<String>,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

/// Merges `new_condition` into `conditions`, returning the new list and whether anything changed.
///
/// An existing condition of the same type keeps its `last_transition_time` unless its status flips.
pub fn set_status_condition(conditions: &[Condition], new_condition: Condition) -> (Vec<Condition>, bool) {
    let mut merged = conditions.to_vec();

    let index = match merged.iter().position(|c| c.type_ == new_condition.type_) {
        Some(index) => index,
        None => {
            merged.push(new_condition);
            return (merged, true);
        }
    };
    let existing = &mut merged[index];

    let changed = existing.status != new_condition.status
        || existing.reason != new_condition.reason
        || existing.message != new_condition.message
        || existing.observed_generation != new_condition.observed_generation;

    if existing.status != new_condition.status {
        existing.last_transition_time = new_condition.last_transition_time;
    }
    existing.status = new_condition.status;
    existing.reason = new_condition.reason;
    existing.message = new_condition.message;
    existing.observed_generation = new_condition.observed_generation;

    (merged, changed)
}

/// Finds the condition_type in conditions.
pub fn find_status_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == condition_type)
}

/// Returns true when the condition_type is present and set to `True`
pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type).is_some_and(|c| c.status == "True")
}
