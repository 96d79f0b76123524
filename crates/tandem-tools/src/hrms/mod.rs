//! HRMS action tools: leave requests, leave balance, manual attendance,
//! employee profile lookups and the admin approve/cancel flows against the
//! corporate HRMS HTTP API.
//!
//! Self-service tools resolve the target employee the same way: an explicit
//! `employee_id` argument wins, then the actor context of the current turn,
//! then a configured fallback id. Admin tools instead locate the employee by
//! name, and report lookup ambiguity as user-facing text.

pub mod attendance;
pub mod client;
pub mod employee;
pub mod leave;

pub use attendance::{ApplyAttendanceTool, ApproveAttendanceForEmployeeTool};
pub use client::{HrmsClient, HrmsConfig};
pub use employee::EmployeeInfoTool;
pub use leave::{
    ApplyLeaveForEmployeeTool, ApplyLeaveTool, CancelLeaveForEmployeeTool, LeaveBalanceTool,
};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tandem_types::ActorContext;

/// Picks the employee id for a tool invocation. Falls back to the configured
/// default when neither the arguments nor the actor context carry one.
pub(crate) fn resolve_employee_id(
    args: &Value,
    actor: Option<&ActorContext>,
    default_id: i64,
) -> i64 {
    if let Some(id) = args.get("employee_id").and_then(Value::as_i64) {
        return id;
    }
    if let Some(actor) = actor {
        return actor.actor_id;
    }
    tracing::warn!(employee_id = default_id, "no actor context, using default employee id");
    default_id
}

/// Unwraps list payloads that arrive either as a bare array or wrapped in an
/// envelope object under one of several keys.
pub(crate) fn json_list(data: &Value, keys: &[&str]) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Object(map) => keys
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Takes the date part of an ISO date or datetime string,
/// "2026-01-12T00:00:00" -> "2026-01-12".
pub(crate) fn date_part(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.split_once('T') {
        Some((date, _)) => date,
        None => raw.get(..10).unwrap_or(raw),
    }
}

/// Looks up an employee by (partial) name. Returns `Ok(Ok(...))` on a unique
/// match, `Ok(Err(text))` when the search resolved to user-facing text.
pub(crate) async fn search_employee_by_name(
    client: &HrmsClient,
    name: &str,
) -> Result<std::result::Result<(i64, String), String>> {
    let (status, body) = client
        .get("/api/HRMS/Employee/Info/GetEmployeeServiceData", &[])
        .await?;
    if !status.is_success() {
        bail!("employee lookup failed with HTTP {status}");
    }
    let data: Value = serde_json::from_str(&body).context("employee lookup returned invalid JSON")?;
    let employees = json_list(&data, &["data", "employees", "result", "items"]);

    let needle = name.trim().to_lowercase();
    let mut matches: Vec<(i64, String)> = Vec::new();
    for emp in &employees {
        let emp_name = emp
            .get("employeeName")
            .or_else(|| emp.get("name"))
            .or_else(|| emp.get("fullName"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if emp_name.is_empty() {
            continue;
        }
        let haystack = emp_name.to_lowercase();
        if haystack.contains(&needle) || needle.contains(&haystack) {
            if let Some(id) = emp
                .get("employeeId")
                .or_else(|| emp.get("id"))
                .and_then(Value::as_i64)
            {
                matches.push((id, emp_name.to_string()));
            }
        }
    }

    match matches.len() {
        0 => Ok(Err(format!("No employee found matching '{name}'."))),
        1 => Ok(Ok(matches.remove(0))),
        _ => {
            let names: Vec<&str> = matches.iter().take(5).map(|(_, n)| n.as_str()).collect();
            Ok(Err(format!(
                "Multiple employees found matching '{name}'. Please provide a more specific name. Matches: {}",
                names.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_argument_wins_over_actor() {
        let actor = ActorContext::new(42, "Ana");
        let id = resolve_employee_id(&json!({"employee_id": 7}), Some(&actor), 335);
        assert_eq!(id, 7);
    }

    #[test]
    fn actor_context_wins_over_default() {
        let actor = ActorContext::new(42, "Ana");
        let id = resolve_employee_id(&json!({}), Some(&actor), 335);
        assert_eq!(id, 42);
    }

    #[test]
    fn falls_back_to_default() {
        let id = resolve_employee_id(&json!({}), None, 335);
        assert_eq!(id, 335);
    }

    #[test]
    fn list_payloads_unwrap_with_and_without_envelope() {
        let bare = json!([{"a": 1}]);
        assert_eq!(json_list(&bare, &["data"]).len(), 1);

        let wrapped = json!({"result": [{"a": 1}, {"a": 2}]});
        assert_eq!(json_list(&wrapped, &["data", "result"]).len(), 2);

        assert!(json_list(&json!("nope"), &["data"]).is_empty());
    }

    #[test]
    fn date_part_strips_time_component() {
        assert_eq!(date_part("2026-01-12T00:00:00"), "2026-01-12");
        assert_eq!(date_part("2026-01-12"), "2026-01-12");
        assert_eq!(date_part(""), "");
    }
}
