use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tandem_types::ActorContext;

use super::client::HrmsClient;
use super::{date_part, json_list, resolve_employee_id, search_employee_by_name};
use crate::registry::{ToolHandler, ToolSpec};

/// Normalizes a user-supplied time ("9:00 AM", "17:30") to HH:MM.
fn format_time(raw: &str) -> Result<String> {
    let raw = raw.trim();
    for fmt in ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p", "%I %p", "%I%p"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Ok(t.format("%H:%M").to_string());
        }
    }
    anyhow::bail!("invalid time '{raw}', expected e.g. '09:00' or '9:00 AM'")
}

/// Maps free-form time-request wording to the API's canonical labels.
fn normalize_time_label(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "both" | "both times" | "all" => Some("Both"),
        "in-time" | "in time" | "intime" | "in" | "entry" => Some("In-Time"),
        "out-time" | "out time" | "outtime" | "out" | "exit" => Some("Out-Time"),
        _ => None,
    }
}

/// Which timestamps the manual attendance request corrects.
fn normalize_time_request_for(raw: Option<&str>, in_time: bool, out_time: bool) -> Option<String> {
    if let Some(label) = raw.and_then(normalize_time_label) {
        return Some(label.to_string());
    }
    match (in_time, out_time) {
        (true, true) => Some("Both".to_string()),
        (true, false) => Some("In-Time".to_string()),
        (false, true) => Some("Out-Time".to_string()),
        (false, false) => None,
    }
}

/// Files a manual attendance correction for a day the badge system missed.
pub struct ApplyAttendanceTool {
    client: Arc<HrmsClient>,
}

impl ApplyAttendanceTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for ApplyAttendanceTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "apply_attendance",
            "Apply for manual attendance for the current user, correcting a missed in-time \
             or out-time. Use this when the user could not badge in or out and asks to fix \
             their attendance record.",
            json!({
                "type": "object",
                "properties": {
                    "attendance_date": {
                        "type": "string",
                        "description": "Attendance date in YYYY-MM-DD format"
                    },
                    "in_time": {
                        "type": "string",
                        "description": "In-time, e.g. '09:00' or '9:00 AM'"
                    },
                    "out_time": {
                        "type": "string",
                        "description": "Out-time, e.g. '18:00' or '6:00 PM'"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Reason for the manual attendance request"
                    },
                    "time_request_for": {
                        "type": "string",
                        "description": "Which times to correct: In-Time, Out-Time or Both. \
                                        Inferred from the provided times when omitted."
                    }
                },
                "required": ["attendance_date", "reason"]
            }),
        )
    }

    async fn call(&self, args: Value, actor: Option<&ActorContext>) -> Result<String> {
        let reason = args
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(reason) = reason else {
            return Ok(
                "Reason is required for manual attendance application. Please provide a \
                 reason, for example 'could not reach office in time'."
                    .to_string(),
            );
        };

        let date_raw = args
            .get("attendance_date")
            .and_then(Value::as_str)
            .context("attendance_date is required")?;
        let date = NaiveDate::parse_from_str(date_raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date '{date_raw}', expected YYYY-MM-DD"))?;

        let in_time = match args.get("in_time").and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => Some(format_time(t)?),
            _ => None,
        };
        let out_time = match args.get("out_time").and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => Some(format_time(t)?),
            _ => None,
        };

        let Some(time_request_for) = normalize_time_request_for(
            args.get("time_request_for").and_then(Value::as_str),
            in_time.is_some(),
            out_time.is_some(),
        ) else {
            return Ok(
                "At least one time (in-time or out-time) must be provided for manual \
                 attendance application."
                    .to_string(),
            );
        };
        if (time_request_for == "Both" || time_request_for == "In-Time") && in_time.is_none() {
            return Ok(format!(
                "In-time is required when the request is for '{time_request_for}'. Please provide the in-time."
            ));
        }
        if (time_request_for == "Both" || time_request_for == "Out-Time") && out_time.is_none() {
            return Ok(format!(
                "Out-time is required when the request is for '{time_request_for}'. Please provide the out-time."
            ));
        }

        let employee_id =
            resolve_employee_id(&args, actor, self.client.default_employee_id());
        tracing::info!(
            employee_id,
            date = %date,
            time_request_for = %time_request_for,
            "submitting manual attendance request"
        );

        let body = json!({
            "manualAttendanceId": 0,
            "manualAttendanceCode": "",
            "employeeId": employee_id,
            "departmentId": 0,
            "sectionId": 0,
            "unitId": 0,
            "attendanceDate": date.format("%Y-%m-%d").to_string(),
            "timeRequestFor": time_request_for,
            "inTime": in_time,
            "outTime": out_time,
            "stateStatus": "",
            "reason": reason,
            "remarks": "",
            "attendanceType": "Official Instruction",
        });

        let (status, text) = self
            .client
            .post_json("/api/hrms/Attendance/ManualAttendance/SaveManualAttendance", &body)
            .await?;
        if !status.is_success() {
            return Ok(format!(
                "Manual attendance request failed. HTTP {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            ));
        }

        let result: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let accepted = result.get("status").and_then(Value::as_bool).unwrap_or(true);
        if accepted {
            let mut lines = vec![
                "Manual attendance request submitted successfully.".to_string(),
                format!("Date: {date}"),
            ];
            if let Some(t) = &in_time {
                lines.push(format!("In-time: {t}"));
            }
            if let Some(t) = &out_time {
                lines.push(format!("Out-time: {t}"));
            }
            lines.push(format!("Reason: {reason}"));
            Ok(lines.join("\n"))
        } else {
            let msg = result
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("the HRMS system rejected the request");
            Ok(format!("Manual attendance request was not accepted: {msg}"))
        }
    }
}

/// Picks the manual attendance request matching `date` and the requested
/// time label. Returns `Err(text)` for the zero- and multiple-match cases.
fn find_attendance_request(
    requests: &[Value],
    date: NaiveDate,
    time_label: &str,
) -> std::result::Result<i64, String> {
    let mut matches: Vec<i64> = Vec::new();
    for req in requests {
        let req_date = req
            .get("attendanceDate")
            .or_else(|| req.get("AttendanceDate"))
            .and_then(Value::as_str)
            .map(date_part)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let req_label = req
            .get("timeRequestFor")
            .or_else(|| req.get("TimeRequestFor"))
            .and_then(Value::as_str)
            .map(|l| normalize_time_label(l).unwrap_or(l));
        let id = req
            .get("manualAttendanceId")
            .or_else(|| req.get("ManualAttendanceId"))
            .and_then(Value::as_i64);
        if let (Some(req_date), Some(req_label), Some(id)) = (req_date, req_label, id) {
            if req_date == date && req_label == time_label {
                matches.push(id);
            }
        }
    }

    match matches.len() {
        0 => Err(format!(
            "No attendance request found for {date} ({time_label})."
        )),
        1 => Ok(matches[0]),
        _ => {
            let ids: Vec<String> = matches.iter().take(5).map(i64::to_string).collect();
            Err(format!(
                "Multiple attendance requests found for {date} ({time_label}). Please provide \
                 more specific information. Request IDs: {}",
                ids.join(", ")
            ))
        }
    }
}

/// Approves a pending manual attendance request for another employee,
/// resolved by name and matched by date and time-request type. Intended for
/// managers and HR admins.
pub struct ApproveAttendanceForEmployeeTool {
    client: Arc<HrmsClient>,
}

impl ApproveAttendanceForEmployeeTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for ApproveAttendanceForEmployeeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "approve_attendance_for_employee",
            "Approve a pending manual attendance request for another employee, found by name \
             and matched by the attendance date and time request type. Use this when an HR \
             admin or manager asks to approve someone's attendance request.",
            json!({
                "type": "object",
                "properties": {
                    "employee_name": {
                        "type": "string",
                        "description": "Name of the employee whose request should be approved"
                    },
                    "applied_date": {
                        "type": "string",
                        "description": "Attendance date of the request, in YYYY-MM-DD format"
                    },
                    "requested_time": {
                        "type": "string",
                        "description": "Time request type: In-Time, Out-Time or Both"
                    },
                    "remarks": {
                        "type": "string",
                        "description": "Approval remarks, defaults to 'Approved'"
                    }
                },
                "required": ["employee_name", "applied_date", "requested_time"]
            }),
        )
    }

    async fn call(&self, args: Value, _actor: Option<&ActorContext>) -> Result<String> {
        let name = args
            .get("employee_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("employee_name is required")?;
        let date_raw = args
            .get("applied_date")
            .and_then(Value::as_str)
            .context("applied_date is required")?;
        let date = NaiveDate::parse_from_str(date_raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date '{date_raw}', expected YYYY-MM-DD"))?;
        let requested = args
            .get("requested_time")
            .and_then(Value::as_str)
            .context("requested_time is required")?;
        let Some(time_label) = normalize_time_label(requested) else {
            return Ok(format!(
                "Unrecognized time request type '{requested}'. Expected In-Time, Out-Time or Both."
            ));
        };
        let remarks = args
            .get("remarks")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Approved");

        let (employee_id, employee_name) =
            match search_employee_by_name(&self.client, name).await? {
                Ok(found) => found,
                Err(text) => return Ok(text),
            };
        tracing::info!(
            employee_id,
            employee_name = %employee_name,
            date = %date,
            time_label,
            "approving manual attendance request"
        );

        let (status, body) = self
            .client
            .get(
                "/api/hrms/Attendance/ManualAttendance/GetEmployeeManualAttendances",
                &[
                    ("employeeId", employee_id.to_string()),
                    ("pageSize", "15".to_string()),
                    ("pageNumber", "1".to_string()),
                ],
            )
            .await?;
        if !status.is_success() {
            return Ok(format!("Failed to retrieve attendance requests. HTTP {status}"));
        }
        let data: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let requests = json_list(&data, &["data", "result", "items", "list"]);
        if requests.is_empty() {
            return Ok(format!(
                "No pending attendance requests found for {employee_name}."
            ));
        }

        let request_id = match find_attendance_request(&requests, date, time_label) {
            Ok(id) => id,
            Err(text) => return Ok(format!("{text} (employee: {employee_name})")),
        };

        let (status, body) = self
            .client
            .post_json(
                "/api/hrms/Attendance/ManualAttendance/ApprovalRequest",
                &json!({
                    "manualAttendanceId": request_id,
                    "remarks": remarks,
                    "stateStatus": "Approved",
                }),
            )
            .await?;
        if !status.is_success() {
            return Ok(format!(
                "Failed to approve the attendance request. HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
        }
        let result: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let accepted = result.get("status").and_then(Value::as_bool).unwrap_or(false);
        if !accepted {
            let msg = result
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("the HRMS system rejected the approval");
            return Ok(format!("Attendance approval failed: {msg}"));
        }

        // Notification email failures don't undo the approval.
        let email = self
            .client
            .post_json("/api/hrms/Attendance/ManualAttendance/SendEmail", &result)
            .await;
        if let Err(err) = email {
            tracing::warn!(error = %err, "attendance approval email failed");
        }

        let mut lines = vec![
            format!("Attendance approved successfully for {employee_name}."),
            format!("Date: {date}"),
            format!("Time request: {time_label}"),
            format!("Remarks: {remarks}"),
        ];
        if let Some(msg) = result.get("msg").and_then(Value::as_str).filter(|m| !m.is_empty()) {
            lines.push(format!("Message: {msg}"));
        }
        Ok(lines.join("\n"))
    }
}
