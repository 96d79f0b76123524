use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tandem_types::ActorContext;

use super::client::HrmsClient;
use super::{date_part, json_list, resolve_employee_id, search_employee_by_name};
use crate::registry::{ToolHandler, ToolSpec};

const DEFAULT_LEAVE_TYPE_ID: i64 = 2;

/// Upper bound on a single leave application. The value is model-generated,
/// so it is checked here rather than left to the server.
const MAX_LEAVE_DAYS: i64 = 365;

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

/// Builds the per-day breakdown the leave submission endpoint expects,
/// serialized into the request as a JSON string.
fn leave_days_json(from: NaiveDate, total_days: i64) -> Value {
    let days: Vec<Value> = (0..total_days)
        .map(|offset| {
            let date = from + Duration::days(offset);
            json!({
                "Date": date.format("%Y-%m-%d").to_string(),
                "DayName": date.format("%A").to_string(),
                "WorkShiftId": 1,
                "WorkShiftName": "General",
                "Status": "Leave",
            })
        })
        .collect();
    Value::Array(days)
}

/// Fetches a plain-text employee attribute endpoint. These endpoints return
/// the bare value, optionally wrapped in quotes, rather than JSON.
async fn fetch_plain_text(
    client: &HrmsClient,
    path: &str,
    employee_id: i64,
    min_len: usize,
) -> Result<Option<String>> {
    let (status, body) = client.get(path, &[("id", employee_id.to_string())]).await?;
    if !status.is_success() {
        return Ok(None);
    }
    let value = body.trim().trim_matches('"').trim_matches('\'').to_string();
    if value.len() > min_len {
        return Ok(Some(value));
    }
    // Some deployments wrap the value in JSON instead.
    if let Ok(parsed) = serde_json::from_str::<Value>(&body) {
        if let Some(v) = parsed
            .get("value")
            .or_else(|| parsed.get("mobileNumber"))
            .or_else(|| parsed.get("address"))
            .and_then(Value::as_str)
        {
            return Ok(Some(v.to_string()));
        }
    }
    Ok(None)
}

struct LeaveSubmission {
    employee_id: i64,
    from: NaiveDate,
    total_days: i64,
    reason: String,
    leave_type_id: i64,
    day_leave_type: String,
    half_day_type: String,
}

/// Runs the full leave submission flow: contact details lookup, per-day
/// breakdown, then the form-encoded save request. Domain failures come back
/// as user-facing text rather than errors so the model can relay them.
async fn submit_leave(client: &HrmsClient, req: LeaveSubmission) -> Result<String> {
    let to = req.from + Duration::days(req.total_days - 1);
    let from_str = req.from.format("%Y-%m-%d").to_string();
    let to_str = to.format("%Y-%m-%d").to_string();

    tracing::info!(
        employee_id = req.employee_id,
        from = %from_str,
        to = %to_str,
        days = req.total_days,
        "submitting leave request"
    );

    let Some(phone) = fetch_plain_text(
        client,
        "/api/HRMS/Employee/Info/GetEmployeePersonalMobileNumberByEmployeeId",
        req.employee_id,
        5,
    )
    .await?
    else {
        return Ok(format!(
            "Failed to fetch mobile number for employee {}. The leave request was not submitted.",
            req.employee_id
        ));
    };

    let Some(address) = fetch_plain_text(
        client,
        "/api/HRMS/Employee/Info/GetEmployeePresentAddressByEmployeeId",
        req.employee_id,
        3,
    )
    .await?
    else {
        return Ok(format!(
            "Failed to fetch address for employee {}. The leave request was not submitted.",
            req.employee_id
        ));
    };

    let days = leave_days_json(req.from, req.total_days);
    let form: Vec<(String, String)> = vec![
        ("EmployeeLeaveRequestId".into(), "0".into()),
        ("EmployeeLeaveCode".into(), String::new()),
        ("EmployeeId".into(), req.employee_id.to_string()),
        ("UnitId".into(), String::new()),
        ("LeaveTypeId".into(), req.leave_type_id.to_string()),
        ("LeaveTypeName".into(), String::new()),
        ("DayLeaveType".into(), req.day_leave_type.clone()),
        ("HalfDayType".into(), req.half_day_type.clone()),
        ("AppliedFromDate".into(), from_str.clone()),
        ("AppliedToDate".into(), to_str.clone()),
        ("AppliedTotalDays".into(), req.total_days.to_string()),
        ("LeavePurpose".into(), req.reason.clone()),
        ("EmergencyPhoneNo".into(), phone.clone()),
        ("AddressDuringLeave".into(), address.clone()),
        ("Remarks".into(), String::new()),
        ("LeaveDaysJson".into(), days.to_string()),
        ("FilePath".into(), String::new()),
        ("Flag".into(), "Submit".into()),
        ("EstimatedDeliveryDate".into(), String::new()),
    ];

    let (status, body) = client
        .post_form("/api/HRMS/Leave/LeaveRequest/SaveEmployeeLeaveRequest3", &form)
        .await?;
    if !status.is_success() {
        return Ok(format!(
            "Leave request failed. HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        ));
    }

    let result: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let accepted = result.get("status").and_then(Value::as_bool).unwrap_or(false);
    if accepted {
        Ok(format!(
            "Leave application submitted successfully.\nPeriod: {from_str} to {to_str} ({} days)\nReason: {}\nContact: {phone}\nAddress: {address}",
            req.total_days, req.reason
        ))
    } else {
        let msg = result
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("the HRMS system rejected the request");
        Ok(format!("Leave application was not accepted: {msg}"))
    }
}

fn leave_period_too_long(total_days: i64) -> String {
    format!(
        "A single leave application covers at most {MAX_LEAVE_DAYS} days; {total_days} days \
         was requested. Please split the request or correct the number of days."
    )
}

fn str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Submits a leave request for the current user.
pub struct ApplyLeaveTool {
    client: Arc<HrmsClient>,
}

impl ApplyLeaveTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for ApplyLeaveTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "apply_for_leave",
            "Apply for leave on behalf of the current user. Use this when the user asks to \
             take leave, request vacation days or apply for sick leave.",
            json!({
                "type": "object",
                "properties": {
                    "start_date": {
                        "type": "string",
                        "description": "Leave start date in YYYY-MM-DD format"
                    },
                    "total_days": {
                        "type": "integer",
                        "description": "Total number of leave days"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Reason or purpose for the leave"
                    },
                    "leave_type_id": {
                        "type": "integer",
                        "description": "Leave type id, defaults to sick leave"
                    },
                    "day_leave_type": {
                        "type": "string",
                        "description": "Full Day or Half Day, defaults to Full Day"
                    },
                    "half_day_type": {
                        "type": "string",
                        "description": "First Half or Second Half, only for half day leave"
                    }
                },
                "required": ["start_date", "total_days", "reason"]
            }),
        )
    }

    async fn call(&self, args: Value, actor: Option<&ActorContext>) -> Result<String> {
        let start = str_arg(&args, "start_date").context("start_date is required")?;
        let total_days = args
            .get("total_days")
            .and_then(Value::as_i64)
            .context("total_days is required")?;
        let reason = str_arg(&args, "reason").context("reason is required")?;
        if total_days < 1 {
            bail!("total_days must be at least 1");
        }
        if total_days > MAX_LEAVE_DAYS {
            return Ok(leave_period_too_long(total_days));
        }

        let employee_id =
            resolve_employee_id(&args, actor, self.client.default_employee_id());
        submit_leave(
            &self.client,
            LeaveSubmission {
                employee_id,
                from: parse_date(&start)?,
                total_days,
                reason,
                leave_type_id: args
                    .get("leave_type_id")
                    .and_then(Value::as_i64)
                    .unwrap_or(DEFAULT_LEAVE_TYPE_ID),
                day_leave_type: str_arg(&args, "day_leave_type")
                    .unwrap_or_else(|| "Full Day".to_string()),
                half_day_type: str_arg(&args, "half_day_type").unwrap_or_default(),
            },
        )
        .await
    }
}

/// Reads the current user's leave balance.
pub struct LeaveBalanceTool {
    client: Arc<HrmsClient>,
}

impl LeaveBalanceTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for LeaveBalanceTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_leave_balance",
            "Get the current user's leave balance. Use this when the user asks how many \
             leave or vacation days they have left.",
            json!({
                "type": "object",
                "properties": {
                    "employee_id": {
                        "type": "integer",
                        "description": "Employee id, defaults to the logged-in user"
                    }
                },
                "required": []
            }),
        )
    }

    async fn call(&self, args: Value, actor: Option<&ActorContext>) -> Result<String> {
        let employee_id =
            resolve_employee_id(&args, actor, self.client.default_employee_id());
        let (status, body) = self
            .client
            .get(
                "/api/HRMS/Leave/EmployeeLeaveBalance/GetLeaveBalance",
                &[("employeeId", employee_id.to_string())],
            )
            .await?;
        if !status.is_success() {
            return Ok(format!(
                "Failed to retrieve leave balance. HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(balance) => Ok(serde_json::to_string_pretty(&balance)?),
            Err(_) => Ok(format!(
                "Error retrieving leave balance: failed to parse response. Status: {status}"
            )),
        }
    }
}

/// Submits a leave request for another employee, resolved by name. Intended
/// for managers and HR admins.
pub struct ApplyLeaveForEmployeeTool {
    client: Arc<HrmsClient>,
}

impl ApplyLeaveForEmployeeTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for ApplyLeaveForEmployeeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "apply_leave_for_employee",
            "Apply for leave on behalf of another employee, found by name. Use this when an \
             HR admin or manager asks to file leave for someone else.",
            json!({
                "type": "object",
                "properties": {
                    "employee_name": {
                        "type": "string",
                        "description": "Name of the employee to apply leave for"
                    },
                    "start_date": {
                        "type": "string",
                        "description": "Leave start date in YYYY-MM-DD format"
                    },
                    "total_days": {
                        "type": "integer",
                        "description": "Total number of leave days"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Reason or purpose for the leave"
                    },
                    "leave_type_id": {
                        "type": "integer",
                        "description": "Leave type id, defaults to sick leave"
                    }
                },
                "required": ["employee_name", "start_date", "total_days", "reason"]
            }),
        )
    }

    async fn call(&self, args: Value, _actor: Option<&ActorContext>) -> Result<String> {
        let name = str_arg(&args, "employee_name").context("employee_name is required")?;
        let start = str_arg(&args, "start_date").context("start_date is required")?;
        let total_days = args
            .get("total_days")
            .and_then(Value::as_i64)
            .context("total_days is required")?;
        let reason = str_arg(&args, "reason").context("reason is required")?;
        if total_days < 1 {
            bail!("total_days must be at least 1");
        }
        if total_days > MAX_LEAVE_DAYS {
            return Ok(leave_period_too_long(total_days));
        }

        let (employee_id, employee_name) =
            match search_employee_by_name(&self.client, &name).await? {
                Ok(found) => found,
                Err(text) => return Ok(text),
            };
        tracing::info!(employee_id, employee_name = %employee_name, "resolved employee by name");

        let outcome = submit_leave(
            &self.client,
            LeaveSubmission {
                employee_id,
                from: parse_date(&start)?,
                total_days,
                reason,
                leave_type_id: args
                    .get("leave_type_id")
                    .and_then(Value::as_i64)
                    .unwrap_or(DEFAULT_LEAVE_TYPE_ID),
                day_leave_type: "Full Day".to_string(),
                half_day_type: String::new(),
            },
        )
        .await?;
        Ok(format!("Employee: {employee_name}\n{outcome}"))
    }
}

/// Picks the leave request whose applied period covers `date`. Returns
/// `Err(text)` for the zero- and multiple-match cases.
fn find_leave_request_by_date(
    requests: &[Value],
    date: NaiveDate,
) -> std::result::Result<Value, String> {
    let mut matches: Vec<&Value> = Vec::new();
    for req in requests {
        let from = req
            .get("appliedFromDate")
            .or_else(|| req.get("AppliedFromDate"))
            .and_then(Value::as_str)
            .map(date_part)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let to = req
            .get("appliedToDate")
            .or_else(|| req.get("AppliedToDate"))
            .and_then(Value::as_str)
            .map(date_part)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        if let (Some(from), Some(to)) = (from, to) {
            if from <= date && date <= to {
                matches.push(req);
            }
        }
    }

    match matches.len() {
        0 => Err(format!("No leave request found covering {date}.")),
        1 => Ok(matches[0].clone()),
        _ => {
            let ids: Vec<String> = matches
                .iter()
                .take(5)
                .map(|r| {
                    r.get("employeeLeaveRequestId")
                        .or_else(|| r.get("EmployeeLeaveRequestId"))
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                })
                .collect();
            Err(format!(
                "Multiple leave requests found for date {date}. Please provide more specific \
                 information. Request IDs: {}",
                ids.join(", ")
            ))
        }
    }
}

/// Cancels a pending leave request for another employee, resolved by name
/// and matched by the applied date. Intended for managers and HR admins.
pub struct CancelLeaveForEmployeeTool {
    client: Arc<HrmsClient>,
}

impl CancelLeaveForEmployeeTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for CancelLeaveForEmployeeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "cancel_leave_for_employee",
            "Cancel a leave request for another employee, found by name and matched by the \
             date the leave was applied for. Use this when an HR admin or manager asks to \
             cancel or withdraw someone's leave.",
            json!({
                "type": "object",
                "properties": {
                    "employee_name": {
                        "type": "string",
                        "description": "Name of the employee whose leave should be cancelled"
                    },
                    "applied_date": {
                        "type": "string",
                        "description": "A date the leave covers, in YYYY-MM-DD format"
                    },
                    "remarks": {
                        "type": "string",
                        "description": "Cancellation remarks, defaults to 'Cancelled'"
                    }
                },
                "required": ["employee_name", "applied_date"]
            }),
        )
    }

    async fn call(&self, args: Value, _actor: Option<&ActorContext>) -> Result<String> {
        let name = str_arg(&args, "employee_name").context("employee_name is required")?;
        let date = parse_date(
            &str_arg(&args, "applied_date").context("applied_date is required")?,
        )?;
        let remarks = str_arg(&args, "remarks").unwrap_or_else(|| "Cancelled".to_string());

        let (employee_id, employee_name) =
            match search_employee_by_name(&self.client, &name).await? {
                Ok(found) => found,
                Err(text) => return Ok(text),
            };
        tracing::info!(employee_id, employee_name = %employee_name, date = %date, "cancelling leave request");

        let (status, body) = self
            .client
            .get(
                "/api/HRMS/Leave/LeaveRequest/GetEmployeeLeaveRequests",
                &[
                    ("month", "0".to_string()),
                    ("year", "0".to_string()),
                    ("employeeId", employee_id.to_string()),
                    ("leaveTypeId", "0".to_string()),
                    ("dayLeaveType", String::new()),
                    ("appliedFromDate", String::new()),
                    ("appliedToDate", String::new()),
                    ("stateStatus", String::new()),
                    ("pageNumber", "1".to_string()),
                    ("pageSize", "15".to_string()),
                ],
            )
            .await?;
        if !status.is_success() {
            return Ok(format!("Failed to retrieve leave requests. HTTP {status}"));
        }
        let data: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let requests = json_list(&data, &["data", "result", "items", "list"]);
        if requests.is_empty() {
            return Ok(format!(
                "No leave requests found for {employee_name}. Nothing to cancel."
            ));
        }

        let matched = match find_leave_request_by_date(&requests, date) {
            Ok(req) => req,
            Err(text) => return Ok(format!("{text} (employee: {employee_name})")),
        };
        let Some(request_id) = matched
            .get("employeeLeaveRequestId")
            .or_else(|| matched.get("EmployeeLeaveRequestId"))
            .and_then(Value::as_i64)
        else {
            return Ok("Leave request found but it carries no request id; cannot cancel."
                .to_string());
        };
        let leave_type_id = matched
            .get("leaveTypeId")
            .or_else(|| matched.get("LeaveTypeId"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let (status, body) = self
            .client
            .post_json(
                "/api/hrms/leave/LeaveRequest/DeleteEmployeeLeaveRequest",
                &json!({
                    "employeeId": employee_id,
                    "employeeLeaveRequestId": request_id,
                    "leaveTypeId": leave_type_id,
                }),
            )
            .await?;
        if !status.is_success() {
            return Ok(format!(
                "Failed to cancel the leave request. HTTP {}: {}",
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
                .unwrap_or("the HRMS system rejected the cancellation");
            return Ok(format!("Leave cancellation failed: {msg}"));
        }

        // Notification email failures don't undo the cancellation.
        let email = self
            .client
            .get(
                "/api/hrms/leave/LeaveRequest/LeaveRequestEmailSend",
                &[
                    ("employeeId", employee_id.to_string()),
                    ("leaveTypeId", leave_type_id.to_string()),
                    ("emailType", "Cancelled".to_string()),
                    ("leaveRequestId", request_id.to_string()),
                ],
            )
            .await;
        if let Err(err) = email {
            tracing::warn!(error = %err, "leave cancellation email failed");
        }

        let mut lines = vec![
            format!("Leave cancelled successfully for {employee_name}."),
            format!("Applied date: {date}"),
            format!("Remarks: {remarks}"),
        ];
        if let Some(msg) = result.get("msg").and_then(Value::as_str).filter(|m| !m.is_empty()) {
            lines.push(format!("Message: {msg}"));
        }
        Ok(lines.join("\n"))
    }
}
