use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tandem_types::ActorContext;

use super::client::HrmsClient;
use super::resolve_employee_id;
use crate::registry::{ToolHandler, ToolSpec};

/// Returns the current user's HRMS profile: name, department, designation,
/// branch and manager details.
pub struct EmployeeInfoTool {
    client: Arc<HrmsClient>,
}

impl EmployeeInfoTool {
    pub fn new(client: Arc<HrmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for EmployeeInfoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_employee_info",
            "Get the current user's employee profile from the HRMS system. Use this when \
             the user asks who they are, what department they are in, their designation, \
             their manager or their employee id.",
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
                "/api/hrms/Employee/Info/GetEmployeePersonalInfoById",
                &[("employeeId", employee_id.to_string())],
            )
            .await?;
        if !status.is_success() {
            return Ok(format!(
                "Failed to retrieve employee information. HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(info) => Ok(serde_json::to_string_pretty(&info)?),
            Err(_) => Ok(format!(
                "Error retrieving employee information: failed to parse response. Status: {status}"
            )),
        }
    }
}
