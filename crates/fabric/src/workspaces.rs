//! Workspace creation and the admin role grant.

use reqwest::StatusCode;
use serde::Serialize;

use crate::client::{body_text, check_status, parse_response, FabricClient, IdResponse};
use crate::error::FabricError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkspaceRequest<'a> {
    display_name: &'a str,
    capacity_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddGroupUserRequest<'a> {
    email_address: &'a str,
    group_user_access_right: &'a str,
}

impl FabricClient {
    /// Create a workspace on the given capacity and return its id.
    ///
    /// Sends `POST /workspaces`. A `409 Conflict` becomes
    /// [`FabricError::WorkspaceExists`]; the caller must not retry under
    /// another name on its own.
    pub async fn create_workspace(
        &self,
        display_name: &str,
        capacity_id: &str,
    ) -> Result<String, FabricError> {
        tracing::info!(workspace = display_name, capacity_id, "Creating Fabric workspace");

        let response = self
            .post(&self.endpoint("workspaces"))
            .json(&CreateWorkspaceRequest {
                display_name,
                capacity_id,
            })
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let body = body_text(response).await;
            tracing::error!(workspace = display_name, body = %body, "Workspace already exists");
            return Err(FabricError::WorkspaceExists(display_name.to_string()));
        }

        let workspace_id = parse_response::<IdResponse>(response).await?.into_id()?;
        tracing::info!(workspace = display_name, workspace_id = %workspace_id, "Fabric workspace created");
        Ok(workspace_id)
    }

    /// Grant `principal` the Admin access right on a workspace.
    ///
    /// Uses the Power BI admin groups API, which accepts a user principal
    /// name directly.
    pub async fn add_workspace_admin(
        &self,
        workspace_id: &str,
        principal: &str,
    ) -> Result<(), FabricError> {
        tracing::info!(workspace_id, principal, "Adding workspace admin");

        let response = self
            .post(&self.admin_endpoint(&format!("admin/groups/{workspace_id}/users")))
            .json(&AddGroupUserRequest {
                email_address: principal,
                group_user_access_right: "Admin",
            })
            .send()
            .await?;

        check_status(response).await?;
        tracing::info!(workspace_id, principal, "Workspace admin added");
        Ok(())
    }
}
