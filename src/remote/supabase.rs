use super::{AuthBackend, RemoteError, Session, TaskBackend};
use crate::config::BackendConfig;
use crate::model::{NewTask, Status, Task, TaskId, User};
use chrono::{Duration, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Blocking client for a Supabase project: GoTrue under `/auth/v1`,
/// PostgREST under `/rest/v1`.
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    table: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

#[derive(Deserialize)]
struct InsertedRow {
    id: TaskId,
}

impl SessionResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            user: self.user,
        }
    }
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(concat!("taches/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(SupabaseClient {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            table: config.table.clone(),
            access_token: None,
        })
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn row_request(&self, method: Method) -> Result<RequestBuilder, RemoteError> {
        let token = self.access_token.as_deref().ok_or(RemoteError::NotSignedIn)?;
        Ok(self.request(method, &self.rest_url(), Some(token)))
    }

    fn owned_row(id: &TaskId, owner: &str) -> [(&'static str, String); 2] {
        [
            ("id", format!("eq.{}", id)),
            ("user_id", format!("eq.{}", owner)),
        ]
    }
}

fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// PostgREST uses `message`, GoTrue `msg` or `error_description`.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

impl TaskBackend for SupabaseClient {
    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, RemoteError> {
        let response = self
            .row_request(Method::GET)?
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", owner)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()?;
        let tasks: Vec<Task> = check(response)?.json()?;
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    fn insert_task(&self, task: &NewTask) -> Result<TaskId, RemoteError> {
        let response = self
            .row_request(Method::POST)?
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .json(task)
            .send()?;
        let rows: Vec<InsertedRow> = check(response)?.json()?;
        let id = rows
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| RemoteError::Status {
                status: 201,
                message: "insert returned no row".into(),
            })?;
        info!(task = %id, title = %task.title, "inserted task");
        Ok(id)
    }

    fn update_task_status(
        &self,
        id: &TaskId,
        owner: &str,
        status: Status,
    ) -> Result<(), RemoteError> {
        let response = self
            .row_request(Method::PATCH)?
            .query(&Self::owned_row(id, owner))
            .header("Prefer", "return=minimal")
            .json(&json!({ "statut": status }))
            .send()?;
        check(response)?;
        info!(task = %id, status = %status, "updated task status");
        Ok(())
    }

    fn delete_task(&self, id: &TaskId, owner: &str) -> Result<(), RemoteError> {
        let response = self
            .row_request(Method::DELETE)?
            .query(&Self::owned_row(id, owner))
            .send()?;
        check(response)?;
        info!(task = %id, "deleted task");
        Ok(())
    }

    fn use_session(&mut self, session: Option<&Session>) {
        self.access_token = session.map(|s| s.access_token.clone());
    }
}

impl AuthBackend for SupabaseClient {
    fn request_code(&self, email: &str) -> Result<(), RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("otp"), None)
            .json(&json!({ "email": email, "create_user": true }))
            .send()?;
        check(response)?;
        info!(email, "sign-in code requested");
        Ok(())
    }

    fn verify_code(&self, email: &str, code: &str) -> Result<Session, RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("verify"), None)
            .json(&json!({ "type": "email", "email": email, "token": code }))
            .send()?;
        let session: SessionResponse = check(response)?.json()?;
        Ok(session.into_session())
    }

    fn refresh(&self, session: &Session) -> Result<Session, RemoteError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(RemoteError::NotSignedIn)?;
        let response = self
            .request(Method::POST, &self.auth_url("token"), None)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()?;
        let refreshed: SessionResponse = check(response)?.json()?;
        debug!(user = %refreshed.user.id, "session refreshed");
        Ok(refreshed.into_session())
    }

    fn fetch_user(&self, session: &Session) -> Result<User, RemoteError> {
        let response = self
            .request(
                Method::GET,
                &self.auth_url("user"),
                Some(&session.access_token),
            )
            .send()?;
        Ok(check(response)?.json()?)
    }

    fn sign_out(&self, session: &Session) -> Result<(), RemoteError> {
        let response = self
            .request(
                Method::POST,
                &self.auth_url("logout"),
                Some(&session.access_token),
            )
            .send()?;
        check(response)?;
        Ok(())
    }
}
