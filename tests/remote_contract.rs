//! HTTP contract for the Supabase adapter: query filters, headers and
//! column names on the wire, plus error mapping.

use chrono::{Duration, Utc};
use serde_json::json;
use taches::commands::App;
use taches::config::{BackendConfig, Config};
use taches::form::TaskForm;
use taches::model::{Importance, NewTask, Priority, Recurrence, Status, TaskId, User};
use taches::remote::{AuthBackend, AuthState, RemoteError, Session, SupabaseClient, TaskBackend};
use taches::tracker::Tracker;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(uri: &str) -> SupabaseClient {
    let mut client = SupabaseClient::new(&BackendConfig {
        url: uri.to_string(),
        anon_key: "anon-key".into(),
        table: "taches".into(),
    })
    .unwrap();
    client.use_session(Some(&session()));
    client
}

fn session() -> Session {
    Session {
        access_token: "user-token".into(),
        refresh_token: Some("refresh".into()),
        expires_at: None,
        user: User {
            id: "u-1".into(),
            email: Some("ana@example.com".into()),
        },
    }
}

/// The blocking client owns its own runtime, so it is built, used and
/// dropped on a blocking thread.
async fn blocking<T, F>(work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn list_filters_by_owner_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/taches"))
        .and(query_param("select", "*"))
        .and(query_param("user_id", "eq.u-1"))
        .and(query_param("order", "created_at.desc"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 42,
                "user_id": "u-1",
                "titre": "Prepare Report",
                "description": "",
                "date": "2024-06-11",
                "heure": "14:30:00",
                "priorite": "Haute",
                "urgence": true,
                "importance": "Forte",
                "rappelAvant": "3",
                "recurrence": "Jamais",
                "statut": "En cours",
                "alerteEnvoyee": false,
                "rappelDate": "2024-06-06T06:00:00Z",
                "created_at": "2024-06-01T09:00:00Z"
            },
            {
                "id": 41,
                "user_id": "u-1",
                "titre": "Pay rent",
                "date": "2024-06-30",
                "statut": "À faire"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let tasks = blocking(move || client(&uri).list_tasks("u-1"))
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    let report = &tasks[0];
    assert_eq!(report.id, TaskId::new("42"));
    assert_eq!(report.title, "Prepare Report");
    assert_eq!(report.description, None);
    assert_eq!(report.lead_days, Some(3));
    assert_eq!(report.status, Status::Doing);
    assert!(report.urgent);
    assert_eq!(tasks[1].status, Status::Todo);
    assert_eq!(tasks[1].reminder_at, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_posts_original_column_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/taches"))
        .and(query_param("select", "id"))
        .and(header("prefer", "return=representation"))
        .and(header("authorization", "Bearer user-token"))
        .and(body_partial_json(json!({
            "user_id": "u-1",
            "titre": "Prepare Report",
            "date": "2024-06-11",
            "heure": "09:15",
            "rappelAvant": 3,
            "priorite": "Haute",
            "urgence": true,
            "statut": "À faire",
            "alerteEnvoyee": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": 43 }])))
        .expect(1)
        .mount(&server)
        .await;

    let mut form = TaskForm {
        title: "Prepare Report".into(),
        date: "2024-06-11".into(),
        time: "09:15".into(),
        urgent: true,
        lead_days: Some(3),
        ..TaskForm::default()
    };
    form.cycle_priority(1);
    let task = NewTask::from_draft(form.submit().unwrap(), "u-1");
    assert!(task.reminder_at.is_some());

    let uri = server.uri();
    let id = blocking(move || client(&uri).insert_task(&task))
        .await
        .unwrap();
    assert_eq!(id, TaskId::new("43"));
}

#[tokio::test(flavor = "multi_thread")]
async fn list_tolerates_null_columns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/taches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 44,
                "user_id": "u-1",
                "titre": "Imported row",
                "description": null,
                "date": "2024-06-11",
                "heure": null,
                "priorite": null,
                "urgence": null,
                "importance": null,
                "rappelAvant": null,
                "recurrence": null,
                "statut": null,
                "alerteEnvoyee": null,
                "rappelDate": null,
                "created_at": "2024-06-01T09:00:00Z"
            },
            {
                "id": 45,
                "user_id": "u-1",
                "titre": "Regular row",
                "date": "2024-06-12",
                "statut": "Terminé"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let tasks = blocking(move || client(&uri).list_tasks("u-1"))
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    let imported = &tasks[0];
    assert_eq!(imported.status, Status::Todo);
    assert_eq!(imported.priority, Priority::Normal);
    assert_eq!(imported.importance, Importance::Medium);
    assert_eq!(imported.recurrence, Recurrence::Never);
    assert!(!imported.urgent);
    assert!(!imported.notified);
    assert_eq!(tasks[1].status, Status::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn status_update_patches_only_the_owned_row() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/taches"))
        .and(query_param("id", "eq.42"))
        .and(query_param("user_id", "eq.u-1"))
        .and(body_partial_json(json!({ "statut": "Terminé" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    blocking(move || client(&uri).update_task_status(&TaskId::new("42"), "u-1", Status::Done))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_targets_the_owned_row() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/taches"))
        .and(query_param("id", "eq.42"))
        .and(query_param("user_id", "eq.u-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    blocking(move || client(&uri).delete_task(&TaskId::new("42"), "u-1"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn email_code_sign_in_produces_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .and(header("apikey", "anon-key"))
        .and(body_partial_json(json!({ "email": "ana@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .and(body_partial_json(json!({
            "type": "email",
            "email": "ana@example.com",
            "token": "123456"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "refresh_token": "fresh-refresh",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": "u-1", "email": "ana@example.com", "aud": "authenticated" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let session = blocking(move || {
        let client = client(&uri);
        client.request_code("ana@example.com")?;
        client.verify_code("ana@example.com", "123456")
    })
    .await
    .unwrap();

    assert_eq!(session.access_token, "fresh-token");
    assert_eq!(session.refresh_token.as_deref(), Some("fresh-refresh"));
    assert_eq!(session.user.id, "u-1");
    assert!(session.expires_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_uses_the_refresh_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "next-token",
            "refresh_token": "next-refresh",
            "expires_in": 3600,
            "user": { "id": "u-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let fresh = blocking(move || client(&uri).refresh(&session()))
        .await
        .unwrap();
    assert_eq!(fresh.access_token, "next-token");
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_token_is_refreshed_before_reload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "next-token",
            "refresh_token": "next-refresh",
            "expires_in": 3600,
            "user": { "id": "u-1", "email": "ana@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/taches"))
        .and(header("authorization", "Bearer next-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 42, "user_id": "u-1", "titre": "Prepare Report", "date": "2024-06-11" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let (refreshed, token, listed) = blocking(move || {
        let mut expired = session();
        expired.expires_at = Some(Utc::now() - Duration::minutes(5));
        let mut tracker = Tracker::new(Box::new(client(&uri)));
        tracker.set_session(Some(&expired));
        let mut app = App {
            config: Config::default(),
            config_path: "config.yml".into(),
            tracker,
            auth: AuthState::new(Some(expired)),
        };
        let refreshed = app.refresh_if_expiring(Utc::now());
        app.tracker.reload().unwrap();
        let token = app.auth.session().unwrap().access_token.clone();
        (refreshed, token, app.tracker.store().len())
    })
    .await;

    assert!(refreshed);
    assert_eq!(token, "next-token");
    assert_eq!(listed, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_carries_the_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/taches"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST301",
            "message": "JWT expired"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = blocking(move || client(&uri).list_tasks("u-1"))
        .await
        .unwrap_err();
    match err {
        RemoteError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "JWT expired");
        }
        other => panic!("unexpected error: {other}"),
    }
}
