//! REST and webhook trigger surface.
//!
//! Triggers: `POST /api/v1/resync` (forced), `POST /webhook` (push-event
//! callback, payload ignored), `POST /api/v1/flushcache`. Health probes
//! plus read-only projections of the declared state round out the API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;

use crate::scheduler::ApplyScheduler;
use crate::service::SyncService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
    pub scheduler: Arc<ApplyScheduler>,
}

/// Build the daemon router.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz/live", get(livez))
        .route("/healthz/ready", get(readyz))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/resync", post(post_resync))
        .route("/api/v1/flushcache", post(post_flush_cache))
        .route("/api/v1/users", get(list_users))
        .route("/api/v1/users/:name", get(get_user))
        .route("/api/v1/collaborators", get(list_collaborators))
        .route("/api/v1/teams", get(list_teams))
        .route("/api/v1/teams/:name", get(get_team))
        .route("/api/v1/repositories", get(list_repositories))
        .route("/api/v1/repositories/:name", get(get_repository))
        .route("/webhook", post(post_webhook))
        .with_state(state)
}

/// API error responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Declared state has not been loaded yet.
    #[error("not ready, declared state not loaded yet")]
    NotReady,

    /// The requested entity does not exist in the declared state.
    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorBody { message: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub last_sync_time: Option<String>,
    pub last_sync_error: Option<String>,
    pub seconds_to_next_sync: i64,
    pub users: usize,
    pub external_users: usize,
    pub teams: usize,
    pub repositories: usize,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub github_id: String,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub name: String,
    pub github_id: String,
    /// Teams the user belongs to, as owner or member.
    pub teams: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TeamSummary {
    pub name: String,
    pub members: Vec<String>,
    pub owners: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TeamDetail {
    pub name: String,
    pub members: Vec<String>,
    pub owners: Vec<String>,
    /// Repositories the team can reach, as owner, reader or writer.
    pub repositories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RepoSummary {
    pub name: String,
    pub public: bool,
    pub archived: bool,
}

#[derive(Debug, Serialize)]
pub struct AccessEntry {
    pub name: String,
    pub access: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RepoDetail {
    pub name: String,
    pub public: bool,
    pub archived: bool,
    pub teams: Vec<AccessEntry>,
    pub collaborators: Vec<AccessEntry>,
}

async fn livez() -> Json<Health> {
    Json(Health { status: "OK" })
}

async fn readyz(State(state): State<AppState>) -> Result<Json<Health>, ApiError> {
    if state.service.is_ready() {
        Ok(Json(Health { status: "OK" }))
    } else {
        Err(ApiError::NotReady)
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.scheduler.status();
    let declared = state.service.declared();

    Json(StatusResponse {
        last_sync_time: status.last_sync_time.map(|t| t.to_rfc3339()),
        last_sync_error: status.last_sync_error,
        seconds_to_next_sync: status.seconds_to_next_sync,
        users: declared.as_ref().map_or(0, |org| org.users.len()),
        external_users: declared.as_ref().map_or(0, |org| org.external_users.len()),
        teams: declared.as_ref().map_or(0, |org| org.teams.len()),
        repositories: declared.as_ref().map_or(0, |org| org.repositories.len()),
    })
}

async fn post_resync(State(state): State<AppState>) -> Json<TriggerResponse> {
    let scheduler = Arc::clone(&state.scheduler);
    tokio::task::spawn_blocking(move || {
        scheduler.apply_and_record(true, "resync");
    });
    Json(TriggerResponse { status: "scheduled" })
}

async fn post_webhook(State(state): State<AppState>) -> Json<TriggerResponse> {
    tracing::debug!("Webhook callback received");
    let scheduler = Arc::clone(&state.scheduler);
    tokio::task::spawn_blocking(move || {
        scheduler.apply_and_record(false, "webhook");
    });
    Json(TriggerResponse { status: "scheduled" })
}

async fn post_flush_cache(State(state): State<AppState>) -> Json<TriggerResponse> {
    state.service.flush_cache();
    Json(TriggerResponse { status: "flushed" })
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    Ok(Json(
        declared
            .users
            .iter()
            .map(|(name, user)| UserSummary {
                name: name.clone(),
                github_id: user.github_id.clone(),
            })
            .collect(),
    ))
}

async fn get_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UserDetail>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    let user = declared
        .users
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("user {name}")))?;

    let teams = declared
        .teams
        .iter()
        .filter(|(_, team)| team.members.contains(&name) || team.owners.contains(&name))
        .map(|(team_name, _)| team_name.clone())
        .collect();

    Ok(Json(UserDetail {
        name: name.clone(),
        github_id: user.github_id.clone(),
        teams,
    }))
}

async fn list_collaborators(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    Ok(Json(
        declared
            .external_users
            .iter()
            .map(|(name, user)| UserSummary {
                name: name.clone(),
                github_id: user.github_id.clone(),
            })
            .collect(),
    ))
}

async fn list_teams(State(state): State<AppState>) -> Result<Json<Vec<TeamSummary>>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    Ok(Json(
        declared
            .teams
            .iter()
            .map(|(name, team)| TeamSummary {
                name: name.clone(),
                members: team.members.clone(),
                owners: team.owners.clone(),
            })
            .collect(),
    ))
}

async fn get_team(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TeamDetail>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    let team = declared
        .teams
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("team {name}")))?;

    let repositories = declared
        .repositories
        .iter()
        .filter(|(_, repo)| {
            repo.owner.as_deref() == Some(name.as_str())
                || repo.readers.contains(&name)
                || repo.writers.contains(&name)
        })
        .map(|(repo_name, _)| repo_name.clone())
        .collect();

    Ok(Json(TeamDetail {
        name: name.clone(),
        members: team.members.clone(),
        owners: team.owners.clone(),
        repositories,
    }))
}

async fn list_repositories(
    State(state): State<AppState>,
) -> Result<Json<Vec<RepoSummary>>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    Ok(Json(
        declared
            .repositories
            .iter()
            .map(|(name, repo)| RepoSummary {
                name: name.clone(),
                public: repo.is_public,
                archived: repo.archived,
            })
            .collect(),
    ))
}

async fn get_repository(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RepoDetail>, ApiError> {
    let declared = state.service.declared().ok_or(ApiError::NotReady)?;
    let repo = declared
        .repositories
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("repository {name}")))?;

    let mut teams = Vec::new();
    for reader in &repo.readers {
        teams.push(AccessEntry { name: reader.clone(), access: "read" });
    }
    if let Some(owner) = &repo.owner {
        teams.push(AccessEntry { name: owner.clone(), access: "write" });
    }
    for writer in &repo.writers {
        teams.push(AccessEntry { name: writer.clone(), access: "write" });
    }

    let mut collaborators = Vec::new();
    for reader in &repo.external_user_readers {
        collaborators.push(AccessEntry { name: reader.clone(), access: "read" });
    }
    for writer in &repo.external_user_writers {
        collaborators.push(AccessEntry { name: writer.clone(), access: "write" });
    }

    Ok(Json(RepoDetail {
        name: name.clone(),
        public: repo.is_public,
        archived: repo.archived,
        teams,
        collaborators,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::LogNotifier;
    use crate::source::{DeclaredSource, LiveSource, SourceBundle, SourceError};
    use orgsync_engine::{DeclaredRepo, DeclaredTeam, DeclaredUser, LiveSnapshot};

    struct StaticDeclared(SourceBundle);

    impl DeclaredSource for StaticDeclared {
        fn load(&self) -> Result<SourceBundle, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct StaticLive;

    impl LiveSource for StaticLive {
        fn fetch(&self) -> Result<LiveSnapshot, SourceError> {
            Ok(LiveSnapshot::default())
        }
    }

    fn app_state() -> AppState {
        let mut bundle = SourceBundle::default();
        bundle
            .org
            .users
            .insert("alice".to_string(), DeclaredUser { github_id: "ghAlice".to_string() });
        bundle.org.teams.insert(
            "eng".to_string(),
            DeclaredTeam { members: vec!["alice".to_string()], owners: vec![] },
        );
        bundle.org.repositories.insert(
            "svc-api".to_string(),
            DeclaredRepo {
                is_public: true,
                writers: vec!["eng".to_string()],
                ..DeclaredRepo::default()
            },
        );

        let service = Arc::new(SyncService::new(
            Box::new(StaticDeclared(bundle)),
            Box::new(StaticLive),
            None,
            "teams",
            true,
        ));
        let scheduler = {
            let service = Arc::clone(&service);
            Arc::new(ApplyScheduler::new(
                Box::new(move |force, author| service.apply(force, author)),
                Box::new(LogNotifier),
                600,
            ))
        };
        AppState { service, scheduler }
    }

    #[tokio::test]
    async fn test_readiness_follows_declared_state() {
        let state = app_state();
        assert!(readyz(State(state.clone())).await.is_err());

        state.service.apply(false, "tests").unwrap();
        assert!(readyz(State(state)).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_reports_entity_counts() {
        let state = app_state();
        state.service.apply(false, "tests").unwrap();

        let status = get_status(State(state)).await.0;
        assert_eq!(status.users, 1);
        assert_eq!(status.teams, 1);
        assert_eq!(status.repositories, 1);
        assert_eq!(status.external_users, 0);
    }

    #[tokio::test]
    async fn test_user_detail_lists_team_memberships() {
        let state = app_state();
        state.service.apply(false, "tests").unwrap();

        let detail = get_user(State(state), Path("alice".to_string())).await.unwrap().0;
        assert_eq!(detail.github_id, "ghAlice");
        assert_eq!(detail.teams, vec!["eng".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_entities_return_not_found() {
        let state = app_state();
        state.service.apply(false, "tests").unwrap();

        assert!(matches!(
            get_user(State(state.clone()), Path("nobody".to_string())).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            get_repository(State(state), Path("nothing".to_string())).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_detail_classifies_access() {
        let state = app_state();
        state.service.apply(false, "tests").unwrap();

        let detail = get_repository(State(state), Path("svc-api".to_string()))
            .await
            .unwrap()
            .0;
        assert!(detail.public);
        assert_eq!(detail.teams.len(), 1);
        assert_eq!(detail.teams[0].name, "eng");
        assert_eq!(detail.teams[0].access, "write");
        assert!(detail.collaborators.is_empty());
    }
}
