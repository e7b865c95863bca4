//! Thin typed wrappers for the pass-through domain endpoints.
//!
//! These are out of core scope by design: they exist to exercise (and pin)
//! the fact that ordinary domain calls inherit bearer attachment and the
//! single-retry-on-refresh behavior transparently.

use crate::client::ApiClient;
use crate::error::SessionResult;
use serde::{Deserialize, Serialize};

/// A client (customer) record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A project record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// A meeting-minute record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinuteRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub held_on: Option<String>,
}

/// A tag record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: String,
    pub name: String,
}

/// A team record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
}

impl ApiClient {
    /// `GET /v1/clients`
    pub async fn list_clients(&self) -> SessionResult<Vec<ClientRecord>> {
        self.get_as("/v1/clients").await
    }

    /// `GET /v1/projects`
    pub async fn list_projects(&self) -> SessionResult<Vec<ProjectRecord>> {
        self.get_as("/v1/projects").await
    }

    /// `GET /v1/minutes`
    pub async fn list_minutes(&self) -> SessionResult<Vec<MinuteRecord>> {
        self.get_as("/v1/minutes").await
    }

    /// `GET /v1/tags`
    pub async fn list_tags(&self) -> SessionResult<Vec<TagRecord>> {
        self.get_as("/v1/tags").await
    }

    /// `GET /v1/teams`
    pub async fn list_teams(&self) -> SessionResult<Vec<TeamRecord>> {
        self.get_as("/v1/teams").await
    }
}
