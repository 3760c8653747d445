// src/mock/handlers.rs
//! Route handlers for the innovation hub API surface

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::interception::response::MockResponse;
use crate::interception::routing_table::{RouteReply, RoutingTable, Validate};
use crate::mock::assistant;
use crate::mock::dataset::{IdeaDraft, Insight, ProjectDraft, SyntheticDataset, User};
use crate::utils::errors::Result;

/// Alternate insight titles, swapped in at random to simulate fresh advice
const INSIGHT_VARIATIONS: [&str; 3] = [
    "Workshops de Co-criação",
    "Dashboard de Resultados",
    "Sistema de Recompensas",
];

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
}

impl Validate for Credentials {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email is required".into());
        }
        Ok(())
    }
}

impl Validate for IdeaDraft {
    fn validate(&self) -> std::result::Result<(), String> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("impact", &self.impact),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} is required", field));
            }
        }
        Ok(())
    }
}

impl Validate for ProjectDraft {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SignInReply {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

impl Validate for ChatRequest {}

fn ok<T: Serialize>(value: &T) -> Result<RouteReply> {
    Ok(MockResponse::ok_json(value)?.into())
}

fn not_found(message: &str) -> Result<RouteReply> {
    Ok(MockResponse::error(404, message)?.into())
}

fn sign_in(dataset: &SyntheticDataset, credentials: Credentials) -> Result<RouteReply> {
    let user = dataset.find_or_create_user(credentials.email.trim());
    ok(&SignInReply {
        user,
        token: format!("mock-token-{}", Utc::now().timestamp_millis()),
    })
}

fn mix_insights(insights: Vec<Insight>) -> Vec<Insight> {
    let mut rng = rand::thread_rng();
    insights
        .into_iter()
        .enumerate()
        .map(|(index, insight)| match INSIGHT_VARIATIONS.get(index) {
            Some(title) if rng.gen_bool(0.5) => Insight {
                title: (*title).to_string(),
                ..insight
            },
            _ => insight,
        })
        .collect()
}

/// Build the routing table for the hub API over `dataset`
pub fn hub_routes(dataset: Arc<SyntheticDataset>) -> Result<RoutingTable> {
    let mut table = RoutingTable::new();

    // Auth: any email signs in, unknown ones get an account
    let ds = Arc::clone(&dataset);
    table.post_json("/auth/login", move |_, credentials: Credentials| sign_in(&ds, credentials))?;

    let ds = Arc::clone(&dataset);
    table.post_json("/auth/register", move |_, credentials: Credentials| sign_in(&ds, credentials))?;

    // Ideas
    let ds = Arc::clone(&dataset);
    table.get("/ideas", move |_| ok(&ds.ideas()))?;

    let ds = Arc::clone(&dataset);
    table.get("/ideas/map", move |_| ok(&ds.map_ideas()))?;

    let ds = Arc::clone(&dataset);
    table.post_json("/ideas", move |_, draft: IdeaDraft| ok(&ds.create_idea(draft)))?;

    let ds = Arc::clone(&dataset);
    table.post("/ideas/:id/like", move |req| {
        let id = req.param("id").unwrap_or_default();
        match ds.like_idea(id) {
            Some(likes) => ok(&json!({ "likes": likes })),
            None => not_found("Idea not found"),
        }
    })?;

    // Projects
    let ds = Arc::clone(&dataset);
    table.get("/projects", move |_| ok(&ds.projects()))?;

    let ds = Arc::clone(&dataset);
    table.get("/projects/:id", move |req| {
        match ds.project(req.param("id").unwrap_or_default()) {
            Some(project) => ok(&project),
            None => not_found("Project not found"),
        }
    })?;

    let ds = Arc::clone(&dataset);
    table.post_json("/projects", move |_, draft: ProjectDraft| ok(&ds.create_project(draft)))?;

    // Assistant
    let ds = Arc::clone(&dataset);
    table.get("/aurora/insights", move |_| ok(&mix_insights(ds.insights())))?;

    table.post_json("/aurora/chat", |_, chat: ChatRequest| ok(&assistant::respond(&chat.message)))?;

    Ok(table)
}
