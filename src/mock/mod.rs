// src/mock/mod.rs
//! Innovation hub mock backend
//!
//! - **Dataset**: in-memory users, ideas, projects and insights
//! - **Handlers**: the hub API routes over the dataset
//! - **Assistant**: scripted chat replies

pub mod assistant;
pub mod dataset;
pub mod handlers;

pub use assistant::{respond as assistant_reply, ChatReply};
pub use dataset::{
    EntityKind, Idea, IdeaDraft, IdeaStatus, Insight, MapIdea, Project, ProjectDraft,
    ProjectStatus, SyntheticDataset, User,
};
pub use handlers::hub_routes;
