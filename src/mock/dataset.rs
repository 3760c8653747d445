// src/mock/dataset.rs
//! In-memory synthetic dataset
//!
//! Seeded once at construction and mutated in place by route handlers. Every
//! operation takes the lock, finishes its mutation and releases it without
//! awaiting, so concurrent requests never observe a half-updated collection.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdeaStatus {
    #[serde(rename = "enviada")]
    Submitted,
    #[serde(rename = "em avaliação")]
    UnderReview,
    #[serde(rename = "aprovada")]
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub description: String,
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    pub status: IdeaStatus,
    pub likes: u32,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Fields a client supplies when submitting an idea
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeaDraft {
    pub title: String,
    pub description: String,
    pub impact: String,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// Idea projection shown on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapIdea {
    pub id: String,
    pub title: String,
    pub status: IdeaStatus,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectStatus {
    Ativo,
    Piloto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub owner: String,
    pub status: ProjectStatus,
    pub economy: u64,
    pub impacted: u32,
    pub started_at: String,
    #[serde(default)]
    pub description: String,
}

/// Fields a client supplies when creating a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub title: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub icon: String,
}

/// Entity kinds held by the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Users,
    Ideas,
    Projects,
    Insights,
}

#[derive(Debug, Default)]
struct DatasetState {
    users: Vec<User>,
    ideas: Vec<Idea>,
    projects: Vec<Project>,
    insights: Vec<Insight>,
}

/// Shared synthetic dataset
#[derive(Debug)]
pub struct SyntheticDataset {
    state: Mutex<DatasetState>,
}

/// Current time as an ISO-8601 timestamp with millisecond precision
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Default for SyntheticDataset {
    fn default() -> Self {
        Self::seeded()
    }
}

impl SyntheticDataset {
    /// Dataset with no records
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(DatasetState::default()),
        }
    }

    /// Dataset populated with the seed records
    pub fn seeded() -> Self {
        let users = seed_users();
        let ideas = seed_ideas(&users);
        Self {
            state: Mutex::new(DatasetState {
                users,
                ideas,
                projects: seed_projects(),
                insights: seed_insights(),
            }),
        }
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        let state = self.state.lock();
        match kind {
            EntityKind::Users => state.users.len(),
            EntityKind::Ideas => state.ideas.len(),
            EntityKind::Projects => state.projects.len(),
            EntityKind::Insights => state.insights.len(),
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.state.lock().users.clone()
    }

    /// Look a user up by email, creating one if none exists. The name is
    /// derived from the local part (`ana.souza` → `Ana Souza`) and the avatar
    /// from its initials.
    pub fn find_or_create_user(&self, email: &str) -> User {
        let mut state = self.state.lock();
        if let Some(user) = state.users.iter().find(|u| u.email == email) {
            return user.clone();
        }

        let name = display_name(email);
        let user = User {
            id: (state.users.len() + 1).to_string(),
            avatar: Some(initials(&name)),
            name,
            email: email.to_string(),
        };
        debug!("Created mock user {} for {}", user.id, email);
        state.users.push(user.clone());
        user
    }

    pub fn ideas(&self) -> Vec<Idea> {
        self.state.lock().ideas.clone()
    }

    /// Ideas that carry non-zero coordinates
    pub fn map_ideas(&self) -> Vec<MapIdea> {
        self.state
            .lock()
            .ideas
            .iter()
            .filter_map(|idea| match (idea.lat, idea.lng) {
                (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => Some(MapIdea {
                    id: idea.id.clone(),
                    title: idea.title.clone(),
                    status: idea.status,
                    lat,
                    lng,
                    author: idea.author.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Insert a submitted idea at the head of the collection
    pub fn create_idea(&self, draft: IdeaDraft) -> Idea {
        let mut state = self.state.lock();
        let idea = Idea {
            id: (state.ideas.len() + 1).to_string(),
            title: draft.title,
            description: draft.description,
            impact: draft.impact,
            author: draft.author,
            status: IdeaStatus::Submitted,
            likes: 0,
            created_at: iso_now(),
            media: draft.media,
            lat: draft.lat,
            lng: draft.lng,
        };
        state.ideas.insert(0, idea.clone());
        idea
    }

    /// Increment an idea's like counter, returning the new count
    pub fn like_idea(&self, id: &str) -> Option<u32> {
        let mut state = self.state.lock();
        let idea = state.ideas.iter_mut().find(|idea| idea.id == id)?;
        idea.likes += 1;
        Some(idea.likes)
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state.lock().projects.clone()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.state
            .lock()
            .projects
            .iter()
            .find(|project| project.id == id)
            .cloned()
    }

    /// Append a new pilot project
    pub fn create_project(&self, draft: ProjectDraft) -> Project {
        let mut state = self.state.lock();
        let project = Project {
            id: (state.projects.len() + 1).to_string(),
            title: draft.title,
            owner: draft.owner,
            status: ProjectStatus::Piloto,
            economy: 0,
            impacted: 0,
            started_at: iso_now(),
            description: draft.description,
        };
        state.projects.push(project.clone());
        project
    }

    pub fn insights(&self) -> Vec<Insight> {
        self.state.lock().insights.clone()
    }
}

fn display_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    local
        .split('.')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn initials(name: &str) -> String {
    name.split(' ')
        .filter_map(|word| word.chars().next())
        .take(2)
        .collect::<String>()
        .to_uppercase()
}

fn seed_users() -> Vec<User> {
    vec![
        User {
            id: "1".into(),
            name: "Guilherme Costa".into(),
            email: "guilherme@koraone.com".into(),
            avatar: Some("GC".into()),
        },
        User {
            id: "2".into(),
            name: "Hugo Oliveira".into(),
            email: "hugo@koraone.com".into(),
            avatar: Some("HO".into()),
        },
    ]
}

fn seed_ideas(users: &[User]) -> Vec<Idea> {
    let author = |index: usize| users.get(index).cloned();
    vec![
        Idea {
            id: "1".into(),
            title: "Hub de Inovação Digital".into(),
            description: "Criar um espaço físico e virtual dedicado ao desenvolvimento de soluções digitais inovadoras.".into(),
            impact: "Aumentar a colaboração entre equipes em 40% e acelerar o time-to-market de produtos digitais.".into(),
            author: author(0),
            status: IdeaStatus::Approved,
            likes: 12,
            created_at: "2024-01-15T00:00:00.000Z".into(),
            media: None,
            lat: Some(-23.5505),
            lng: Some(-46.6333),
        },
        Idea {
            id: "2".into(),
            title: "Programa de Mentoria Tech".into(),
            description: "Conectar profissionais experientes com talentos emergentes para acelerar o desenvolvimento técnico.".into(),
            impact: "Reduzir turnover em 25% e aumentar satisfação dos colaboradores juniores.".into(),
            author: author(1),
            status: IdeaStatus::UnderReview,
            likes: 8,
            created_at: "2024-01-20T00:00:00.000Z".into(),
            media: None,
            lat: Some(-23.5489),
            lng: Some(-46.6388),
        },
        Idea {
            id: "3".into(),
            title: "Laboratório de IA Aplicada".into(),
            description: "Implementar um laboratório para experimentação com inteligência artificial em processos corporativos.".into(),
            impact: "Automatizar 30% dos processos manuais e gerar insights preditivos para tomada de decisões.".into(),
            author: author(0),
            status: IdeaStatus::Submitted,
            likes: 15,
            created_at: "2024-01-25T00:00:00.000Z".into(),
            media: None,
            lat: None,
            lng: None,
        },
    ]
}

fn seed_projects() -> Vec<Project> {
    vec![
        Project {
            id: "1".into(),
            title: "Hub de Inovação Digital".into(),
            owner: "Guilherme Costa".into(),
            status: ProjectStatus::Ativo,
            economy: 150_000,
            impacted: 200,
            started_at: "2024-02-01T00:00:00.000Z".into(),
            description: "Projeto piloto para implementação do hub de inovação digital na empresa.".into(),
        },
        Project {
            id: "2".into(),
            title: "Sistema de Gestão Inteligente".into(),
            owner: "Hugo Oliveira".into(),
            status: ProjectStatus::Piloto,
            economy: 80_000,
            impacted: 50,
            started_at: "2024-03-01T00:00:00.000Z".into(),
            description: "Piloto para teste do novo sistema de gestão com IA.".into(),
        },
    ]
}

fn seed_insights() -> Vec<Insight> {
    vec![
        Insight {
            id: "1".into(),
            title: "Workshops Colaborativos".into(),
            description: "Organize sessões de brainstorming em grupo para estimular a criatividade e gerar ideias inovadoras.".into(),
            category: "Colaboração".into(),
            icon: "Users".into(),
        },
        Insight {
            id: "2".into(),
            title: "Boletim de Impacto".into(),
            description: "Crie relatórios mensais destacando as ideias implementadas e seus resultados.".into(),
            category: "Comunicação".into(),
            icon: "TrendingUp".into(),
        },
        Insight {
            id: "3".into(),
            title: "Gamificação de Ideias".into(),
            description: "Implemente um sistema de pontos e badges para engajar colaboradores.".into(),
            category: "Engajamento".into(),
            icon: "Sparkles".into(),
        },
    ]
}
