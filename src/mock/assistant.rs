// src/mock/assistant.rs
//! Scripted innovation assistant
//!
//! Answers chat messages by keyword, checked in order: idea, map, project.

use serde::{Deserialize, Serialize};

use crate::mock::dataset::iso_now;

const IDEA_REPLY: &str = "Para estruturar sua ideia, considere: 1) Qual problema resolve? 2) Qual o impacto esperado? 3) Como medir o sucesso? Posso ajudar você a desenvolver um canvas da inovação!";
const MAP_REPLY: &str = "O mapa de ideias é uma ótima ferramenta! Sugiro adicionar coordenadas geográficas às suas ideias para visualizar a distribuição de inovações pela empresa.";
const PROJECT_REPLY: &str = "Ótimo! Para transformar uma ideia em projeto, defina: escopo, cronograma, recursos necessários e KPIs. Quer que eu ajude a criar um plano de implementação?";
const DEFAULT_REPLY: &str = "Entendi! Como posso ajudar você a inovar hoje? Posso sugerir estruturas para suas ideias, dicas de implementação ou estratégias de engajamento.";

const KEYWORDS: [(&str, &str); 3] = [
    ("ideia", IDEA_REPLY),
    ("mapa", MAP_REPLY),
    ("projeto", PROJECT_REPLY),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub timestamp: String,
}

/// Pick the scripted answer for `message`
pub fn reply_text(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_REPLY)
}

/// Answer `message` with a timestamped reply
pub fn respond(message: &str) -> ChatReply {
    ChatReply {
        message: reply_text(message).to_string(),
        timestamp: iso_now(),
    }
}
