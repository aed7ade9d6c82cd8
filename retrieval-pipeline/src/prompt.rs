use std::fmt::Write as _;

use common::storage::types::{
    chat_exchange::ChatExchange, content_unit::ContentCategory, profile::Profile,
};
use tracing::debug;

use crate::retrieval::{RetrievalResult, RetrievedEntry};

/// Rendered in place of the history block when there is none.
pub const NO_HISTORY_MARKER: &str = "No previous conversation.";

const NOT_CONFIGURED: &str = "Not configured";

/// Context entries kept when the search was not bound to an owner.
const SIMPLE_CONTEXT_CAP: usize = 3;

/// Prompt sections in render order with their heading and entry cap.
const SECTIONS: [(ContentCategory, &str, usize); 4] = [
    (ContentCategory::Document, "Knowledge Base Information", 5),
    (ContentCategory::Project, "Project Information", 3),
    (ContentCategory::Conversation, "Relevant Previous Conversations", 2),
    (ContentCategory::Profile, "Additional Profile Information", 3),
];

/// Builds the system prompt handed to the chat model.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    history_limit: usize,
}

impl PromptAssembler {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Renders persona rules, grounding context and recent history into one system prompt.
    ///
    /// `retrieval.entries` must already be sorted by distance; each section keeps the closest
    /// entries up to its cap. History may arrive in any order and is rendered oldest first.
    pub fn assemble(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
        profile: &Profile,
        history: &[ChatExchange],
    ) -> String {
        let name = profile.name.as_str();
        let context = if retrieval.owner_scoped {
            render_sections(&retrieval.entries)
        } else {
            render_simple(&retrieval.entries)
        };
        let has_documents = retrieval.has_category(ContentCategory::Document);

        let mut prompt = format!(
            "You are {name}'s personal AI clone. You should embody {name}'s personality, knowledge, \
             and experiences based on the following information:\n\n\
             Profile Information:\n\
             - Name: {name}\n\
             - Location: {location}\n\
             - Bio: {bio}\n\
             - Skills: {skills}\n\
             - Experience: {experience}\n\
             - Interests: {interests}\n\
             {context}\n\
             Meeting Scheduling:\n\
             - Calendly Link: {link}\n\
             - Meeting Rules: {rules}\n\n",
            location = profile.location,
            bio = profile.bio,
            skills = profile.skills,
            experience = profile.experience,
            interests = profile.interests,
            link = profile.calendly_link.as_deref().unwrap_or(NOT_CONFIGURED),
            rules = profile.meeting_rules.as_deref().unwrap_or(NOT_CONFIGURED),
        );

        prompt.push_str(&instructions(name, has_documents));
        prompt.push_str("\nRecent conversation history:\n");
        prompt.push_str(&self.render_history(name, history));

        debug!(
            query_chars = query.chars().count(),
            entries = retrieval.entries.len(),
            history = history.len(),
            has_documents,
            prompt_chars = prompt.chars().count(),
            "assembled system prompt"
        );

        prompt
    }

    fn render_history(&self, name: &str, history: &[ChatExchange]) -> String {
        if history.is_empty() || self.history_limit == 0 {
            return NO_HISTORY_MARKER.to_string();
        }

        let mut ordered: Vec<&ChatExchange> = history.iter().collect();
        ordered.sort_by_key(|e| e.created_at);
        let skip = ordered.len().saturating_sub(self.history_limit);

        let mut out = String::new();
        for exchange in ordered.into_iter().skip(skip) {
            let _ = writeln!(out, "Visitor: {}", exchange.message);
            let _ = writeln!(out, "{name}: {}", exchange.response);
        }
        out
    }
}

fn render_entry(entry: &RetrievedEntry) -> String {
    match (entry.category, entry.subcategory.as_str()) {
        (ContentCategory::Document, "title") => format!("Document Title: {}", entry.text),
        (ContentCategory::Document, "description") => {
            format!("Document Description: {}", entry.text)
        }
        (ContentCategory::Document, "content") => {
            let text = entry
                .text
                .strip_prefix("Document Title:")
                .unwrap_or(&entry.text);
            format!("Content: {}", strip_page_markers(text).trim())
        }
        (_, subcategory) => format!("{subcategory}: {}", entry.text),
    }
}

fn strip_page_markers(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let line = line.trim();
            !(line.starts_with("--- Page") && line.ends_with("---"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_sections(entries: &[RetrievedEntry]) -> String {
    let mut out = String::new();
    for (category, heading, cap) in SECTIONS {
        let lines: Vec<String> = entries
            .iter()
            .filter(|e| e.category == category)
            .take(cap)
            .map(render_entry)
            .collect();
        if lines.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{heading}:");
        for line in lines {
            let _ = writeln!(out, "- {line}");
        }
    }
    out
}

fn render_simple(entries: &[RetrievedEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nRelevant Context:\n");
    for entry in entries.iter().take(SIMPLE_CONTEXT_CAP) {
        let _ = writeln!(out, "- {}", render_entry(entry));
    }
    out
}

fn instructions(name: &str, has_documents: bool) -> String {
    let knowledge = if has_documents {
        "7. When asked about technical or specialized topics, use the Knowledge Base information \
         as part of your own expertise.\n\
         8. Weave that knowledge into your answers naturally, without mentioning documents or \
         where the information came from.\n"
    } else {
        "7. If asked about documents or specialized knowledge that is not in your profile, answer \
         only from the profile information above.\n"
    };

    format!(
        "Important Instructions:\n\
         1. Always respond as {name}, in the first person (\"I\", \"my\", \"me\"). Never say or \
         imply that you are an AI, a bot or a language model.\n\
         2. Only state facts that appear in the profile or context sections above. Never invent \
         experiences, employers, dates or projects.\n\
         3. When asked about something not covered above, steer the conversation politely toward \
         what you can talk about instead of admitting ignorance or apologizing.\n\
         4. Stay consistent with what you said earlier in the conversation history below.\n\
         5. Keep a professional but conversational tone that fits {name}'s background.\n\
         6. For meeting requests: share the Calendly link only when the request fits the meeting \
         rules, explain the meeting policy when it does not, and say online scheduling is not \
         available when no link is configured.\n\
         {knowledge}"
    )
}
