use common::storage::types::profile::Profile;
use tracing::debug;

/// Words that mark a message as a meeting request.
pub const MEETING_KEYWORDS: [&str; 6] = ["meet", "meeting", "schedule", "appointment", "discuss", "call"];

/// Endings accepted after a keyword stem ("meetings", "scheduling", "discussion", "calls").
/// Past tense is left out so "called" stays a plain word.
const KEYWORD_ENDINGS: [&str; 8] = ["", "e", "s", "es", "ing", "ings", "ion", "ions"];

/// Outcome of the meeting pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingDecision {
    /// Not a meeting request, or the owner has not configured scheduling.
    NotRequested,
    /// The request fits the owner's rules; carries the scheduling link itself.
    Share(String),
    /// The request falls outside the owner's rules.
    Decline(String),
}

impl MeetingDecision {
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::NotRequested => None,
            Self::Share(text) | Self::Decline(text) => Some(text),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_meeting_word(token: &str) -> bool {
    MEETING_KEYWORDS.iter().any(|keyword| {
        let stem = keyword.strip_suffix('e').unwrap_or(keyword);
        token
            .strip_prefix(stem)
            .is_some_and(|ending| KEYWORD_ENDINGS.contains(&ending))
    })
}

fn mentions_meeting(message: &str) -> bool {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(is_meeting_word)
}

/// Short-circuits meeting requests when the owner configured both a link and rules.
///
/// Intent is a keyword check over whole words, allowing plural, "-ing" and "-ion" forms.
/// Rules are a comma-separated list of topics. The reply is the bare link when the message
/// mentions one of them, otherwise the visitor gets a polite decline listing the topics.
pub fn evaluate_meeting_request(message: &str, profile: &Profile) -> MeetingDecision {
    let (Some(link), Some(rules)) = (
        non_blank(profile.calendly_link.as_deref()),
        non_blank(profile.meeting_rules.as_deref()),
    ) else {
        return MeetingDecision::NotRequested;
    };

    if !mentions_meeting(message) {
        return MeetingDecision::NotRequested;
    }

    let topics: Vec<&str> = rules
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    let lowered = message.to_lowercase();
    let matched = topics
        .iter()
        .find(|topic| lowered.contains(&topic.to_lowercase()));

    debug!(matched = matched.is_some(), topics = topics.len(), "meeting request detected");

    match matched {
        Some(_) => MeetingDecision::Share(link.to_string()),
        None => MeetingDecision::Decline(format!(
            "Thanks for reaching out! I only take meetings about the following topics: {}. \
             If your request fits one of them, let me know a bit more and I'll share my scheduling link.",
            topics.join(", ")
        )),
    }
}
