use crate::{
    error::AppError, storage::db::SurrealDbClient, stored_object,
    utils::config::ProfileDefaults,
};

/// Placeholder used when neither the stored profile nor the configured defaults carry a value.
pub const NOT_PROVIDED: &str = "Not provided";
/// Persona name used when no layer names the owner.
pub const DEFAULT_PERSONA_NAME: &str = "AI Assistant";

// Record id is the owner id, one profile per owner.
stored_object!(Profile, "profile", {
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    skills: String,
    #[serde(default)]
    experience: String,
    #[serde(default)]
    interests: String,
    #[serde(default)]
    calendly_link: Option<String>,
    #[serde(default)]
    meeting_rules: Option<String>
});

/// Owner-editable profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub interests: String,
    #[serde(default)]
    pub calendly_link: Option<String>,
    #[serde(default)]
    pub meeting_rules: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// First non-blank value in precedence order.
fn resolve<'a>(layers: &[Option<&'a str>]) -> Option<&'a str> {
    layers.iter().copied().find_map(non_blank)
}

impl Profile {
    pub fn owner_id(&self) -> &str {
        &self.id
    }

    pub async fn get_for_owner(
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        Ok(db.get_item::<Self>(owner_id).await?)
    }

    /// Writes the owner's profile. `created_at` survives from the previous version, `updated_at`
    /// is refreshed on every write.
    pub async fn upsert_for_owner(
        owner_id: &str,
        update: ProfileUpdate,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let now = Utc::now();
        let created_at = Self::get_for_owner(owner_id, db)
            .await?
            .map_or(now, |existing| existing.created_at);

        let profile = Self {
            id: owner_id.to_string(),
            created_at,
            updated_at: now,
            name: update.name,
            location: update.location,
            bio: update.bio,
            skills: update.skills,
            experience: update.experience,
            interests: update.interests,
            calendly_link: non_blank(update.calendly_link.as_deref()).map(str::to_string),
            meeting_rules: non_blank(update.meeting_rules.as_deref()).map(str::to_string),
        };

        db.upsert_item(profile)
            .await?
            .ok_or_else(|| AppError::InternalError("profile upsert returned nothing".into()))
    }

    /// Resolves every field through stored profile, then configured defaults, then built-in
    /// placeholders. A layer only wins a field when its value is non-blank.
    pub fn merged(stored: Option<&Self>, owner_id: &str, defaults: &ProfileDefaults) -> Self {
        let now = Utc::now();
        let field = |pick: fn(&Self) -> &str, fallback: Option<&str>, placeholder: &str| {
            resolve(&[stored.map(pick), fallback])
                .unwrap_or(placeholder)
                .to_string()
        };
        let optional = |pick: fn(&Self) -> Option<&str>, fallback: Option<&str>| {
            resolve(&[stored.and_then(pick), fallback]).map(str::to_string)
        };

        Self {
            id: owner_id.to_string(),
            created_at: stored.map_or(now, |p| p.created_at),
            updated_at: stored.map_or(now, |p| p.updated_at),
            name: field(|p| &p.name, defaults.name.as_deref(), DEFAULT_PERSONA_NAME),
            location: field(|p| &p.location, defaults.location.as_deref(), NOT_PROVIDED),
            bio: field(|p| &p.bio, defaults.bio.as_deref(), NOT_PROVIDED),
            skills: field(|p| &p.skills, defaults.skills.as_deref(), NOT_PROVIDED),
            experience: field(|p| &p.experience, defaults.experience.as_deref(), NOT_PROVIDED),
            interests: field(|p| &p.interests, defaults.interests.as_deref(), NOT_PROVIDED),
            calendly_link: optional(|p| p.calendly_link.as_deref(), defaults.calendly_link.as_deref()),
            meeting_rules: optional(|p| p.meeting_rules.as_deref(), defaults.meeting_rules.as_deref()),
        }
    }

    /// Field label and value pairs that carry real content, in indexing order.
    pub fn indexable_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("name", self.name.as_str()),
            ("location", self.location.as_str()),
            ("bio", self.bio.as_str()),
            ("skills", self.skills.as_str()),
            ("experience", self.experience.as_str()),
            ("interests", self.interests.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty() && *value != NOT_PROVIDED)
        .collect()
    }
}
