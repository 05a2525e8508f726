//! User identity — created lazily on first turn for a `(bot, external_id)`
//! pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declared user facts (filled in by [`crate::turn::TurnState`]'s
/// `Evolve` stage, fill-in-missing only — never overwritten).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserBasicInfo {
    pub fields: HashMap<String, String>,
}

impl UserBasicInfo {
    /// Fill in any keys not already present. Existing values are never
    /// overwritten.
    pub fn fill_missing(&mut self, updates: HashMap<String, String>) {
        for (k, v) in updates {
            self.fields.entry(k).or_insert(v);
        }
    }
}

/// Inferred-trait name → value, append-only and growable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserInferredProfile {
    pub traits: HashMap<String, String>,
}

impl UserInferredProfile {
    /// Append-only update: new keys are inserted, existing keys are
    /// overwritten with the freshest inference (the profile is allowed to
    /// *grow*, but a given trait's value always reflects the latest turn).
    pub fn append(&mut self, updates: HashMap<String, String>) {
        self.traits.extend(updates);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: uuid::Uuid,
    pub bot_id: uuid::Uuid,
    pub external_id: String,
    pub basic_info: UserBasicInfo,
    pub inferred_profile: UserInferredProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_missing_never_overwrites() {
        let mut info = UserBasicInfo::default();
        info.fields.insert("name".into(), "Alex".into());
        let mut updates = HashMap::new();
        updates.insert("name".into(), "Someone Else".into());
        updates.insert("city".into(), "Seattle".into());
        info.fill_missing(updates);
        assert_eq!(info.fields.get("name").unwrap(), "Alex");
        assert_eq!(info.fields.get("city").unwrap(), "Seattle");
    }

    #[test]
    fn inferred_profile_append_overwrites_with_latest() {
        let mut profile = UserInferredProfile::default();
        profile.traits.insert("mood".into(), "curious".into());
        let mut updates = HashMap::new();
        updates.insert("mood".into(), "anxious".into());
        profile.append(updates);
        assert_eq!(profile.traits.get("mood").unwrap(), "anxious");
    }
}
