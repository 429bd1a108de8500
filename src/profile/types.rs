//! Profile metadata document and the additive merge into a contact.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::contacts::Contact;

/// Parsed content of a profile metadata event.
///
/// Non-string values in the well-known fields are treated as absent so
/// one odd field does not discard the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    /// Short handle.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Preferred display name.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Camel-case spelling some clients write next to `display_name`.
    #[serde(
        default,
        rename = "displayName",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name_camel: Option<String>,
    /// Avatar URL.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Bio.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    /// Mail address the profile claims.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// NIP-05 identifier.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
    /// Every other key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ProfileMetadata {
    /// Display name to show: `display_name`, then `displayName`, then `name`.
    #[must_use]
    pub fn preferred_name(&self) -> Option<&str> {
        present(self.display_name.as_ref())
            .or_else(|| present(self.display_name_camel.as_ref()))
            .or_else(|| present(self.name.as_ref()))
    }

    /// Merges this profile into `contact`.
    ///
    /// Present fields overwrite, absent or blank fields leave the local
    /// value alone. Extension keys merge one by one. Returns `true` if the
    /// contact changed; `updated_at` is only bumped in that case.
    pub fn merge_into(&self, contact: &mut Contact, now: i64) -> bool {
        let mut changed = false;

        if let Some(name) = self.preferred_name() {
            changed |= assign(&mut contact.display_name, name);
        }

        if let Some(picture) = present(self.picture.as_ref()) {
            if contact.picture_url.as_deref() != Some(picture) {
                contact.picture_url = Some(picture.to_string());
                // The cached avatar belongs to the old URL
                contact.picture_cache = None;
                changed = true;
            }
        }

        if let Some(about) = present(self.about.as_ref()) {
            changed |= assign_opt(&mut contact.about, about);
        }

        if let Some(email) = present(self.email.as_ref()) {
            changed |= assign_opt(&mut contact.email, email);
        } else if contact.email.is_none() {
            // `_@domain` names the domain, not a mailbox
            if let Some(nip05) = present(self.nip05.as_ref())
                .filter(|s| s.contains('@') && !s.starts_with("_@"))
            {
                contact.email = Some(nip05.to_string());
                changed = true;
            }
        }

        if let Some(nip05) = present(self.nip05.as_ref()) {
            changed |= merge_extra(contact, "nip05", &Value::String(nip05.to_string()));
        }

        for (key, value) in &self.extra {
            if is_blank(value) {
                continue;
            }
            changed |= merge_extra(contact, key, value);
        }

        if changed {
            contact.updated_at = now;
        }
        changed
    }
}

fn assign(slot: &mut String, value: &str) -> bool {
    if slot == value {
        false
    } else {
        value.clone_into(slot);
        true
    }
}

fn assign_opt(slot: &mut Option<String>, value: &str) -> bool {
    if slot.as_deref() == Some(value) {
        false
    } else {
        *slot = Some(value.to_string());
        true
    }
}

fn merge_extra(contact: &mut Contact, key: &str, value: &Value) -> bool {
    if contact.metadata.get(key) == Some(value) {
        false
    } else {
        contact.metadata.insert(key.to_string(), value.clone());
        true
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
