//! Content profile registry
//!
//! Enumerates the discrete dimensions of a producible item (category,
//! delivery voice, visual style) and their valid value sets. The enumerated
//! profile set is the cross product of the three dimensions in lexicographic
//! order, which makes tie-breaking and the cold-start coverage guarantee
//! deterministic.
//!
//! Value sets live in the `settings` table as JSON arrays so operators can
//! tune the exploration space without a rebuild.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;

/// One producible content variant, identified by its tuple value
///
/// No surrogate key: equal tuples are the same profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentProfile {
    pub category: String,
    pub voice: String,
    pub visual_style: String,
}

impl ContentProfile {
    pub fn new(category: &str, voice: &str, visual_style: &str) -> Self {
        Self {
            category: category.to_string(),
            voice: voice.to_string(),
            visual_style: visual_style.to_string(),
        }
    }
}

impl fmt::Display for ContentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.voice, self.visual_style)
    }
}

/// The enumerated dimension value sets
#[derive(Debug, Clone)]
pub struct Registry {
    categories: Vec<String>,
    voices: Vec<String>,
    visual_styles: Vec<String>,
}

impl Registry {
    /// Build a registry from explicit value sets
    ///
    /// Values are sorted and deduplicated; an empty dimension means no
    /// profile can ever be produced, so it fails with `EmptyRegistry`.
    pub fn new(
        categories: Vec<String>,
        voices: Vec<String>,
        visual_styles: Vec<String>,
    ) -> Result<Self> {
        let mut registry = Self {
            categories,
            voices,
            visual_styles,
        };
        for dim in [
            &mut registry.categories,
            &mut registry.voices,
            &mut registry.visual_styles,
        ] {
            dim.sort();
            dim.dedup();
            if dim.is_empty() {
                return Err(Error::EmptyRegistry);
            }
        }
        Ok(registry)
    }

    /// Load value sets from the settings table
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let categories = load_dimension(pool, "categories").await?;
        let voices = load_dimension(pool, "voices").await?;
        let visual_styles = load_dimension(pool, "visual_styles").await?;
        Self::new(categories, voices, visual_styles)
    }

    /// Enumerate all profiles in lexicographic order
    pub fn profiles(&self) -> Vec<ContentProfile> {
        let mut out =
            Vec::with_capacity(self.categories.len() * self.voices.len() * self.visual_styles.len());
        for category in &self.categories {
            for voice in &self.voices {
                for visual_style in &self.visual_styles {
                    out.push(ContentProfile::new(category, voice, visual_style));
                }
            }
        }
        out
    }

    /// Whether a profile's every dimension value is enumerated
    pub fn contains(&self, profile: &ContentProfile) -> bool {
        self.categories.contains(&profile.category)
            && self.voices.contains(&profile.voice)
            && self.visual_styles.contains(&profile.visual_style)
    }

    pub fn len(&self) -> usize {
        self.categories.len() * self.voices.len() * self.visual_styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn load_dimension(pool: &SqlitePool, key: &str) -> Result<Vec<String>> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    let raw = raw.ok_or_else(|| Error::Config(format!("setting '{key}' is not initialized")))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("setting '{key}' is not a JSON string array: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_registry() -> Registry {
        Registry::new(
            vec!["creepy".into(), "lifehack".into()],
            vec!["voiceA".into()],
            vec!["anime".into(), "photoreal".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_profiles_are_the_lexicographic_cross_product() {
        let registry = small_registry();
        let profiles = registry.profiles();
        assert_eq!(profiles.len(), 4);
        assert_eq!(registry.len(), 4);

        let mut sorted = profiles.clone();
        sorted.sort();
        assert_eq!(profiles, sorted);
        assert_eq!(profiles[0], ContentProfile::new("creepy", "voiceA", "anime"));
        assert_eq!(
            profiles[3],
            ContentProfile::new("lifehack", "voiceA", "photoreal")
        );
    }

    #[test]
    fn test_membership() {
        let registry = small_registry();
        assert!(registry.contains(&ContentProfile::new("creepy", "voiceA", "photoreal")));
        assert!(!registry.contains(&ContentProfile::new("creepy", "voiceB", "photoreal")));
    }

    #[test]
    fn test_empty_dimension_is_rejected() {
        let err = Registry::new(vec!["creepy".into()], vec![], vec!["anime".into()]).unwrap_err();
        assert!(matches!(err, Error::EmptyRegistry));
    }

    #[test]
    fn test_duplicate_values_collapse() {
        let registry = Registry::new(
            vec!["creepy".into(), "creepy".into()],
            vec!["voiceA".into()],
            vec!["anime".into()],
        )
        .unwrap();
        assert_eq!(registry.len(), 1);
    }
}
