//! Editable landing page document.
//!
//! Stored as JSON under a key, tagged with a `version`. Older documents are
//! upgraded when read; writes must already match the current shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

pub const CURRENT_VERSION: u32 = 2;
pub const DEFAULT_KEY: &str = "default";

fn current_version() -> u32 {
    CURRENT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LandingContent {
    #[serde(default = "current_version")]
    pub version: u32,
    pub hero: Hero,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    /// Product slugs shown in the featured strip, in order.
    #[serde(default)]
    pub featured_slugs: Vec<String>,
    #[serde(default)]
    pub banners: Vec<Banner>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Hero {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub cta_label: Option<String>,
    #[serde(default)]
    pub cta_href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Highlight {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Banner {
    pub image_url: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

impl Default for LandingContent {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            hero: Hero {
                title: "Solid Choice".to_string(),
                subtitle: Some("Estilo e qualidade para o seu dia a dia".to_string()),
                image_url: None,
                cta_label: Some("Ver produtos".to_string()),
                cta_href: Some("/produtos".to_string()),
            },
            highlights: Vec::new(),
            featured_slugs: Vec::new(),
            banners: Vec::new(),
        }
    }
}

/// Flat layout used before documents carried a version.
#[derive(Debug, Default, Deserialize)]
struct LandingV1 {
    hero_title: Option<String>,
    hero_subtitle: Option<String>,
    hero_image: Option<String>,
    cta_text: Option<String>,
    cta_link: Option<String>,
    #[serde(default)]
    featured: Vec<String>,
    #[serde(default)]
    highlights: Vec<String>,
}

impl From<LandingV1> for LandingContent {
    fn from(v1: LandingV1) -> Self {
        let defaults = LandingContent::default();
        let title = v1
            .hero_title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.hero.title);
        Self {
            version: CURRENT_VERSION,
            hero: Hero {
                title,
                subtitle: v1.hero_subtitle,
                image_url: v1.hero_image,
                cta_label: v1.cta_text,
                cta_href: v1.cta_link,
            },
            highlights: v1
                .highlights
                .into_iter()
                .filter(|h| !h.trim().is_empty())
                .map(|title| Highlight {
                    title,
                    description: None,
                    icon: None,
                })
                .collect(),
            featured_slugs: v1.featured,
            banners: Vec::new(),
        }
    }
}

fn version_of(document: &Value) -> AppResult<u32> {
    match document.get("version") {
        None | Some(Value::Null) => Ok(1),
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| AppError::BadRequest("landing version must be a positive integer".into())),
    }
}

fn invalid(err: serde_json::Error) -> AppError {
    AppError::BadRequest(format!("invalid landing content: {err}"))
}

/// Bring a stored document of any known version up to the current schema.
pub fn migrate(document: Value) -> AppResult<LandingContent> {
    match version_of(&document)? {
        1 => {
            let v1: LandingV1 = serde_json::from_value(document).map_err(invalid)?;
            Ok(v1.into())
        }
        CURRENT_VERSION => serde_json::from_value(document).map_err(invalid),
        other => Err(AppError::BadRequest(format!(
            "unsupported landing content version {other}"
        ))),
    }
}

/// Accept an admin edit only if it already matches the current schema.
pub fn validate(document: Value) -> AppResult<LandingContent> {
    let version = match document.get("version") {
        None | Some(Value::Null) => CURRENT_VERSION,
        Some(_) => version_of(&document)?,
    };
    if version != CURRENT_VERSION {
        return Err(AppError::BadRequest(format!(
            "landing content must use version {CURRENT_VERSION}"
        )));
    }

    let mut content: LandingContent = serde_json::from_value(document).map_err(invalid)?;
    content.version = CURRENT_VERSION;
    content.hero.title = content.hero.title.trim().to_string();
    if content.hero.title.is_empty() {
        return Err(AppError::BadRequest("hero.title is required".into()));
    }
    content.featured_slugs.retain(|slug| !slug.trim().is_empty());
    Ok(content)
}
