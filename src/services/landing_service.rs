use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};
use serde_json::Value;

use crate::{
    audit,
    entity::landing_content::{ActiveModel, Column, Entity as LandingRows},
    error::{AppError, AppResult},
    landing::{self, DEFAULT_KEY, LandingContent},
    middleware::auth::AdminUser,
    response::OkResponse,
    state::AppState,
};

/// Current landing document. A missing row or one that no longer parses
/// yields the built-in default so the storefront always renders.
pub async fn get_landing(state: &AppState) -> AppResult<LandingContent> {
    let Some(row) = LandingRows::find_by_id(DEFAULT_KEY.to_string())
        .one(&state.orm)
        .await?
    else {
        return Ok(LandingContent::default());
    };

    match landing::migrate(row.content) {
        Ok(content) => Ok(content),
        Err(err) => {
            tracing::warn!(error = %err, key = DEFAULT_KEY, "stored landing content unreadable");
            Ok(LandingContent::default())
        }
    }
}

pub async fn save_landing(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    document: Value,
) -> AppResult<OkResponse> {
    let content = landing::validate(document)?;
    let stored = serde_json::to_value(&content).map_err(|e| AppError::Internal(e.into()))?;

    let row = ActiveModel {
        key: Set(DEFAULT_KEY.to_string()),
        content: Set(stored),
        updated_at: Set(Utc::now().into()),
    };
    LandingRows::insert(row)
        .on_conflict(
            OnConflict::column(Column::Key)
                .update_columns([Column::Content, Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(&state.orm)
        .await?;

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "landing_update",
        "landing_content",
        serde_json::json!({ "key": DEFAULT_KEY, "version": content.version }),
    )
    .await;

    Ok(OkResponse::ok())
}
