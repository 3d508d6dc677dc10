use axum::{
    body::Bytes,
    extract::{Multipart, Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, warn};

use super::{error::AppError, pages, AppState};
use crate::auth::SessionState;
use crate::catalog::PhotoRecord;
use crate::upload;

/// Session key holding the client's [`SessionState`].
pub const SESSION_STATE_KEY: &str = "session_state";

async fn session_state(session: &Session) -> Result<SessionState, AppError> {
    Ok(session
        .get::<SessionState>(SESSION_STATE_KEY)
        .await?
        .unwrap_or_default())
}

/// Gate for every `/admin` route. Unreadable sessions count as anonymous.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let current = match session_state(&session).await {
        Ok(current) => current,
        Err(e) => {
            error!(error = %e, "Failed to read session, treating as anonymous");
            SessionState::Anonymous
        }
    };

    match state.guard.require(current) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            info!(path = %request.uri().path(), reason = %e, "Admin access denied");
            Redirect::to("/login").into_response()
        }
    }
}

// ============================================================================
// Public pages
// ============================================================================

async fn render_template(state: &AppState, name: &str) -> Result<Html<String>, AppError> {
    let path = state.templates_dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Html(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::PageNotFound(name.to_string()))
        }
        Err(e) => Err(AppError::Page(e)),
    }
}

pub async fn index_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    render_template(&state, "web6.html").await
}

pub async fn atre_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    render_template(&state, "atre.html").await
}

pub async fn yodobashi_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    render_template(&state, "yodobashi.html").await
}

pub async fn list_photos(State(state): State<AppState>) -> Result<Json<Vec<PhotoRecord>>, AppError> {
    let photos = state.catalog.list()?;
    info!(count = photos.len(), "Listing photos");
    Ok(Json(photos))
}

pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PhotoRecord>, AppError> {
    Ok(Json(state.catalog.get(id)?))
}

pub async fn health(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.catalog.list()?;
    Ok("ok")
}

// ============================================================================
// Login / logout
// ============================================================================

/// Absent fields read as empty and fail the credential check.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login_form() -> Html<String> {
    Html(pages::login_page(None))
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let mut current = session_state(&session).await?;
    let was_authenticated = current == SessionState::Authenticated;

    match state.guard.login(&mut current, &form.username, &form.password) {
        Ok(()) => {
            session.cycle_id().await?;
            session.insert(SESSION_STATE_KEY, current).await?;
            info!(username = %form.username, "Admin logged in");
            Ok(Redirect::to("/admin").into_response())
        }
        Err(e) => {
            if was_authenticated {
                session.flush().await?;
            }
            warn!(username = %form.username, reason = %e, "Admin login failed");
            let page = pages::login_page(Some("Invalid username or password"));
            Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    let mut current = match session_state(&session).await {
        Ok(current) => current,
        Err(e) => {
            warn!(error = %e, "Failed to read session on logout");
            SessionState::Anonymous
        }
    };

    if let Err(e) = session.flush().await {
        // The record may survive; make sure it no longer grants access.
        error!(error = %e, "Failed to destroy session on logout");
        state.guard.logout(&mut current);
        session.insert(SESSION_STATE_KEY, current).await?;
    }

    info!("Admin logged out");
    Ok(Redirect::to("/login"))
}

// ============================================================================
// Admin
// ============================================================================

pub async fn admin_panel(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let photos = state.catalog.list()?;
    Ok(Html(pages::admin_page(&photos)))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut filename = String::new();
    let mut content = Bytes::new();
    let mut caption = String::new();

    while let Some(field) = multipart.next_field().await.map_err(AppError::from_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                filename = field.file_name().unwrap_or_default().to_string();
                content = field.bytes().await.map_err(AppError::from_multipart)?;
            }
            "caption" => {
                caption = field.text().await.map_err(AppError::from_multipart)?;
            }
            _ => {}
        }
    }

    let record = upload::accept(&state.gate, &state.catalog, &filename, &content, &caption)?;
    info!(id = record.id, image_path = %record.image_path, "Photo uploaded");
    Ok(Redirect::to("/admin"))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    state.catalog.remove(id)?;
    Ok(Redirect::to("/admin"))
}

#[derive(Deserialize)]
pub struct EditForm {
    /// Absent reads as empty and is rejected as invalid input.
    #[serde(default)]
    caption: String,
}

pub async fn edit_caption(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<EditForm>,
) -> Result<Redirect, AppError> {
    state.catalog.update_caption(id, &form.caption)?;
    Ok(Redirect::to("/admin"))
}
