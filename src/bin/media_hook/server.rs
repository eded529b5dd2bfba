use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use axum::extract::{FromRequest, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use colored::Colorize;
use serde::Deserialize;
use serde_json::json;

use media_sort::organizer::{Config, Organizer, Reporter, RunLog};
use media_sort::print_error;

/// Shared server state.
pub struct HookState {
    config: Config,
    /// Organize runs share the cache and history files, so only one may run at a time.
    run_lock: Mutex<()>,
}

/// Body of a `/copy_torrent` request, sent as JSON or as a form.
#[derive(Debug, Default, Deserialize)]
struct CopyTorrentRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    folder: Option<String>,
}

impl HookState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Organize the given folder into the configured output directory.
    fn process(&self, folder: &str) -> Result<Vec<String>> {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let source = media_sort::resolve_input_path(Some(Path::new(folder)))?;
        let reporter = Reporter::new(self.config.verbose).with_log(RunLog::open(&self.config.log_path())?);
        let mut organizer = Organizer::from_config(&self.config, reporter)?;
        organizer.run(&source, &self.config.output_directory)
    }
}

pub fn create_app(state: Arc<HookState>) -> Router {
    Router::new()
        .route("/copy_torrent", post(copy_torrent_handler))
        .with_state(state)
}

async fn copy_torrent_handler(State(state): State<Arc<HookState>>, request: Request) -> Response {
    let payload = match parse_request(request).await {
        Ok(payload) => payload,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let (Some(category), Some(folder)) = (non_empty(payload.category), non_empty(payload.folder)) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required parameters (category, folder)");
    };
    let name = non_empty(payload.name).unwrap_or_else(|| folder.clone());

    if !state.config.is_allowed_category(&category) {
        println!("{}", format!("Category '{category}' not allowed, ignoring: {name}").dimmed());
        return (
            StatusCode::OK,
            Json(json!({
                "status": "ignored",
                "message": format!("Category not allowed: {category}"),
            })),
        )
            .into_response();
    }

    println!("{} {name}", format!("Category '{category}':").bold());
    let task_state = Arc::clone(&state);
    let task_folder = folder.clone();
    let result = tokio::task::spawn_blocking(move || task_state.process(&task_folder))
        .await
        .unwrap_or_else(|error| Err(anyhow::anyhow!("Organize task failed: {error}")));

    match result {
        Ok(written) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": format!("Processed {name}"),
                "folder": folder,
                "processed": written.len(),
            })),
        )
            .into_response(),
        Err(error) => {
            print_error!("Failed to process {folder}: {error:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": format!("{error:#}"),
                })),
            )
                .into_response()
        }
    }
}

/// Read the request body as JSON when the content type says so, otherwise as a form.
async fn parse_request(request: Request) -> Result<CopyTorrentRequest, String> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if is_json {
        Json::<CopyTorrentRequest>::from_request(request, &())
            .await
            .map(|Json(payload)| payload)
            .map_err(|rejection| rejection.body_text())
    } else {
        Form::<CopyTorrentRequest>::from_request(request, &())
            .await
            .map(|Form(payload)| payload)
            .map_err(|rejection| rejection.body_text())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
