//! The user-facing JSON web server. Routes hand image requests to the
//! `Gateway` and serve the static front end; every failure leaves as an
//! `ApiResponse` body

use crate::assets::AssetError;
use crate::config::Settings;
use crate::gateway::{Gateway, GatewayError};
use crate::intake::DecodeError;
use actix_cors::Cors;
use actix_web::error::JsonPayloadError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use protocol::ApiResponse;
use std::path::PathBuf;
use tracing::{error, warn};

pub mod protocol;
pub mod routes;

/// Directory the static routes read from
#[derive(Debug, Clone)]
pub struct StaticRoot(pub PathBuf);

#[derive(Debug)]
pub enum WebError {
    Gateway(GatewayError),
    NotFound,
    Internal(anyhow::Error),
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::Gateway(err) => write!(f, "{err}"),
            WebError::NotFound => write!(f, "not found"),
            WebError::Internal(err) => write!(f, "{err}"),
        }
    }
}

impl WebError {
    fn message(&self) -> String {
        match self {
            WebError::Gateway(err) => err.client_message(),
            WebError::NotFound => "Not found.".into(),
            WebError::Internal(err) => format!("Server error: {err}"),
        }
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {self}");
        } else {
            warn!("request rejected: {self}");
        }

        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .json(ApiResponse::error(self.message()))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            WebError::Gateway(err) => err.status_code(),
            WebError::NotFound => StatusCode::NOT_FOUND,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for WebError {
    fn from(err: GatewayError) -> WebError {
        WebError::Gateway(err)
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> WebError {
        WebError::Internal(err)
    }
}

impl From<AssetError> for WebError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::NotFound(_) => WebError::NotFound,
            AssetError::Io(err) => WebError::Internal(err.into()),
        }
    }
}

/// Bodies that fail to parse get the same JSON error shape as everything else
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let err = match err {
        JsonPayloadError::OverflowKnownLength { length, limit } => {
            GatewayError::Decode(DecodeError::PayloadTooLarge { len: length, limit })
        }
        JsonPayloadError::Overflow { limit } => {
            GatewayError::Decode(DecodeError::PayloadTooLarge {
                len: limit + 1,
                limit,
            })
        }
        err => GatewayError::MalformedBody(err.to_string()),
    };
    WebError::Gateway(err).into()
}

/// Register shared state, routes and extractor settings. Middleware is left
/// to the caller
pub fn configure(
    gateway: web::Data<Gateway>,
    static_root: StaticRoot,
    json_limit: usize,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(gateway)
            .app_data(web::Data::new(static_root))
            .app_data(
                web::JsonConfig::default()
                    .limit(json_limit)
                    .error_handler(json_error),
            )
            .service(routes::process_image)
            .service(routes::index)
            .service(routes::static_file);
    }
}

/// Lets a front end served from any origin call the API. Preflights are
/// answered with whatever method and headers they ask for
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

/// `configure` with everything taken from `settings`
pub fn configure_from_settings(
    settings: &Settings,
    gateway: web::Data<Gateway>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    configure(
        gateway,
        StaticRoot(settings.server.static_root.clone()),
        settings.json_body_limit(),
    )
}
