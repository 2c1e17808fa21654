//! Request handlers. The image route forwards to the `Gateway`; the rest
//! serve files from the static root

use super::protocol::ProcessImageRequest;
use super::{StaticRoot, WebError};
use crate::assets::{self, Asset};
use crate::gateway::Gateway;
use actix_web::{get, post, web, HttpResponse, Responder};
use anyhow::anyhow;
use tracing::*;

type Result<T> = std::result::Result<T, WebError>;

#[post("/process_image")]
pub async fn process_image(
    req: web::Json<ProcessImageRequest>,
    gateway: web::Data<Gateway>,
) -> Result<impl Responder> {
    debug!("got {:?}", req);

    let res = gateway.handle_process_request(req.into_inner()).await?;

    info!("finished serving image request");
    Ok(web::Json(res))
}

#[get("/")]
pub async fn index(root: web::Data<StaticRoot>) -> Result<HttpResponse> {
    asset(root, String::new()).await
}

#[get("/{path:.*}")]
pub async fn static_file(
    path: web::Path<String>,
    root: web::Data<StaticRoot>,
) -> Result<HttpResponse> {
    asset(root, path.into_inner()).await
}

async fn asset(root: web::Data<StaticRoot>, path: String) -> Result<HttpResponse> {
    let Asset {
        bytes,
        content_type,
    } = web::block(move || assets::serve_asset(&root.0, &path))
        .await
        .map_err(|e| anyhow!("asset read task failed: {e}"))??;

    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}
