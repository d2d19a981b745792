use percent_encoding::percent_decode_str;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::path::Tail;
use warp::{Filter, Reply};

use crate::error::{Result, SchedulerError};
use crate::monitoring::Metrics;

pub struct HttpServer {
    images_path: PathBuf,
    metrics: Arc<Metrics>,
    port: u16,
}

impl HttpServer {
    pub fn new(images_path: PathBuf, metrics: Arc<Metrics>, port: u16) -> Self {
        Self {
            images_path,
            metrics,
            port,
        }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone + Send + Sync + 'static
    {
        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::with_status("OK", StatusCode::OK));

        let metrics = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| match Metrics::get_prometheus_metrics() {
                Ok(metrics_text) => warp::reply::with_header(
                    metrics_text,
                    "content-type",
                    "text/plain; version=0.0.4; charset=utf-8",
                ),
                Err(e) => {
                    tracing::error!("Failed to generate Prometheus metrics: {}", e);
                    warp::reply::with_header(
                        "# Unable to generate metrics".to_string(),
                        "content-type",
                        "text/plain; version=0.0.4; charset=utf-8",
                    )
                }
            });

        let snapshot_metrics = self.metrics.clone();
        let json_metrics = warp::path("metrics")
            .and(warp::path("json"))
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let metrics = snapshot_metrics.clone();
                async move {
                    let snapshot = metrics.get_snapshot().await;
                    let response = json!({
                        "cycles_unchanged": snapshot.cycles_unchanged,
                        "cycles_published": snapshot.cycles_published,
                        "cycles_failed": snapshot.cycles_failed,
                        "cycles_panicked": snapshot.cycles_panicked,
                        "cycles_in_flight": snapshot.cycles_in_flight,
                        "upstream_failures": snapshot.upstream_failures,
                        "store_errors": snapshot.store_errors,
                        "notifications_sent": snapshot.notifications_sent,
                        "notifications_failed": snapshot.notifications_failed,
                        "publish_fallbacks": snapshot.publish_fallbacks,
                        "uptime_seconds": snapshot.uptime_seconds,
                        "last_cycle": snapshot.last_cycle_time
                    });

                    Ok::<_, Infallible>(warp::reply::json(&response))
                }
            });

        let images_dir = Arc::new(self.images_path.clone());
        let images = warp::path("images")
            .and(warp::path::tail())
            .and(warp::get())
            .and_then(move |tail: Tail| {
                let images_dir = images_dir.clone();
                async move { Ok::<_, Infallible>(serve_image(&images_dir, tail.as_str()).await) }
            });

        health
            .or(json_metrics)
            .or(metrics)
            .or(images)
            .with(warp::log::custom(|info| {
                info!(
                    "Request completed: {} {} -> {} - took {:?}",
                    info.method(),
                    info.path(),
                    info.status().as_u16(),
                    info.elapsed()
                );
            }))
    }

    /// Binds the listener and returns the server future
    ///
    /// The future resolves once `shutdown` is cancelled and open requests
    /// have completed.
    pub fn bind(
        &self,
        shutdown: CancellationToken,
    ) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)> {
        let routes = self.routes();

        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(([0, 0, 0, 0], self.port), async move {
                shutdown.cancelled().await;
                info!("HTTP server received shutdown signal");
            })
            .map_err(|e| {
                SchedulerError::Server(format!("Failed to bind port {}: {e}", self.port))
            })?;

        info!("HTTP server listening on {}", addr);
        Ok((addr, server))
    }
}

/// Resolves a request path below the images directory
///
/// Returns `None` when the path would leave the directory.
pub fn sanitize_relative_path(requested: &str) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();

    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(resolved)
}

pub async fn serve_image(images_dir: &Path, raw_path: &str) -> warp::reply::Response {
    let requested = match percent_decode_str(raw_path).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => {
            debug!("Image path is not valid UTF-8: {}", raw_path);
            return warp::reply::with_status("Bad Request", StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    let Some(relative) = sanitize_relative_path(&requested) else {
        warn!(
            "Security check failed: {} escapes {}",
            requested,
            images_dir.display()
        );
        return forbidden();
    };

    let full_path = images_dir.join(&relative);
    debug!("Serving image: {} (full path: {})", requested, full_path.display());

    let canonical = match tokio::fs::canonicalize(&full_path).await {
        Ok(path) => path,
        Err(_) => {
            debug!("Image not found: {}", full_path.display());
            return not_found();
        }
    };

    // Symlinks inside the directory may still point elsewhere
    match tokio::fs::canonicalize(images_dir).await {
        Ok(base) if canonical.starts_with(&base) => {}
        _ => {
            warn!(
                "Security check failed: {} resolves outside {}",
                full_path.display(),
                images_dir.display()
            );
            return forbidden();
        }
    }

    if !canonical.is_file() {
        debug!("Image path is not a file: {}", full_path.display());
        return not_found();
    }

    match tokio::fs::read(&canonical).await {
        Ok(contents) => {
            let mime = mime_guess::from_path(&canonical).first_or_octet_stream();
            warp::reply::with_header(contents, "content-type", mime.essence_str().to_string())
                .into_response()
        }
        Err(e) if e.kind() == ErrorKind::NotFound => not_found(),
        Err(e) => {
            warn!("Failed to read image {}: {}", full_path.display(), e);
            warp::reply::with_status("Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
    }
}

fn forbidden() -> warp::reply::Response {
    warp::reply::with_status("Forbidden", StatusCode::FORBIDDEN).into_response()
}

fn not_found() -> warp::reply::Response {
    warp::reply::with_status("Not Found", StatusCode::NOT_FOUND).into_response()
}
