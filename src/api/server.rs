use std::net::SocketAddr;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::admin::*;
use crate::api::handler::*;
use crate::api::middleware::auth::{require_auth, verify_admin_ident};
use crate::api::middleware as mw;
use crate::constants::MAX_UPLOAD_BYTES;
use crate::db::prelude::*;
use crate::points::{PointService, PointsError};
use crate::storage::StorageErr;
use crate::util::env::{EnvErr, Var};
use crate::var;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db_pool: &'static PgPool,
    pub points: PointService,
}

#[instrument(skip(tx))]
pub async fn router(tx: UnboundedSender<SocketAddr>) {
    let db_pool = db_pool().await.unwrap();
    let state = Arc::new(AppState {
        db_pool,
        points: PointService::new(db_pool),
    });

    let cors = mw::cors().await.unwrap();

    //
    // routes acting on behalf of an authenticated account
    let account_routes = Router::new()
        .route("/worksheets", post(upload_worksheet))
        .route("/worksheets/{id}", get(worksheet_detail))
        .route("/worksheets/{id}/download", get(download_worksheet))
        .route("/points/transfer", post(transfer_points))
        .route("/points/history", get(point_history))
        .route("/quizzes", post(create_quiz))
        .route("/quizzes/{id}/score", post(submit_quiz_score))
        .route("/follows/{id}", post(follow_account).delete(unfollow_account))
        .route("/follows/following", get(following))
        .route("/follows/followers", get(followers))
        .route_layer(middleware::from_fn(require_auth));

    //
    // admin surface, gated on the shared admin secret
    let admin_routes = Router::new()
        .route("/admin/accounts", post(create_account).get(list_accounts))
        .route("/admin/accounts/{id}", delete(delete_account))
        .route("/admin/accounts/{id}/points", patch(adjust_points))
        .route("/admin/worksheets/{id}", delete(delete_worksheet))
        .route("/admin/quizzes/{id}", delete(delete_quiz))
        .route_layer(middleware::from_fn(verify_admin_ident));

    let app = Router::new()
        .merge(account_routes)
        .merge(admin_routes)
        //
        // public reads
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/worksheets", get(list_worksheets))
        .route("/quizzes", get(list_quizzes))
        .route("/quizzes/{id}", get(quiz_detail))
        .route("/quizzes/leaderboard/weekly", get(weekly_leaderboard))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(cors)
        .with_state(state);

    let port = var!(Var::ServerApiPort)
        .await
        .unwrap()
        .parse::<u16>()
        .unwrap();

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await.unwrap();

    tx.send(socket_addr).unwrap();
    axum::serve(listener, app).await.unwrap()
}

/// Custom error trace handler for `RouteError`-type responses
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument(skip(tx, rx))]
pub async fn start_server(
    tx: UnboundedSender<SocketAddr>,
    mut rx: UnboundedReceiver<SocketAddr>,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting server");
    let server_handle = tokio::task::spawn(async move {
        router(tx).await;
    });

    let logging_handle = tokio::task::spawn(async move {
        while !rx.is_closed() {
            if let Some(msg) = rx.recv().await {
                tracing::info!(
                    server_url = &format!("http://127.0.0.1:{}", msg.port()),
                    "server ready"
                );
                break;
            }
        }
    });

    let handles = vec![server_handle, logging_handle];
    Ok(handles)
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{0}")]
    Validation(String),

    #[error("no such {0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Points(#[from] PointsError),

    #[error(transparent)]
    Storage(#[from] StorageErr),

    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error(transparent)]
    SqlxError(#[from] sqlx::error::Error),

    #[error(transparent)]
    EnvError(#[from] EnvErr),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message, err) = match &self {
            RouteError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),

            RouteError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("no such {what}"), None)
            }

            RouteError::Multipart(error) => {
                (StatusCode::BAD_REQUEST, error.to_string(), None)
            }

            RouteError::Points(points_err) => match points_err {
                PointsError::InvalidAmount
                | PointsError::ZeroAmount
                | PointsError::SelfTransfer
                | PointsError::NotFollowing => {
                    (StatusCode::BAD_REQUEST, points_err.to_string(), None)
                }
                PointsError::InsufficientBalance { .. } => {
                    (StatusCode::BAD_REQUEST, points_err.to_string(), None)
                }
                PointsError::AccountNotFound => {
                    (StatusCode::NOT_FOUND, points_err.to_string(), None)
                }
                PointsError::AlreadyPaid(_) => {
                    (StatusCode::CONFLICT, points_err.to_string(), None)
                }
                PointsError::Db(error) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error.to_string(),
                    Some(self),
                ),
            },

            RouteError::Storage(storage_err) => match storage_err {
                StorageErr::DriveNotConnected => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    storage_err.to_string(),
                    Some(self),
                ),
                StorageErr::UpstreamErr { .. } | StorageErr::MalformedResponse(_) => (
                    StatusCode::BAD_GATEWAY,
                    storage_err.to_string(),
                    Some(self),
                ),
                StorageErr::ReqwestError(_) | StorageErr::EnvError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    storage_err.to_string(),
                    Some(self),
                ),
            },

            RouteError::SqlxError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                Some(self),
            ),

            RouteError::EnvError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                Some(self),
            ),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn status_of(err: RouteError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_policy_violations_are_client_errors() {
        assert_eq!(
            status_of(RouteError::Points(PointsError::SelfTransfer)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RouteError::Points(PointsError::NotFollowing)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RouteError::Points(PointsError::InsufficientBalance {
                needed: 108,
                available: 50
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RouteError::Validation("title must not be empty".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_missing_resources_are_404() {
        assert_eq!(
            status_of(RouteError::Points(PointsError::AccountNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RouteError::NotFound("worksheet")),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_double_payout_is_conflict() {
        assert_eq!(
            status_of(RouteError::Points(PointsError::AlreadyPaid(
                "2026-08-17".into()
            ))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_upstream_storage_failures_are_gateway_errors() {
        assert_eq!(
            status_of(RouteError::Storage(StorageErr::UpstreamErr {
                status: 500,
                body: serde_json::Value::Null
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(RouteError::Storage(StorageErr::DriveNotConnected)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_infra_failures_are_500() {
        assert_eq!(
            status_of(RouteError::SqlxError(sqlx::Error::PoolClosed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
