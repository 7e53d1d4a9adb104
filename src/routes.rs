use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::middleware::JwtSecret;
use crate::notify::routes as notification_routes;
use crate::push::routes as push_routes;
use crate::questions::routes as question_routes;
use crate::questions::views;
use crate::questions::votes;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on push token registration: 10 requests per minute per IP.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(6) // 1 token every 6 seconds = 10 per minute
            .burst_size(10)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let push_token_routes = Router::new()
        .route(
            "/api/push/tokens",
            axum::routing::post(push_routes::register_token),
        )
        .route(
            "/api/push/tokens/{token}",
            axum::routing::delete(push_routes::revoke_token),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    let question_api = Router::new()
        .route(
            "/api/questions",
            axum::routing::post(question_routes::create_question),
        )
        .route(
            "/api/questions/{question_id}/approve",
            axum::routing::post(question_routes::approve_question),
        )
        .route(
            "/api/questions/{question_id}/reject",
            axum::routing::post(question_routes::reject_question),
        )
        .route(
            "/api/questions/{question_id}/answers",
            axum::routing::post(question_routes::create_answer),
        )
        .route(
            "/api/questions/{question_id}/messages",
            axum::routing::post(question_routes::create_message),
        )
        .route(
            "/api/questions/{question_id}/view",
            axum::routing::post(views::record_view_handler),
        )
        .route(
            "/api/answers/{answer_id}",
            axum::routing::put(question_routes::edit_answer)
                .delete(question_routes::delete_answer),
        )
        .route(
            "/api/answers/{answer_id}/vote",
            axum::routing::post(votes::toggle_vote_handler),
        );

    let notification_api = Router::new()
        .route(
            "/api/notifications",
            axum::routing::get(notification_routes::list_notifications),
        )
        .route(
            "/api/notifications/read-all",
            axum::routing::post(notification_routes::mark_all_read),
        )
        .route(
            "/api/notifications/{notification_id}/read",
            axum::routing::post(notification_routes::mark_one_read),
        );

    Router::new()
        .merge(question_api)
        .merge(notification_api)
        .merge(push_token_routes)
        .route("/ws", axum::routing::get(ws_handler::ws_upgrade))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}
