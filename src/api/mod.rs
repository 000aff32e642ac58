pub mod auth;
pub mod completed_trades;
pub mod deposits;
pub mod extract;
pub mod health;
pub mod orders;
pub mod positions;
pub mod users;

use crate::auth::{PasswordError, PasswordService, TokenIssuer};
use crate::config::Config;
use crate::db::Repository;
use crate::mail::Mailer;
use crate::orchestration::{Ledger, PasswordReset};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub password_reset: Arc<PasswordReset>,
    pub tokens: Arc<TokenIssuer>,
    pub passwords: Arc<PasswordService>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, PasswordError> {
        let passwords = Arc::new(PasswordService::from_config(&config)?);
        let tokens = Arc::new(TokenIssuer::from_config(&config));
        let ledger = Arc::new(Ledger::new(repo.clone()));
        let password_reset = Arc::new(PasswordReset::new(
            repo.clone(),
            mailer,
            passwords.clone(),
            config.mail_from.clone(),
        ));

        Ok(Self {
            repo,
            config,
            ledger,
            password_reset,
            tokens,
            passwords,
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/token/refresh", post(auth::refresh_token))
        .route("/auth/token/verify", post(auth::verify_token))
        .route(
            "/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route(
            "/orders/:id",
            get(orders::get_order)
                .put(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/orders/:id/close", post(orders::close_order))
        .route("/completed-trades", get(completed_trades::list_trades))
        .route(
            "/completed-trades/:id",
            get(completed_trades::get_trade)
                .put(completed_trades::update_trade)
                .delete(completed_trades::delete_trade),
        )
        .route("/open-positions", get(positions::list_positions))
        .route("/open-positions/:id", get(positions::get_position))
        .route(
            "/deposits",
            get(deposits::list_deposits).post(deposits::create_deposit),
        )
        .route("/deposits/:id", get(deposits::get_deposit))
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
