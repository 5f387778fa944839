//! Route definitions for the Fire Department Administration Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public, except /me)
        .nest("/auth", auth_routes(state))
        // Civilian portal
        .nest("/civilian", civilian_routes(state))
        // Protected routes
        .nest("/users", user_routes(state))
        .nest("/roles", role_routes(state))
        .nest("/inventory", inventory_routes(state))
        .nest("/vehicles", vehicle_routes(state))
        .nest("/reorders", reorder_routes(state))
        .nest("/logs", log_routes(state))
        .nest("/training-sessions", training_routes(state))
        .nest("/attendance", attendance_routes(state))
        .nest("/certificates", certificate_routes(state))
}

/// Bearer-token check for everything routed through `router`
fn protected(state: &AppState, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password", post(handlers::reset_password))
        .merge(protected(state, Router::new().route("/me", get(handlers::me))))
}

fn civilian_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::civilian_register))
        .route("/login", post(handlers::civilian_login))
        .merge(protected(
            state,
            Router::new().route(
                "/profile",
                get(handlers::get_civilian_profile).put(handlers::update_civilian_profile),
            ),
        ))
}

/// User management routes (protected)
fn user_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route("/", get(handlers::list_users).post(handlers::create_user))
            .route(
                "/:user_id",
                get(handlers::get_user)
                    .put(handlers::update_user)
                    .delete(handlers::delete_user),
            ),
    )
}

/// Role management routes (protected)
fn role_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route("/", get(handlers::list_roles).post(handlers::create_role))
            .route("/permissions", get(handlers::list_permissions))
            .route(
                "/:role_id",
                get(handlers::get_role)
                    .put(handlers::update_role)
                    .delete(handlers::delete_role),
            ),
    )
}

/// Inventory routes (protected)
fn inventory_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route(
                "/",
                get(handlers::list_inventory).post(handlers::create_inventory_item),
            )
            .route("/low-stock", get(handlers::low_stock_items))
            .route("/export", get(handlers::export_inventory))
            .route(
                "/:item_id",
                get(handlers::get_inventory_item)
                    .put(handlers::update_inventory_item)
                    .delete(handlers::delete_inventory_item),
            )
            .route("/:item_id/adjust", post(handlers::adjust_inventory_stock)),
    )
}

/// Vehicle routes (protected)
fn vehicle_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route("/", get(handlers::list_vehicles).post(handlers::create_vehicle))
            .route(
                "/:vehicle_id",
                get(handlers::get_vehicle)
                    .put(handlers::update_vehicle)
                    .delete(handlers::delete_vehicle),
            )
            .route(
                "/:vehicle_id/items",
                get(handlers::list_vehicle_items).post(handlers::assign_vehicle_item),
            )
            .route(
                "/:vehicle_id/items/:item_id",
                put(handlers::update_vehicle_item).delete(handlers::remove_vehicle_item),
            ),
    )
}

/// Reorder routes (protected)
fn reorder_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route("/", get(handlers::list_reorders).post(handlers::create_reorder))
            .route(
                "/:reorder_id",
                get(handlers::get_reorder).delete(handlers::delete_reorder),
            )
            .route("/:reorder_id/status", put(handlers::update_reorder_status)),
    )
}

fn log_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new().route("/", get(handlers::list_inventory_logs)),
    )
}

/// Training session routes (protected)
fn training_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route(
                "/",
                get(handlers::list_training_sessions).post(handlers::create_training_session),
            )
            .route(
                "/:session_id",
                get(handlers::get_training_session)
                    .put(handlers::update_training_session)
                    .delete(handlers::delete_training_session),
            )
            .route("/:session_id/qr", post(handlers::generate_session_qr))
            .route(
                "/:session_id/attendance",
                get(handlers::list_session_attendance).post(handlers::record_session_attendance),
            ),
    )
}

fn attendance_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route("/check-in", post(handlers::check_in))
            .route("/me", get(handlers::my_attendance)),
    )
}

/// Certificate routes (protected)
fn certificate_routes(state: &AppState) -> Router<AppState> {
    protected(
        state,
        Router::new()
            .route("/", get(handlers::list_certificates).post(handlers::issue_certificate))
            .route("/me", get(handlers::my_certificates))
            .route(
                "/:certificate_id",
                get(handlers::get_certificate).delete(handlers::delete_certificate),
            ),
    )
}
