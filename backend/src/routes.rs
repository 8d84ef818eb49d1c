use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::locale::Locale;
use crate::relay::ChatClient;
use crate::store::ExpenseStore;
use crate::{auth, services};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExpenseStore>,
    pub chat: ChatClient,
    pub locale: Locale,
    pub jwt_secret: Arc<str>,
}

pub fn app(state: AppState) -> Router {
    let protected = Router::<AppState>::new()
        // expenses
        .route(
            "/expenses",
            get(services::list_expenses_handler).post(services::create_expense_handler),
        )
        .route(
            "/expenses/:id",
            put(services::update_expense_handler).delete(services::delete_expense_handler),
        )
        // categories
        .route(
            "/categories",
            get(services::list_categories_handler).post(services::create_category_handler),
        )
        .route(
            "/categories/:id",
            put(services::update_category_handler).delete(services::delete_category_handler),
        )
        // reports
        .route("/reports", post(services::report_handler))
        .route("/reports/csv", post(services::csv_report_handler))
        .route("/reports/html", post(services::html_report_handler))
        .route("/reports/ai", post(services::ai_report_handler))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
