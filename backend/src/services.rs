use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::summarize;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::locale::Locale;
use crate::models::{
    Category, CategoryPatch, ExpenseFilter, ExpensePatch, ExpenseRecord, MonthRange, NewCategory,
    NewExpense,
};
use crate::prompt::build_prompt;
use crate::report::{csv_filename, render_csv, render_html};
use crate::routes::AppState;

const DEFAULT_COLOR: &str = "#60B5FF";
const DEFAULT_ICON: &str = "circle";

fn rejected(locale: Locale, detail: String) -> AppError {
    debug!(%detail, "request rejected");
    AppError::InvalidRequest(locale.labels().invalid_request.to_string())
}

fn json_body<T>(locale: Locale, payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| rejected(locale, e.body_text()))
}

fn path_id(locale: Locale, id: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    id.map(|Path(id)| id)
        .map_err(|e| rejected(locale, e.body_text()))
}

fn query_params<T>(locale: Locale, query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|e| rejected(locale, e.body_text()))
}

fn require<T>(value: Option<T>, message: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::InvalidRequest(message.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Patches may omit a text field but not blank it.
fn not_blank_if_set(value: Option<String>, message: &str) -> AppResult<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(AppError::InvalidRequest(message.to_string())),
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Csv,
    Ai,
}

#[derive(Debug, Deserialize)]
pub struct ReportReq {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub action: Option<ReportAction>,
}

#[derive(Serialize)]
pub struct HtmlReport {
    pub html: String,
}

#[derive(Serialize)]
pub struct MessageResp {
    pub message: String,
}

async fn load_month(
    state: &AppState,
    user: &AuthUser,
    req: &ReportReq,
) -> AppResult<(MonthRange, Vec<ExpenseRecord>)> {
    let labels = state.locale.labels();
    let month = require(req.month, labels.period_required)?;
    let year = require(req.year, labels.period_required)?;
    let range = MonthRange::new(year, month)
        .map_err(|_| AppError::InvalidRequest(labels.invalid_period.to_string()))?;
    let records = state.store.expenses_in_month(user.user_id, &range).await?;
    if records.is_empty() {
        return Err(AppError::InvalidRequest(labels.no_expenses.to_string()));
    }
    Ok((range, records))
}

/// `{month, year, action?}`: `csv`, `ai`, or the printable report when absent.
pub async fn report_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ReportReq>, JsonRejection>,
) -> AppResult<Response> {
    let req = json_body(state.locale, payload)?;
    match req.action {
        Some(ReportAction::Csv) => csv_report(&state, &user, &req).await,
        Some(ReportAction::Ai) => ai_report(&state, &user, &req).await,
        None => html_report(&state, &user, &req).await,
    }
}

pub async fn csv_report_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ReportReq>, JsonRejection>,
) -> AppResult<Response> {
    csv_report(&state, &user, &json_body(state.locale, payload)?).await
}

pub async fn html_report_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ReportReq>, JsonRejection>,
) -> AppResult<Response> {
    html_report(&state, &user, &json_body(state.locale, payload)?).await
}

pub async fn ai_report_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ReportReq>, JsonRejection>,
) -> AppResult<Response> {
    ai_report(&state, &user, &json_body(state.locale, payload)?).await
}

async fn csv_report(state: &AppState, user: &AuthUser, req: &ReportReq) -> AppResult<Response> {
    let (range, records) = load_month(state, user, req).await?;
    let csv = render_csv(&records, state.locale);
    info!(user_id = %user.user_id, rows = records.len(), "csv export");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", csv_filename(&range)),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn html_report(state: &AppState, user: &AuthUser, req: &ReportReq) -> AppResult<Response> {
    let (range, records) = load_month(state, user, req).await?;
    let summary = summarize(&records, state.locale)?;
    let html = render_html(&summary, &records, &range, state.locale);
    info!(user_id = %user.user_id, rows = records.len(), "printable report");
    Ok(Json(HtmlReport { html }).into_response())
}

async fn ai_report(state: &AppState, user: &AuthUser, req: &ReportReq) -> AppResult<Response> {
    let (_, records) = load_month(state, user, req).await?;
    let summary = summarize(&records, state.locale)?;
    let prompt = build_prompt(&summary, state.locale);
    let relay = state.chat.open_stream(&prompt).await?;
    info!(user_id = %user.user_id, categories = summary.categories.len(), "relaying analysis");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(relay),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    // "all" or a category id
    pub category_id: Option<String>,
}

pub async fn list_expenses_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<ListExpensesQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ExpenseRecord>>> {
    let q = query_params(state.locale, query)?;
    let category_id = match q.category_id.as_deref() {
        None | Some("all") | Some("") => None,
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| rejected(state.locale, format!("invalid category_id: {raw}")))?,
        ),
    };
    // the date range only applies when both ends are given
    let (start, end) = match (q.start_date, q.end_date) {
        (Some(s), Some(e)) => (Some(start_of(s)), Some(end_of(e))),
        _ => (None, None),
    };
    let filter = ExpenseFilter {
        start,
        end,
        category_id,
    };
    let rows = state.store.list_expenses(user.user_id, &filter).await?;
    Ok(Json(rows))
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn end_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_micro_opt(23, 59, 59, 999_999)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| start_of(day))
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseReq {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExpenseReq {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
}

fn check_amount(locale: Locale, amount: Decimal) -> AppResult<Decimal> {
    if amount < Decimal::ZERO {
        return Err(AppError::InvalidRequest(
            locale.labels().negative_amount.to_string(),
        ));
    }
    Ok(amount)
}

/// The category must exist and be usable by `user_id`.
async fn usable_category(state: &AppState, user_id: Uuid, category_id: Uuid) -> AppResult<Category> {
    let labels = state.locale.labels();
    let category = state
        .store
        .find_category(category_id)
        .await?
        .ok_or_else(|| AppError::NotFound(labels.category_not_found.to_string()))?;
    if !category.visible_to(user_id) {
        return Err(AppError::Forbidden(labels.foreign_category.to_string()));
    }
    Ok(category)
}

async fn owned_expense(state: &AppState, user_id: Uuid, id: Uuid) -> AppResult<ExpenseRecord> {
    match state.store.find_expense(id).await? {
        Some(expense) if expense.user_id == user_id => Ok(expense),
        _ => Err(AppError::NotFound(
            state.locale.labels().expense_not_found.to_string(),
        )),
    }
}

pub async fn create_expense_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateExpenseReq>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ExpenseRecord>)> {
    let req = json_body(state.locale, payload)?;
    let required = state.locale.labels().fields_required;
    let amount = check_amount(state.locale, require(req.amount, required)?)?;
    let description = require(non_blank(req.description), required)?;
    let category_id = require(req.category_id, required)?;
    usable_category(&state, user.user_id, category_id).await?;

    let new = NewExpense {
        amount,
        description,
        category_id,
        date: req.date.unwrap_or_else(Utc::now),
    };
    let expense = state.store.create_expense(user.user_id, new).await?;
    info!(user_id = %user.user_id, expense_id = %expense.id, "expense created");
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateExpenseReq>, JsonRejection>,
) -> AppResult<Json<ExpenseRecord>> {
    let expense_id = path_id(state.locale, id)?;
    let req = json_body(state.locale, payload)?;
    owned_expense(&state, user.user_id, expense_id).await?;
    if let Some(category_id) = req.category_id {
        usable_category(&state, user.user_id, category_id).await?;
    }
    let description = not_blank_if_set(req.description, state.locale.labels().fields_required)?;
    let patch = ExpensePatch {
        amount: req
            .amount
            .map(|a| check_amount(state.locale, a))
            .transpose()?,
        description,
        category_id: req.category_id,
        date: req.date,
    };
    let expense = state.store.update_expense(expense_id, patch).await?;
    Ok(Json(expense))
}

pub async fn delete_expense_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResp>> {
    let expense_id = path_id(state.locale, id)?;
    owned_expense(&state, user.user_id, expense_id).await?;
    state.store.delete_expense(expense_id).await?;
    info!(user_id = %user.user_id, %expense_id, "expense deleted");
    Ok(Json(MessageResp {
        message: state.locale.labels().expense_deleted.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryReq {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryReq {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Category the caller may modify: exists, not a default, owned by them.
async fn editable_category(state: &AppState, user_id: Uuid, id: Uuid) -> AppResult<Category> {
    let labels = state.locale.labels();
    let category = state
        .store
        .find_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound(labels.category_not_found.to_string()))?;
    if category.is_default {
        return Err(AppError::Forbidden(labels.default_category.to_string()));
    }
    if category.user_id != Some(user_id) {
        return Err(AppError::Forbidden(labels.foreign_category.to_string()));
    }
    Ok(category)
}

pub async fn list_categories_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Category>>> {
    let rows = state.store.list_categories(user.user_id).await?;
    Ok(Json(rows))
}

pub async fn create_category_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateCategoryReq>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let req = json_body(state.locale, payload)?;
    let name = require(non_blank(req.name), state.locale.labels().name_required)?;
    let new = NewCategory {
        name,
        color: req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        icon: req.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
    };
    let category = state.store.create_category(user.user_id, new).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateCategoryReq>, JsonRejection>,
) -> AppResult<Json<Category>> {
    let category_id = path_id(state.locale, id)?;
    let req = json_body(state.locale, payload)?;
    editable_category(&state, user.user_id, category_id).await?;
    let patch = CategoryPatch {
        name: not_blank_if_set(req.name, state.locale.labels().name_required)?,
        color: req.color,
        icon: req.icon,
    };
    let category = state.store.update_category(category_id, patch).await?;
    Ok(Json(category))
}

pub async fn delete_category_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResp>> {
    let category_id = path_id(state.locale, id)?;
    editable_category(&state, user.user_id, category_id).await?;
    let labels = state.locale.labels();
    if state.store.count_category_expenses(category_id).await? > 0 {
        return Err(AppError::InvalidRequest(labels.category_in_use.to_string()));
    }
    state.store.delete_category(category_id).await?;
    Ok(Json(MessageResp {
        message: labels.category_deleted.to_string(),
    }))
}
