//! Customer endpoints.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use cohort_core::{Attributes, Customer, CustomerId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::policy::{PageQuery, Pagination, default_created_at, require_email};
use crate::state::AppState;

/// Customer route group.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer)
                .patch(update_customer)
                .delete(delete_customer),
        )
}

/// Pagination metadata returned with a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListMeta {
    /// Page served; 1 when the window was empty.
    pub page: usize,
    /// Page size applied.
    pub per_page: usize,
    /// Customers in the store.
    pub total: usize,
}

/// Response for `GET /customers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Customers in the requested window, ascending by id.
    pub customers: Vec<Customer>,
    /// Window metadata.
    pub meta: ListMeta,
}

/// Envelope for a single customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerResponse {
    /// The customer.
    pub customer: Customer,
}

/// Customer fields accepted by create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCustomer {
    /// Requested id.
    #[serde(default)]
    pub id: CustomerId,
    /// Initial attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

/// Request body for `POST /customers`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequest {
    /// The customer to create.
    #[serde(default)]
    pub customer: NewCustomer,
}

/// Customer fields accepted by update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatch {
    /// Attributes to overlay.
    #[serde(default)]
    pub attributes: Attributes,
}

/// Request body for `PATCH /customers/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequest {
    /// The attributes patch.
    #[serde(default)]
    pub customer: CustomerPatch,
}

/// `GET /customers`
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse>> {
    let window = Pagination::from(&query);

    let (customers, total) = state
        .store
        .list_with_total(window.page, window.per_page)
        .await?;

    let page = if customers.is_empty() {
        1
    } else {
        window.page.get()
    };

    Ok(Json(ListResponse {
        customers,
        meta: ListMeta {
            page,
            per_page: window.per_page.get(),
            total,
        },
    }))
}

/// `POST /customers`
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<CustomerResponse>)> {
    let NewCustomer { id, mut attributes } = request.customer;
    require_email(&attributes)?;
    default_created_at(&mut attributes);

    let customer = state.store.create(id, attributes).await?;
    debug!(id, "Customer created");
    Ok((StatusCode::CREATED, Json(CustomerResponse { customer })))
}

/// `GET /customers/{id}`
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> ApiResult<Json<CustomerResponse>> {
    let customer = state.store.get(id).await?;
    Ok(Json(CustomerResponse { customer }))
}

/// `PATCH /customers/{id}`
///
/// The body is parsed only once the customer is known to exist, so a
/// missing customer is a 404 whatever the body holds.
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    body: Bytes,
) -> ApiResult<Json<CustomerResponse>> {
    state.store.get(id).await?;

    let request: UpdateRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("invalid request body: {err}")))?;
    let mut attributes = request.customer.attributes;
    require_email(&attributes)?;
    default_created_at(&mut attributes);

    let customer = state.store.update(id, attributes).await?;
    debug!(id, "Customer updated");
    Ok(Json(CustomerResponse { customer }))
}

/// `DELETE /customers/{id}`
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> ApiResult<StatusCode> {
    state.store.delete(id).await?;
    debug!(id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}
