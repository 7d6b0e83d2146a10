//! Transport-independent request dispatch.
//!
//! [`route`] turns an [`ApiRequest`] into an [`ApiResponse`]; the
//! `may_minihttp` adapter in [`super::service`] only copies bytes in and out.

use super::dto::*;
use crate::access::Actor;
use crate::config::ImportConfig;
use crate::error::WorkflowError;
use crate::model::PropertyFilter;
use crate::store::{Store, StoreProvider};
use crate::workflow::{
    AuditEngine, MaintenanceWorkflow, PropertyRegistry, ReferenceData, TransferWorkflow,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Header carrying the authenticated user's id, set by the upstream authenticator.
pub const USER_HEADER: &str = "X-User-Id";

/// Shared by every request the server handles.
pub struct AppContext<P: StoreProvider> {
    pub provider: P,
    pub import: ImportConfig,
}

impl<P: StoreProvider> AppContext<P> {
    pub fn new(provider: P, import: ImportConfig) -> Self {
        Self { provider, import }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub user_id: Option<String>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Split `target` (`/path?a=1&b=2`) into path and query.
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (k.to_string(), v.to_string())
            })
            .collect();
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn as_user(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_body(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Csv,
    Png,
    Text,
}

impl ContentType {
    pub fn header(self) -> &'static str {
        match self {
            ContentType::Json => "Content-Type: application/json",
            ContentType::Csv => "Content-Type: text/csv; charset=utf-8",
            ContentType::Png => "Content-Type: image/png",
            ContentType::Text => "Content-Type: text/plain; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: ContentType,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: ContentType::Json,
                body,
            },
            Err(e) => {
                log::error!("failed to encode reply: {e}");
                Self::text(500, "Internal Server Error")
            }
        }
    }

    pub fn text(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: ContentType::Text,
            body: body.into(),
        }
    }

    pub fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: ContentType::Png,
            body,
        }
    }

    fn failure(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &StatusReply::failed(message))
    }

    /// Body as JSON, for tests and clients.
    pub fn json_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Why a routed request did not produce a reply.
enum Failure {
    Workflow(WorkflowError),
    BadRequest(String),
    NoRoute,
}

impl From<WorkflowError> for Failure {
    fn from(err: WorkflowError) -> Self {
        Failure::Workflow(err)
    }
}

type Routed = Result<ApiResponse, Failure>;

pub fn route<P: StoreProvider>(ctx: &AppContext<P>, req: &ApiRequest) -> ApiResponse {
    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
    match (req.method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => return ApiResponse::json(200, &HealthReply { status: "ok" }),
        #[cfg(feature = "metrics")]
        ("GET", ["metrics"]) => return ApiResponse::text(200, crate::metrics::METRICS.render()),
        _ => {}
    }

    let store = match ctx.provider.acquire() {
        Ok(store) => store,
        Err(e) => {
            log::error!("{} {}: no store available: {e}", req.method, req.path);
            return ApiResponse::failure(503, "Service unavailable");
        }
    };
    let actor = match resolve_actor(&store, req) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match dispatch(ctx, &store, &actor, req, &segments) {
        Ok(response) => response,
        Err(Failure::NoRoute) => ApiResponse::failure(404, "No such endpoint"),
        Err(Failure::BadRequest(message)) => ApiResponse::failure(400, message),
        Err(Failure::Workflow(err)) => {
            let status = match &err {
                WorkflowError::NotFound(_) => 404,
                WorkflowError::Validation(_) | WorkflowError::Forbidden(_) => 200,
                WorkflowError::Persistence(e) => {
                    log::error!("{} {} failed: {e}", req.method, req.path);
                    500
                }
            };
            ApiResponse::failure(status, err.user_message())
        }
    }
}

fn resolve_actor<S: Store>(store: &S, req: &ApiRequest) -> Result<Actor, ApiResponse> {
    let unauthorized = || ApiResponse::failure(401, "Sign in required");
    let id = req
        .user_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(unauthorized)?;
    match store.user(id) {
        Ok(Some(user)) => Ok(Actor::new(user)),
        Ok(None) => {
            log::debug!("unknown user {id} on {}", req.path);
            Err(unauthorized())
        }
        Err(e) => {
            log::error!("resolving user {id} failed: {e}");
            Err(ApiResponse::failure(500, "Internal Server Error"))
        }
    }
}

fn body<T: DeserializeOwned>(req: &ApiRequest) -> Result<T, Failure> {
    serde_json::from_slice(&req.body)
        .map_err(|e| Failure::BadRequest(format!("Malformed request body: {e}")))
}

fn id(raw: &str) -> Result<Uuid, Failure> {
    Uuid::parse_str(raw).map_err(|_| Failure::BadRequest(format!("Malformed id {raw}")))
}

fn query_id(req: &ApiRequest, key: &str) -> Result<Option<Uuid>, Failure> {
    req.query.get(key).map(|raw| id(raw)).transpose()
}

fn ok<T: Serialize>(value: &T) -> Routed {
    Ok(ApiResponse::json(200, value))
}

fn done(message: impl Into<String>) -> Routed {
    ok(&StatusReply::ok(message))
}

fn dispatch<P: StoreProvider>(
    ctx: &AppContext<P>,
    store: &P::Store,
    actor: &Actor,
    req: &ApiRequest,
    segments: &[&str],
) -> Routed {
    let audits = AuditEngine::new(store);
    let registry = PropertyRegistry::with_import_config(store, ctx.import.clone());
    let transfers = TransferWorkflow::new(store);
    let maintenance = MaintenanceWorkflow::new(store);
    let reference = ReferenceData::new(store);

    match (req.method.as_str(), segments) {
        // audits
        ("GET", ["Inventory"]) => ok(&audits.list(actor)?),
        ("POST", ["Inventory", "Create"]) => {
            let form: CreateInventoryBody = body(req)?;
            let inventory = match (form.location_id, form.user_id) {
                (Some(location_id), _) => {
                    audits.create_for_location(actor, &form.name, location_id)?
                }
                (None, Some(user_id)) => audits.create_for_user(actor, &form.name, user_id)?,
                (None, None) => {
                    let message = "Choose a location or a user to audit";
                    return Err(WorkflowError::validation(message).into());
                }
            };
            ok(&inventory)
        }
        ("GET", ["Inventory", "Scan"]) => {
            let inventory_id = query_id(req, "id")?
                .ok_or_else(|| Failure::BadRequest("Missing id".into()))?;
            ok(&audits.detail(actor, inventory_id)?)
        }
        ("POST", ["Inventory", "CheckItem"]) => {
            let form: CheckItemBody = body(req)?;
            let outcome = audits.check_item(actor, form.inventory_id, &form.code)?;
            let message = if outcome.is_completed {
                format!("{} checked; the audit is complete", outcome.property.name)
            } else {
                format!(
                    "{} checked ({} of {})",
                    outcome.property.name, outcome.checked_items, outcome.total_items
                )
            };
            ok(&CheckItemReply {
                success: true,
                message,
                checked_items: outcome.checked_items,
                total_items: outcome.total_items,
                is_completed: outcome.is_completed,
            })
        }
        ("POST", ["Inventory", "Complete", raw]) => {
            audits.complete(actor, id(raw)?)?;
            done("Inventory audit completed")
        }
        ("POST", ["Inventory", "Delete", raw]) => {
            audits.delete(actor, id(raw)?)?;
            done("Inventory audit deleted")
        }
        ("POST", ["Inventory", "DeleteCompleted"]) => ok(&DeletedReply {
            success: true,
            deleted: audits.delete_completed(actor)?,
        }),

        // scanning and transfers
        ("POST", ["Scan", "ScanProperty"]) => {
            let form: ScanBody = body(req)?;
            ok(&registry.scan(actor, &form.inventory_number)?)
        }
        ("POST", ["Scan", "TransferToUser"]) => {
            let form: PropertyIdBody = body(req)?;
            done(transfers.transfer_to_user(actor, form.property_id)?.notes)
        }
        ("POST", ["Scan", "ReturnToWarehouse"]) => {
            let form: PropertyIdBody = body(req)?;
            done(transfers.return_to_warehouse(actor, form.property_id)?.notes)
        }

        // properties
        ("GET", ["Property"]) => {
            let filter = PropertyFilter {
                location_id: query_id(req, "locationId")?,
                assigned_user_id: query_id(req, "userId")?,
            };
            ok(&registry.list(actor, filter)?)
        }
        ("GET", ["Property", "History", raw]) => ok(&transfers.history(actor, id(raw)?)?),
        ("GET", ["Property", "Details", raw]) => ok(&registry.get(actor, id(raw)?)?),
        ("POST", ["Property", "Create"]) => ok(&registry.create(actor, body(req)?)?),
        ("POST", ["Property", "Edit", raw]) => ok(&registry.update(actor, id(raw)?, body(req)?)?),
        ("POST", ["Property", "Delete", raw]) => {
            registry.delete(actor, id(raw)?)?;
            done("Property deleted")
        }
        ("POST", ["Property", "Import"]) => {
            let text = std::str::from_utf8(&req.body)
                .map_err(|_| Failure::BadRequest("Import sheet must be UTF-8 text".into()))?;
            ok(&registry.import_csv(actor, text)?)
        }
        ("POST", ["Property", "ExportData"]) => {
            let form: ExportBody = if req.body.is_empty() {
                ExportBody::default()
            } else {
                body(req)?
            };
            Ok(ApiResponse {
                status: 200,
                content_type: ContentType::Csv,
                body: registry.export_csv(actor, &form.columns)?,
            })
        }
        ("GET", ["Property", "Labels"]) => ok(&registry.label_sheet(actor)?),
        ("GET", ["Property", "GenerateQRCodeImage", raw]) => {
            Ok(ApiResponse::png(registry.qr_image(actor, id(raw)?)?))
        }
        ("GET", ["Property", "GenerateBarcodeImage", raw]) => {
            Ok(ApiResponse::png(registry.barcode_image(actor, id(raw)?)?))
        }

        // maintenance
        ("GET", ["Maintenance"]) => ok(&maintenance.visible_requests(actor)?),
        ("POST", ["Maintenance", "CreateRequest"]) => {
            let form: CreateRequestBody = body(req)?;
            ok(&maintenance.create_request(actor, form.property_id, &form.description)?)
        }
        ("POST", ["Maintenance", "AssignRequest"]) => {
            let form: AssignRequestBody = body(req)?;
            ok(&maintenance.assign_request(actor, form.request_id, form.assignee_id)?)
        }
        ("POST", ["Maintenance", "CompleteRequest"]) => {
            let form: CompleteRequestBody = body(req)?;
            ok(&maintenance.complete_request(actor, form.request_id, form.notes.as_deref())?)
        }
        ("POST", ["Maintenance", "CancelRequest"]) => {
            let form: RequestIdBody = body(req)?;
            ok(&maintenance.cancel_request(actor, form.request_id)?)
        }

        // reference data
        ("GET", ["Admin", "Locations"]) => ok(&reference.locations()?),
        ("POST", ["Admin", "Locations"]) => {
            let form: NamedBody = body(req)?;
            ok(&reference.create_location(actor, &form.name, form.description.as_deref())?)
        }
        ("GET", ["Admin", "PropertyTypes"]) => ok(&reference.property_types()?),
        ("POST", ["Admin", "PropertyTypes"]) => {
            let form: NamedBody = body(req)?;
            ok(&reference.create_property_type(actor, &form.name, form.description.as_deref())?)
        }
        ("GET", ["Admin", "Users"]) => ok(&reference.users()?),
        ("POST", ["Admin", "Users"]) => {
            let form: NewUserBody = body(req)?;
            ok(&reference.create_user(
                actor,
                &form.username,
                &form.full_name,
                form.role,
                form.location_id,
            )?)
        }

        _ => Err(Failure::NoRoute),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, PropertyType, Role, User};
    use crate::store::MemoryStore;
    use serde_json::json;

    struct Setup {
        ctx: AppContext<MemoryStore>,
        admin: User,
        user: User,
        warehouse: Location,
        kind: PropertyType,
    }

    fn setup() -> Setup {
        let store = MemoryStore::new();
        let warehouse = Location::new("Warehouse");
        let kind = PropertyType::new("Computers");
        store.insert_location(&warehouse).unwrap();
        store.insert_property_type(&kind).unwrap();
        let admin = User::new("admin", "Admin", Role::Admin).at_location(warehouse.id);
        let user = User::new("user", "User", Role::User).at_location(warehouse.id);
        store.insert_user(&admin).unwrap();
        store.insert_user(&user).unwrap();
        Setup {
            ctx: AppContext::new(store, ImportConfig::default()),
            admin,
            user,
            warehouse,
            kind,
        }
    }

    fn create_property(s: &Setup, number: &str) -> serde_json::Value {
        let req = ApiRequest::new("POST", "/Property/Create")
            .as_user(s.admin.id)
            .with_json(&json!({
                "name": "Laptop",
                "inventoryNumber": number,
                "propertyTypeId": s.kind.id,
                "locationId": s.warehouse.id,
            }));
        let response = route(&s.ctx, &req);
        assert_eq!(response.status, 200);
        response.json_body().unwrap()
    }

    #[test]
    fn test_health_needs_no_user() {
        let s = setup();
        let response = route(&s.ctx, &ApiRequest::new("GET", "/health"));
        assert_eq!(response.status, 200);
        assert_eq!(response.json_body().unwrap(), json!({"status": "ok"}));
    }

    #[test]
    fn test_missing_or_unknown_user_is_unauthorized() {
        let s = setup();
        let anonymous = ApiRequest::new("GET", "/Inventory");
        assert_eq!(route(&s.ctx, &anonymous).status, 401);
        let stranger = ApiRequest::new("GET", "/Inventory").as_user(Uuid::new_v4());
        assert_eq!(route(&s.ctx, &stranger).status, 401);
    }

    #[test]
    fn test_audit_round_over_http() {
        let s = setup();
        create_property(&s, "INV-1");

        let created = route(
            &s.ctx,
            &ApiRequest::new("POST", "/Inventory/Create")
                .as_user(s.admin.id)
                .with_json(&json!({"name": "Q1", "locationId": s.warehouse.id})),
        )
        .json_body()
        .unwrap();
        assert_eq!(created["totalItems"], 1);
        let inventory_id = created["id"].as_str().unwrap().to_string();

        let checked = route(
            &s.ctx,
            &ApiRequest::new("POST", "/Inventory/CheckItem")
                .as_user(s.admin.id)
                .with_json(&json!({"inventoryId": inventory_id, "code": "QM:INV-1"})),
        )
        .json_body()
        .unwrap();
        assert_eq!(checked["success"], true);
        assert_eq!(checked["isCompleted"], true);

        let detail = route(
            &s.ctx,
            &ApiRequest::new("GET", &format!("/Inventory/Scan?id={inventory_id}"))
                .as_user(s.admin.id),
        );
        assert_eq!(detail.status, 200);
        assert_eq!(detail.json_body().unwrap()["lines"][0]["item"]["isChecked"], true);
    }

    #[test]
    fn test_rejections_are_reported_in_body() {
        let s = setup();
        let property = create_property(&s, "INV-1");
        let take = |user: &User| {
            route(
                &s.ctx,
                &ApiRequest::new("POST", "/Scan/TransferToUser")
                    .as_user(user.id)
                    .with_json(&json!({"propertyId": property["id"]})),
            )
        };
        assert_eq!(take(&s.user).json_body().unwrap()["success"], true);

        let again = take(&s.user);
        assert_eq!(again.status, 200);
        let reply = again.json_body().unwrap();
        assert_eq!(reply["success"], false);
        assert!(reply["message"].as_str().unwrap().contains("already assigned to you"));

        let forbidden = route(
            &s.ctx,
            &ApiRequest::new("POST", "/Scan/ReturnToWarehouse")
                .as_user(s.user.id)
                .with_json(&json!({"propertyId": property["id"]})),
        );
        assert_eq!(forbidden.status, 200);
        assert_eq!(forbidden.json_body().unwrap()["success"], false);
    }

    #[test]
    fn test_not_found_and_malformed_requests() {
        let s = setup();
        let missing = route(
            &s.ctx,
            &ApiRequest::new("GET", &format!("/Property/Details/{}", Uuid::new_v4()))
                .as_user(s.admin.id),
        );
        assert_eq!(missing.status, 404);
        assert_eq!(missing.json_body().unwrap()["success"], false);

        let bad_id = route(
            &s.ctx,
            &ApiRequest::new("GET", "/Property/Details/42").as_user(s.admin.id),
        );
        assert_eq!(bad_id.status, 400);

        let bad_body = route(
            &s.ctx,
            &ApiRequest::new("POST", "/Maintenance/CreateRequest")
                .as_user(s.admin.id)
                .with_body("{"),
        );
        assert_eq!(bad_body.status, 400);

        let nowhere = route(&s.ctx, &ApiRequest::new("GET", "/Nowhere").as_user(s.admin.id));
        assert_eq!(nowhere.status, 404);
    }

    #[test]
    fn test_code_images_are_png() {
        let s = setup();
        let created = create_property(&s, "INV-1");
        let id = created["id"].as_str().unwrap();

        for kind in ["GenerateQRCodeImage", "GenerateBarcodeImage"] {
            let response = route(
                &s.ctx,
                &ApiRequest::new("GET", &format!("/Property/{kind}/{id}")).as_user(s.user.id),
            );
            assert_eq!(response.status, 200, "{kind}");
            assert_eq!(response.content_type, ContentType::Png);
            assert!(response.body.starts_with(b"\x89PNG\r\n\x1a\n"), "{kind}");

            let missing = route(
                &s.ctx,
                &ApiRequest::new("GET", &format!("/Property/{kind}/{}", Uuid::new_v4()))
                    .as_user(s.user.id),
            );
            assert_eq!(missing.status, 404, "{kind}");
        }
    }

    #[test]
    fn test_export_is_csv() {
        let s = setup();
        create_property(&s, "INV-1");
        let response = route(
            &s.ctx,
            &ApiRequest::new("POST", "/Property/ExportData")
                .as_user(s.admin.id)
                .with_json(&json!({"columns": ["inventoryNumber"]})),
        );
        assert_eq!(response.content_type, ContentType::Csv);
        let text = String::from_utf8(response.body).unwrap();
        assert!(text.trim_end().ends_with("\"INV-1\""));
    }

    #[test]
    fn test_import_takes_raw_text() {
        let s = setup();
        let sheet = "Name;Description;InventoryNumber;Type;Location\nChair;;INV-5;Computers;Warehouse\n";
        let response = route(
            &s.ctx,
            &ApiRequest::new("POST", "/Property/Import")
                .as_user(s.admin.id)
                .with_body(sheet),
        );
        assert_eq!(response.json_body().unwrap()["importedCount"], 1);
    }

    #[test]
    fn test_query_string_is_split() {
        let req = ApiRequest::new("get", "/Property?locationId=abc&flag");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/Property");
        assert_eq!(req.query.get("locationId").map(String::as_str), Some("abc"));
        assert_eq!(req.query.get("flag").map(String::as_str), Some(""));
    }
}
