use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use storeledger_api::config::AppConfig;
use storeledger_auth::{JwtClaims, PrincipalId, Role};
use storeledger_core::TenantId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let config = AppConfig {
            jwt_secret: SECRET.to_string(),
            ..AppConfig::default()
        };
        let app = storeledger_api::app::build_app(&config)
            .await
            .expect("app should start in memory");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, role: &'static str) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles: vec![Role::new(role)],
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Create a product and receive `quantity` units of it. Returns the product id.
async fn stocked_product(srv: &TestServer, token: &str, sku: &str, price: u64, quantity: u64) -> String {
    let (status, product) = srv
        .post(
            token,
            "/products",
            json!({
                "sku": sku,
                "barcode": format!("590{sku}"),
                "name": format!("Product {sku}"),
                "category": "fertilizer",
                "unit": "bag",
                "pricing": { "sale_price": price, "cost_price": price / 2 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    let id = product["product_id"].as_str().unwrap().to_string();

    let (status, level) = srv
        .post(
            token,
            &format!("/inventory/{id}/receive"),
            json!({ "quantity": quantity, "note": "delivery" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{level}");
    assert_eq!(level["on_hand"], quantity);
    id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_signed_with_another_secret_is_rejected() {
    let srv = TestServer::spawn().await;
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id: TenantId::new(),
        roles: vec![Role::new("admin")],
        issued_at: Utc::now(),
        expires_at: Utc::now() + ChronoDuration::minutes(1),
    };
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();

    let (status, _) = srv.get(&forged, "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, "cashier");

    let (status, body) = srv.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "cashier"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "pos.checkout"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn counter_day_from_stock_to_closing() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let manager = mint_jwt(tenant_id, "manager");
    let cashier = mint_jwt(tenant_id, "cashier");

    let urea = stocked_product(&srv, &manager, "UREA-50", 4_000, 20).await;

    // Cashier scans the barcode.
    let (status, found) = srv.get(&cashier, "/pos/lookup?code=590UREA-50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["product_id"], urea.as_str());
    assert_eq!(found["on_hand"], 20);

    // Walk-in pays cash and gets change.
    let (status, receipt) = srv
        .post(
            &cashier,
            "/pos/checkout",
            json!({ "items": [{ "product_id": urea, "quantity": 2 }], "tendered": 10_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["totals"]["net_total"], 8_000);
    assert_eq!(receipt["change_due"], 2_000);
    let cash_sale = receipt["invoice_id"].as_str().unwrap().to_string();

    // A registered farmer buys on account.
    let (status, farmer) = srv
        .post(&cashier, "/customers", json!({ "name": "Green Acres", "credit_limit": 50_000 }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{farmer}");
    let farmer_id = farmer["customer_id"].as_str().unwrap().to_string();

    let (status, receipt) = srv
        .post(
            &cashier,
            "/pos/checkout",
            json!({
                "customer_id": farmer_id,
                "items": [{ "product_id": urea, "quantity": 3 }],
                "tendered": 2_000,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["balance_due"], 10_000);
    let credit_sale = receipt["invoice_id"].as_str().unwrap().to_string();

    let (_, customer) = srv.get(&manager, &format!("/customers/{farmer_id}")).await;
    assert_eq!(customer["name"], "Green Acres");
    assert_eq!(customer["balance"]["outstanding"], 10_000);

    let (_, debtors) = srv.get(&manager, "/customers/debtors").await;
    assert_eq!(debtors["items"][0]["customer_id"], farmer_id.as_str());

    // The farmer brings one bag back.
    let (status, refund) = srv
        .post(
            &cashier,
            "/returns",
            json!({
                "original_invoice_id": credit_sale,
                "returned": [{ "product_id": urea, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{refund}");
    assert_eq!(refund["kind"], "return");
    assert_eq!(refund["totals"]["net_total"], -4_000);

    let (_, ledger) = srv.get(&manager, &format!("/returns/{credit_sale}")).await;
    assert_eq!(ledger["products"][0]["returnable"], 2);

    let (_, invoice) = srv.get(&manager, &format!("/invoices/{credit_sale}")).await;
    assert_eq!(invoice["related_documents"].as_array().unwrap().len(), 1);

    // Then pays what is left on the sale.
    let (status, paid) = srv
        .post(&cashier, &format!("/invoices/{credit_sale}/payments"), json!({ "amount": 10_000 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{paid}");
    assert_eq!(paid["status"], "settled");

    // Returning more than is left is an invariant violation.
    let (status, err) = srv
        .post(
            &cashier,
            "/returns",
            json!({
                "original_invoice_id": credit_sale,
                "returned": [{ "product_id": urea, "quantity": 5 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "invariant_violation");

    let (_, level) = srv.get(&manager, &format!("/inventory/{urea}")).await;
    assert_eq!(level["on_hand"], 16);

    // Cashiers cannot close the day.
    let date = today();
    let (status, err) = srv
        .post(&cashier, &format!("/daily-inventory/{date}/close"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "forbidden");

    let (status, preview) = srv.get(&manager, &format!("/daily-inventory/{date}/preview")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["totals"]["invoice_count"], 2);

    let (status, closed) = srv
        .post(&manager, &format!("/daily-inventory/{date}/close"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{closed}");
    assert_eq!(closed["status"], "closed");
    assert_eq!(closed["snapshot"]["totals"]["net_sales"], 16_000);
    assert_eq!(closed["snapshot"]["totals"], preview["totals"]);

    // The day is locked until reopened.
    let (status, err) = srv
        .post(&cashier, "/pos/checkout", json!({ "items": [{ "product_id": urea, "quantity": 1 }], "tendered": 4_000 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "rejected");
    let (status, err) = srv
        .post(&manager, &format!("/invoices/{cash_sale}/void"), json!({ "reason": "late" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{err}");

    let (status, reopened) = srv
        .post(&manager, &format!("/daily-inventory/{date}/reopen"), json!({ "reason": "late void" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{reopened}");
    assert_eq!(reopened["status"], "reopened");

    let (status, voided) = srv
        .post(&manager, &format!("/invoices/{cash_sale}/void"), json!({ "reason": "late" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{voided}");
    assert_eq!(voided["status"], "void");

    let (_, closed) = srv
        .post(&manager, &format!("/daily-inventory/{date}/close"), json!({}))
        .await;
    assert_eq!(closed["closings"], 2);
    assert_eq!(closed["snapshot"]["totals"]["net_sales"], 8_000);
    assert_eq!(closed["snapshot"]["totals"]["void_count"], 1);

    let (_, days) = srv.get(&manager, "/daily-inventory").await;
    assert_eq!(days["items"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_errors_have_json_bodies() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let manager = mint_jwt(tenant_id, "manager");
    let seed = stocked_product(&srv, &manager, "SEED-1", 1_500, 2).await;

    let (status, err) = srv
        .post(
            &manager,
            "/pos/checkout",
            json!({ "items": [{ "product_id": seed, "quantity": 3 }], "tendered": 10_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["message"].as_str().unwrap().contains("insufficient stock"));

    let (status, err) = srv
        .post(
            &manager,
            "/products",
            json!({
                "sku": "SEED-1",
                "name": "Duplicate",
                "category": "seed",
                "unit": "kg",
                "pricing": { "sale_price": 100, "cost_price": 50 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "conflict");

    let (status, err) = srv.get(&manager, "/invoices/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (status, _) = srv.get(&manager, "/daily-inventory/yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, err) = srv
        .post(&manager, &format!("/inventory/{seed}/adjust"), json!({ "delta": -5, "reason": "count" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tenant_isolation_blocks_cross_tenant_reads_and_writes() {
    let srv = TestServer::spawn().await;
    let token1 = mint_jwt(TenantId::new(), "admin");
    let token2 = mint_jwt(TenantId::new(), "admin");

    let product = stocked_product(&srv, &token1, "HOE-2", 2_000, 5).await;

    let (status, _) = srv.get(&token2, &format!("/products/{product}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv
        .post(&token2, &format!("/inventory/{product}/receive"), json!({ "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv
        .post(
            &token2,
            "/pos/checkout",
            json!({ "items": [{ "product_id": product, "quantity": 1 }], "tendered": 2_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listing) = srv.get(&token2, "/products").await;
    assert!(listing["items"].as_array().unwrap().is_empty());
}
