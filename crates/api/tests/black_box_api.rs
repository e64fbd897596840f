use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use siteledger_api::app::{build_app, build_services};
use siteledger_api::config::AppConfig;
use siteledger_core::{ProjectId, UserId, VendorId};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = Arc::new(
            build_services(&AppConfig::default())
                .await
                .expect("failed to build services"),
        );
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client that sends the identity headers on every request.
fn client() -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-user-id", UserId::new().to_string().parse().unwrap());
    headers.insert("x-user-name", "Site Engineer".parse().unwrap());
    reqwest::Client::builder().default_headers(headers).build().unwrap()
}

async fn send_json(req: reqwest::RequestBuilder, expected: StatusCode) -> Value {
    let res = req.send().await.unwrap();
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    assert_eq!(status, expected, "unexpected status, body={body}");
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap()
    }
}

async fn create_item(
    srv: &TestServer,
    client: &reqwest::Client,
    project: ProjectId,
    name: &str,
    quantity: f64,
    unit: &str,
) -> Value {
    send_json(
        client.post(srv.url("/inventory/items")).json(&json!({
            "project_id": project,
            "item_name": name,
            "category": "Steel",
            "unit": unit,
            "quantity": quantity,
            "unit_price": 400.0,
        })),
        StatusCode::CREATED,
    )
    .await
}

#[tokio::test]
async fn identity_required_for_domain_endpoints() {
    let srv = TestServer::spawn().await;
    let anonymous = reqwest::Client::new();

    let res = anonymous.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = anonymous.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = anonymous
        .get(srv.url("/inventory/items"))
        .header("x-user-id", "not-a-uuid")
        .header("x-user-name", "someone")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_echoes_caller_identity() {
    let srv = TestServer::spawn().await;
    let user = UserId::new();

    let body = send_json(
        reqwest::Client::new()
            .get(srv.url("/whoami"))
            .header("x-user-id", user.to_string())
            .header("x-user-name", "Store Keeper"),
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["user_id"], user.to_string());
    assert_eq!(body["user_name"], "Store Keeper");
}

#[tokio::test]
async fn receipts_post_to_inventory_and_stop_at_ordered_quantity() {
    let srv = TestServer::spawn().await;
    let client = client();
    let project = ProjectId::new();

    let order = send_json(
        client.post(srv.url("/procurement/orders")).json(&json!({
            "project_id": project,
            "vendor_id": VendorId::new(),
            "po_date": "2025-03-01",
            "items": [
                { "description": "Cement OPC 53", "unit": "Bags", "quantity": 100.0, "rate": 380.0 }
            ],
        })),
        StatusCode::CREATED,
    )
    .await;
    let po_id = order["id"].as_str().unwrap().to_string();
    assert!(order["po_number"].as_str().unwrap().starts_with("PO-"));
    assert_eq!(order["status"], "pending");

    let grn = |qty: f64| {
        json!({
            "po_id": po_id,
            "grn_date": "2025-03-05",
            "items": [{ "po_item_index": 0, "received_quantity": qty }],
        })
    };

    let first = send_json(
        client.post(srv.url("/procurement/receipts")).json(&grn(60.0)),
        StatusCode::CREATED,
    )
    .await;
    assert!(first["receipt"]["grn_number"].as_str().unwrap().starts_with("GRN-"));
    assert_eq!(first["inventory_sync"][0]["result"], "created");

    let rejected = send_json(
        client.post(srv.url("/procurement/receipts")).json(&grn(50.0)),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(rejected["error"], "over_receipt");
    assert_eq!(rejected["remaining"], 40.0);
    assert_eq!(rejected["already_received"], 60.0);

    let second = send_json(
        client.post(srv.url("/procurement/receipts")).json(&grn(40.0)),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(second["inventory_sync"][0]["result"], "merged");

    let detail = send_json(
        client.get(srv.url(&format!("/procurement/orders/{po_id}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(detail["line_status"][0]["received"], 100.0);
    assert_eq!(detail["line_status"][0]["pending"], 0.0);
    assert_eq!(detail["line_status"][0]["status"], "complete");

    let items = send_json(
        client.get(srv.url(&format!("/inventory/items?project_id={project}"))),
        StatusCode::OK,
    )
    .await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item_name"], "Cement OPC 53");
    assert_eq!(items[0]["quantity"], 100.0);
    assert_eq!(items[0]["category"], "Other");

    let receipts = send_json(
        client.get(srv.url(&format!("/procurement/receipts?po_id={po_id}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(receipts.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn cancelled_order_takes_no_receipts() {
    let srv = TestServer::spawn().await;
    let client = client();

    let order = send_json(
        client.post(srv.url("/procurement/orders")).json(&json!({
            "project_id": ProjectId::new(),
            "vendor_id": VendorId::new(),
            "po_date": "2025-03-01",
            "items": [{ "description": "Sand", "unit": "CFT", "quantity": 500.0, "rate": 45.0 }],
        })),
        StatusCode::CREATED,
    )
    .await;
    let po_id = order["id"].as_str().unwrap().to_string();

    let cancelled = send_json(
        client
            .patch(srv.url(&format!("/procurement/orders/{po_id}/status")))
            .json(&json!({ "status": "cancelled" })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(cancelled["status"], "cancelled");

    let body = send_json(
        client.post(srv.url("/procurement/receipts")).json(&json!({
            "po_id": po_id,
            "grn_date": "2025-03-02",
            "items": [{ "po_item_index": 0, "received_quantity": 10.0 }],
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
async fn transfer_checks_stock_then_creates_destination_line() {
    let srv = TestServer::spawn().await;
    let client = client();
    let (site_a, site_b) = (ProjectId::new(), ProjectId::new());

    let source = create_item(&srv, &client, site_a, "TMT bars 12mm", 50.0, "MT").await;
    let source_id = source["id"].as_str().unwrap().to_string();

    let body = send_json(
        client.post(srv.url("/inventory/transfer")).json(&json!({
            "from_item_id": source_id,
            "to_project_id": site_b,
            "quantity": 60.0,
        })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["available"], 50.0);
    assert_eq!(body["unit"], "MT");

    let body = send_json(
        client.post(srv.url("/inventory/transfer")).json(&json!({
            "from_item_id": source_id,
            "to_project_id": site_a,
            "quantity": 5.0,
        })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(body["error"], "same_project");

    let receipt = send_json(
        client.post(srv.url("/inventory/transfer")).json(&json!({
            "from_item_id": source_id,
            "to_project_id": site_b,
            "quantity": 20.0,
        })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(receipt["destination_created"], true);
    assert_eq!(receipt["transferred_quantity"], 20.0);

    let source = send_json(
        client.get(srv.url(&format!("/inventory/items/{source_id}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(source["quantity"], 30.0);

    let dest_id = receipt["destination_item_id"].as_str().unwrap();
    let dest = send_json(
        client.get(srv.url(&format!("/inventory/items/{dest_id}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(dest["quantity"], 20.0);
    assert_eq!(dest["project_id"], site_b.to_string());
}

#[tokio::test]
async fn quantity_updates_and_item_administration() {
    let srv = TestServer::spawn().await;
    let client = client();
    let project = ProjectId::new();

    let item = create_item(&srv, &client, project, "Binding wire", 10.0, "Kg").await;
    let id = item["id"].as_str().unwrap().to_string();

    let updated = send_json(
        client
            .patch(srv.url(&format!("/inventory/items/{id}/quantity")))
            .json(&json!({ "quantity": 5.0, "operation": "add" })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["quantity"], 15.0);
    assert_eq!(updated["total_value"], 6000.0);

    let body = send_json(
        client
            .patch(srv.url(&format!("/inventory/items/{id}/quantity")))
            .json(&json!({ "quantity": 20.0, "operation": "subtract" })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(body["error"], "insufficient_stock");

    let body = send_json(
        client.put(srv.url(&format!("/inventory/items/{id}"))).json(&json!({})),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(body["error"], "validation_failed");

    let renamed = send_json(
        client
            .put(srv.url(&format!("/inventory/items/{id}")))
            .json(&json!({ "minimum_quantity": 20.0 })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(renamed["status"], "low_stock");

    let dashboard = send_json(
        client.get(srv.url(&format!("/inventory/dashboard?project_id={project}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(dashboard["total_items"], 1);
    assert_eq!(dashboard["low_stock_count"], 1);

    send_json(
        client.delete(srv.url(&format!("/inventory/items/{id}"))),
        StatusCode::NO_CONTENT,
    )
    .await;
    let body = send_json(
        client.get(srv.url(&format!("/inventory/items/{id}"))),
        StatusCode::NOT_FOUND,
    )
    .await;
    assert_eq!(body["error"], "not_found");

    let body = send_json(client.get(srv.url("/inventory/items/garbage")), StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn daily_reports_chain_and_deduct_usage() {
    let srv = TestServer::spawn().await;
    let client = client();
    let project = ProjectId::new();

    let item = create_item(&srv, &client, project, "Cement OPC 53", 200.0, "Bags").await;
    let item_id = item["id"].as_str().unwrap().to_string();

    let opening = send_json(
        client.get(srv.url(&format!(
            "/daily-reports/opening-stock?project_id={project}&inventory_id={item_id}&date=2024-01-10"
        ))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(opening["opening_stock"], 200.0);
    assert_eq!(opening["basis"]["source"], "ledger_fallback");

    let report = |date: &str, received: f64, used: f64| {
        json!({
            "project_id": project,
            "date": date,
            "work_done": "Slab casting",
            "material_stock_entries": [
                { "inventory_id": item_id, "received": received, "used": used }
            ],
        })
    };

    let filed = send_json(
        client.post(srv.url("/daily-reports")).json(&report("2024-01-10", 50.0, 30.0)),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(filed["report"]["material_stock_entries"][0]["closing_stock"], 220.0);

    let body = send_json(
        client.post(srv.url("/daily-reports")).json(&report("2024-01-10", 0.0, 5.0)),
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(body["error"], "conflict");

    let opening = send_json(
        client.get(srv.url(&format!(
            "/daily-reports/opening-stock?project_id={project}&inventory_id={item_id}&date=2024-01-11"
        ))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(opening["opening_stock"], 220.0);
    assert_eq!(opening["basis"]["source"], "carried_forward");

    let item = send_json(
        client.get(srv.url(&format!("/inventory/items/{item_id}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(item["quantity"], 170.0);

    let reports = send_json(
        client.get(srv.url(&format!("/daily-reports?project_id={project}"))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(reports.as_array().unwrap().len(), 1);

    let body = send_json(
        client.get(srv.url(&format!(
            "/daily-reports/opening-stock?project_id={project}&inventory_id={item_id}&date=10-01-2024"
        ))),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(body["error"], "validation_failed");
}
