//! HTTP 层：路由、鉴权、状态码与响应体

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::*;
use http_body_util::BodyExt;
use order_hub::api::create_router;
use order_hub::auth::StaffRole;
use serde_json::{Value, json};
use shared::error::ErrorCode;
use tower::ServiceExt;

fn app() -> Router {
    create_router(state())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn public_order(location: &str) -> Value {
    json!({
        "location": location,
        "customer_name": "Asha",
        "table_number": "T4",
        "items": [
            { "variant_id": MASALA_DOSA_REGULAR, "quantity": 2 },
            { "item_name": "Filter Coffee", "variant_name": "Small", "quantity": 1 }
        ]
    })
}

async fn place_order(app: &Router) -> (i64, Vec<i64>) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/restaurants/dosa-corner/orders",
        None,
        Some(public_order(AT_DOSA_CORNER)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let items = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_i64().unwrap())
        .collect();
    (body["order_id"].as_i64().unwrap(), items)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "order-hub");
}

#[tokio::test]
async fn test_public_order_intake() {
    let app = app();
    let (bill_id, items) = place_order(&app).await;
    assert_eq!(items.len(), 2);

    let (status, body) = send(&app, Method::GET, &format!("/api/orders/{bill_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], bill_id);
    assert_eq!(body["payment_status"], "PENDING");
    assert_eq!(body["items"][0]["status"], "PENDING");
    assert_eq!(body["is_kitchen_active"], true);

    // 超出围栏
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/restaurants/dosa-corner/orders",
        None,
        Some(public_order(FAR_FROM_DOSA_CORNER)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 3002);

    // 坐标格式错误
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/restaurants/dosa-corner/orders",
        None,
        Some(public_order("somewhere")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 未知餐厅
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/restaurants/nowhere/orders",
        None,
        Some(public_order(AT_DOSA_CORNER)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 3001);

    // 未知账单
    let (status, _) = send(&app, Method::GET, "/api/orders/999999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_add_items() {
    let app = app();
    let (bill_id, _) = place_order(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/orders/{bill_id}/items"),
        None,
        Some(json!({ "items": [{ "menu_item_id": 10, "variant_name": "Family", "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_staff_routes_require_token() {
    let app = app();
    for uri in [
        "/api/kitchen/orders",
        "/api/cashier/bills",
        "/api/admin/orders",
    ] {
        let (status, _) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let (status, _) = send(&app, Method::GET, "/api/kitchen/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_kitchen_to_cashier_over_http() {
    let app = app();
    let (bill_id, items) = place_order(&app).await;
    let chef = token(DOSA_CORNER, StaffRole::Chef);
    let cashier = token(DOSA_CORNER, StaffRole::Cashier);

    let (status, body) = send(&app, Method::GET, "/api/kitchen/orders", Some(&chef), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // 收银员不能改菜品状态
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/kitchen/items/{}/status", items[0]),
        Some(&cashier),
        Some(json!({ "status": "ACCEPTED" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 非法状态值
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/kitchen/items/{}/status", items[0]),
        Some(&chef),
        Some(json!({ "status": "COOKING" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], ErrorCode::ValidationFailed.code());
    assert_eq!(body["details"]["source"], "body");

    // 非法转换
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/kitchen/items/{}/status", items[0]),
        Some(&chef),
        Some(json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["from"], "PENDING");

    for item_id in &items {
        for next in ["ACCEPTED", "COMPLETED"] {
            let (status, body) = send(
                &app,
                Method::POST,
                &format!("/api/kitchen/items/{item_id}/status"),
                Some(&chef),
                Some(json!({ "status": next })),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["item"]["status"], next);
        }
    }

    let (status, body) = send(&app, Method::GET, "/api/cashier/bills", Some(&cashier), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["is_ready_for_cashier"], true);

    // 非法支付方式
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/cashier/bills/{bill_id}/pay"),
        Some(&cashier),
        Some(json!({ "payment_method": "BARTER" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["payment_method"], "BARTER");

    let pay = json!({ "payment_method": "OFFLINE" });
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/cashier/bills/{bill_id}/pay"),
        Some(&cashier),
        Some(pay.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment_status"], "PAID");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/cashier/bills/{bill_id}/pay"),
        Some(&cashier),
        Some(pay),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 已结账后加菜
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/orders/{bill_id}/items"),
        None,
        Some(json!({ "items": [{ "variant_id": FILTER_COFFEE, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_are_scoped_to_their_restaurant() {
    let app = app();
    let (bill_id, items) = place_order(&app).await;
    let other_chef = token(IDLI_HOUSE, StaffRole::Chef);
    let other_cashier = token(IDLI_HOUSE, StaffRole::Cashier);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/kitchen/items/{}/status", items[0]),
        Some(&other_chef),
        Some(json!({ "status": "ACCEPTED" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/cashier/bills/{bill_id}/pay"),
        Some(&other_cashier),
        Some(json!({ "payment_method": "ONLINE" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/kitchen/orders", Some(&other_chef), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_captain_orders_without_geofence() {
    let app = app();
    let captain = token(DOSA_CORNER, StaffRole::Captain);
    let chef = token(DOSA_CORNER, StaffRole::Chef);
    let order = json!({
        "customer_name": "Walk-in",
        "table_number": "T9",
        "items": [{ "variant_id": FILTER_COFFEE, "quantity": 3 }]
    });

    let (status, _) = send(&app, Method::POST, "/api/staff/orders", Some(&chef), Some(order.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, "/api/staff/orders", Some(&captain), Some(order)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let bill_id = body["order_id"].as_i64().unwrap();
    assert_eq!(body["items"][0]["quantity"], 3);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/staff/orders/{bill_id}/items"),
        Some(&captain),
        Some(json!({ "items": [{ "variant_id": MASALA_DOSA_REGULAR, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    // 别家餐厅的领班看不到这张账单
    let other_captain = token(IDLI_HOUSE, StaffRole::Captain);
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/staff/orders/{bill_id}/items"),
        Some(&other_captain),
        Some(json!({ "items": [{ "variant_id": IDLI_PLATE, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_history() {
    let app = app();
    place_order(&app).await;
    place_order(&app).await;
    let admin = token(DOSA_CORNER, StaffRole::Admin);
    let chef = token(DOSA_CORNER, StaffRole::Chef);

    let (status, body) = send(&app, Method::GET, "/api/admin/orders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let bills = body.as_array().unwrap();
    assert_eq!(bills.len(), 2);
    // newest first
    assert!(bills[0]["id"].as_i64() > bills[1]["id"].as_i64());

    let (status, body) = send(&app, Method::GET, "/api/admin/orders?period=all", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, "/api/admin/orders?period=decade", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], ErrorCode::ValidationFailed.code());
    assert_eq!(body["details"]["source"], "query");

    let (status, _) = send(&app, Method::GET, "/api/admin/orders", Some(&chef), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_validation_errors_are_reported_per_field() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/restaurants/dosa-corner/orders",
        None,
        Some(json!({
            "location": AT_DOSA_CORNER,
            "customer_name": "   ",
            "table_number": "T4",
            "items": [{ "variant_id": FILTER_COFFEE, "quantity": 1000 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);
    let fields = body["details"]["fields"].as_array().unwrap();
    assert!(!fields.is_empty());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/restaurants/dosa-corner/orders",
        None,
        Some(json!({
            "location": AT_DOSA_CORNER,
            "customer_name": "Asha",
            "table_number": "T4",
            "items": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], ErrorCode::OrderEmpty.code());
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let app = app();

    // 非 JSON 请求体
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/restaurants/dosa-corner/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{oops"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], ErrorCode::ValidationFailed.code());

    // 缺少 Content-Type
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/orders/1/items")
        .body(Body::from(r#"{"items": []}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 路径参数不是数字
    let (status, body) = send(&app, Method::GET, "/api/orders/not-a-number", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], ErrorCode::ValidationFailed.code());
    assert_eq!(body["details"]["source"], "path");

    // 缺少必填字段
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/restaurants/dosa-corner/orders",
        None,
        Some(json!({ "customer_name": "Asha", "table_number": "T4", "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], ErrorCode::ValidationFailed.code());
}
