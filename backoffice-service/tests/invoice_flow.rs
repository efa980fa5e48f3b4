mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::{add_product, seed_group, test_app};
use uuid::Uuid;

#[tokio::test]
async fn invoice_summary_tracks_products_and_payments() {
    let app = test_app();
    let fx = seed_group(&app).await;
    let seller = app.ok(Method::POST, "/sellers", fx.tenant, Some(json!({"name": "Ana"}))).await;
    let a = add_product(&app, fx.tenant, "A", "10.00", Some("300.00")).await;
    let b = add_product(&app, fx.tenant, "B", "40.00", None).await;

    let invoice = app
        .ok(
            Method::POST,
            "/invoices",
            fx.tenant,
            Some(json!({
                "seller_id": seller["id"],
                "notes": "first order",
                "product_ids": [a["id"], b["id"]],
                "payment": {"amount": "100.00", "payment_date": "2026-10-01"}
            })),
        )
        .await;
    assert_eq!(invoice["seller"], "Ana");
    assert_eq!(invoice["total_amount"], "300.00");
    assert_eq!(invoice["num_products"], 2);
    assert_eq!(invoice["num_payments"], 1);
    assert_eq!(invoice["total_paid"], "100.00");
    let id = invoice["id"].as_str().unwrap();

    let payment = app
        .ok(
            Method::POST,
            &format!("/invoices/{id}/payments"),
            fx.tenant,
            Some(json!({"amount": "50.00", "payment_date": "2026-10-05", "payment_comment": "cash"})),
        )
        .await;
    assert_eq!(payment["payment_comment"], "cash");

    let payments = app.ok(Method::GET, &format!("/invoices/{id}/payments"), fx.tenant, None).await;
    assert_eq!(payments["num_payments"], 2);

    let summary = app.ok(Method::GET, &format!("/invoices/{id}"), fx.tenant, None).await;
    assert_eq!(summary["total_paid"], "150.00");

    let products = app.ok(Method::GET, &format!("/invoices/{id}/products"), fx.tenant, None).await;
    assert_eq!(products["num_products"], 2);

    let listed = app.ok(Method::GET, "/invoices", fx.tenant, None).await;
    assert_eq!(listed["num_invoices"], 1);
}

#[tokio::test]
async fn payments_must_be_positive() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let reply = app
        .send(
            Method::POST,
            &format!("/invoices/{}/payments", Uuid::new_v4()),
            Some(tenant),
            Some(json!({"amount": "0"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "invalid_payment_amount");

    let dust = app
        .send(
            Method::POST,
            &format!("/invoices/{}/payments", Uuid::new_v4()),
            Some(tenant),
            Some(json!({"amount": "0.001"})),
        )
        .await;
    assert_eq!(dust.status, StatusCode::BAD_REQUEST);

    for amount in ["1e20000000", "10000000000.00", "-5"] {
        let refused = app
            .send(
                Method::POST,
                &format!("/invoices/{}/payments", Uuid::new_v4()),
                Some(tenant),
                Some(json!({ "amount": amount })),
            )
            .await;
        assert_eq!(refused.status, StatusCode::BAD_REQUEST, "{amount}");
        assert_eq!(refused.body["code"], "invalid_payment_amount", "{amount}");
    }
}

#[tokio::test]
async fn invoice_references_are_checked() {
    let app = test_app();
    let fx = seed_group(&app).await;
    let seller = app.ok(Method::POST, "/sellers", fx.tenant, Some(json!({"name": "Ana"}))).await;

    let missing = app.failed(Method::GET, &format!("/invoices/{}", Uuid::new_v4()), fx.tenant, None).await;
    assert_eq!(missing, "invoice_not_found");

    let foreign = seed_group(&app).await;
    let foreign_product = add_product(&app, foreign.tenant, "F", "1.00", None).await;
    let code = app
        .failed(
            Method::POST,
            "/invoices",
            fx.tenant,
            Some(json!({"seller_id": seller["id"], "product_ids": [foreign_product["id"]]})),
        )
        .await;
    assert_eq!(code, "product_not_found");
}

#[tokio::test]
async fn invoiced_records_cannot_be_deleted() {
    let app = test_app();
    let fx = seed_group(&app).await;
    let seller = app.ok(Method::POST, "/sellers", fx.tenant, Some(json!({"name": "Ana"}))).await;
    let a = add_product(&app, fx.tenant, "A", "10.00", Some("300.00")).await;
    app.ok(
        Method::POST,
        "/invoices",
        fx.tenant,
        Some(json!({"seller_id": seller["id"], "product_ids": [a["id"]]})),
    )
    .await;

    let code = app
        .failed(Method::DELETE, &format!("/sellers/{}", seller["id"].as_str().unwrap()), fx.tenant, None)
        .await;
    assert_eq!(code, "seller_in_use");
    let code = app
        .failed(Method::DELETE, &format!("/products/{}", a["id"].as_str().unwrap()), fx.tenant, None)
        .await;
    assert_eq!(code, "product_in_use");
}
