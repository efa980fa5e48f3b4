mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::{seed_group, test_app};
use uuid::Uuid;

#[tokio::test]
async fn seller_lifecycle_runs_through_jobs() {
    let app = test_app();
    let tenant = Uuid::new_v4();

    let accepted = app.send(Method::POST, "/sellers", Some(tenant), Some(json!({"name": "Ana"}))).await;
    assert_eq!(accepted.status, StatusCode::ACCEPTED);
    let task_id: Uuid = accepted.body["task_id"].as_str().unwrap().parse().unwrap();
    let done = app.state.jobs.wait(tenant, task_id).await.unwrap();
    assert_eq!(done.result.as_ref().unwrap()["name"], "Ana");

    let list = app.ok(Method::GET, "/sellers", tenant, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let seller = app.ok(Method::POST, "/sellers", tenant, Some(json!({"name": "  Bruno "}))).await;
    assert_eq!(seller["name"], "Bruno");
    let id = seller["id"].as_str().unwrap();

    let renamed = app.ok(Method::PUT, &format!("/sellers/{id}"), tenant, Some(json!({"name": "Bruno M."}))).await;
    assert_eq!(renamed["name"], "Bruno M.");
    let fetched = app.ok(Method::GET, &format!("/sellers/{id}"), tenant, None).await;
    assert_eq!(fetched["name"], "Bruno M.");

    let names: Vec<String> = app
        .ok(Method::GET, "/sellers", tenant, None)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Ana", "Bruno M."]);

    app.ok(Method::DELETE, &format!("/sellers/{id}"), tenant, None).await;
    let code = app.failed(Method::GET, &format!("/sellers/{id}"), tenant, None).await;
    assert_eq!(code, "seller_not_found");
}

#[tokio::test]
async fn duplicate_names_fail_per_tenant_only() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    app.ok(Method::POST, "/shippers", tenant, Some(json!({"name": "DHL"}))).await;

    let code = app.failed(Method::POST, "/shippers", tenant, Some(json!({"name": "DHL"}))).await;
    assert_eq!(code, "duplicate_name");

    let other = Uuid::new_v4();
    app.ok(Method::POST, "/shippers", other, Some(json!({"name": "DHL"}))).await;
    let listed = app.ok(Method::GET, "/shippers", other, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_names_are_rejected_before_dispatch() {
    let app = test_app();
    let reply = app.send(Method::POST, "/locations", Some(Uuid::new_v4()), Some(json!({"name": "   "}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "invalid_name");
    assert_eq!(reply.error_code.as_deref(), Some("invalid_name"));
}

#[tokio::test]
async fn requests_without_tenant_are_rejected() {
    let app = test_app();
    let reply = app.send(Method::GET, "/product-statuses", None, None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "missing_tenant_id");
}

#[tokio::test]
async fn referenced_records_cannot_be_deleted() {
    let app = test_app();
    let fixture = seed_group(&app).await;
    let code = app
        .failed(Method::DELETE, &format!("/shippers/{}", fixture.shipper_id), fixture.tenant, None)
        .await;
    assert_eq!(code, "shipper_in_use");
    let code = app
        .failed(
            Method::DELETE,
            &format!("/shipping-statuses/{}", fixture.shipping_status_id),
            fixture.tenant,
            None,
        )
        .await;
    assert_eq!(code, "shipping_status_in_use");
}

#[tokio::test]
async fn shipping_statuses_support_partial_updates_and_name_lookup() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let status = app
        .ok(Method::POST, "/shipping-statuses", tenant, Some(json!({"name": "Delivered"})))
        .await;
    assert_eq!(status["description"], "");
    let id = status["id"].as_str().unwrap();

    let empty = app.send(Method::PATCH, &format!("/shipping-statuses/{id}"), Some(tenant), Some(json!({}))).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["code"], "no_fields_to_update");

    let updated = app
        .ok(
            Method::PATCH,
            &format!("/shipping-statuses/{id}"),
            tenant,
            Some(json!({"description": "handed to the buyer"})),
        )
        .await;
    assert_eq!(updated["name"], "Delivered");
    assert_eq!(updated["description"], "handed to the buyer");

    let found = app.ok(Method::GET, "/shipping-statuses/by-name/Delivered", tenant, None).await;
    assert_eq!(found["id"], status["id"]);
}

#[tokio::test]
async fn shipping_groups_validate_terms_synchronously() {
    let app = test_app();
    let fixture = seed_group(&app).await;
    let bad = app
        .send(
            Method::POST,
            "/shipping-groups",
            Some(fixture.tenant),
            Some(json!({
                "name": "G2",
                "shipper_id": fixture.shipper_id,
                "status_id": fixture.shipping_status_id,
                "shipping_cost": "50.00",
                "dollar_price": "0",
                "tax_rate": "16"
            })),
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(bad.body["code"], "invalid_shipping_group");

    let patch = app
        .send(
            Method::PATCH,
            &format!("/shipping-groups/{}", fixture.group_id),
            Some(fixture.tenant),
            Some(json!({"dollar_price": "-3"})),
        )
        .await;
    assert_eq!(patch.status, StatusCode::UNPROCESSABLE_ENTITY);

    let updated = app
        .ok(
            Method::PATCH,
            &format!("/shipping-groups/{}", fixture.group_id),
            fixture.tenant,
            Some(json!({"tax_rate": "8"})),
        )
        .await;
    assert_eq!(updated["tax_rate"], "8");
    assert_eq!(updated["shipper"], "DHL");

    for dollar_price in ["0.00001", "20.12345", "100000000"] {
        let refused = app
            .send(
                Method::POST,
                "/shipping-groups",
                Some(fixture.tenant),
                Some(json!({
                    "name": "G3",
                    "shipper_id": fixture.shipper_id,
                    "status_id": fixture.shipping_status_id,
                    "shipping_cost": "50.00",
                    "dollar_price": dollar_price,
                    "tax_rate": "16"
                })),
            )
            .await;
        assert_eq!(refused.status, StatusCode::BAD_REQUEST, "{dollar_price}");
        assert_eq!(refused.body["code"], "invalid_price", "{dollar_price}");
    }
    let precise = app
        .send(
            Method::PATCH,
            &format!("/shipping-groups/{}", fixture.group_id),
            Some(fixture.tenant),
            Some(json!({"dollar_price": "20.12345"})),
        )
        .await;
    assert_eq!(precise.status, StatusCode::BAD_REQUEST);
    assert_eq!(precise.body["code"], "invalid_price");
    let fine = app
        .ok(
            Method::PATCH,
            &format!("/shipping-groups/{}", fixture.group_id),
            fixture.tenant,
            Some(json!({"dollar_price": "20.1234"})),
        )
        .await;
    assert_eq!(fine["dollar_price"], "20.1234");

    let by_name = app.ok(Method::GET, "/shipping-groups/by-name/G1", fixture.tenant, None).await;
    assert_eq!(by_name["id"].as_str(), Some(fixture.group_id.as_str()));
}
