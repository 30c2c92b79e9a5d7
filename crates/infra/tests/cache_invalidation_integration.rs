//! Integration tests for cache invalidation by mutating commands
//!
//! Each test reads through a cache twice to show the second read is served
//! locally, runs the mutation, then reads again and counts server hits.

mod support;

use serde_json::{json, Value};
use support::{stale_session, TestStack};
use warehouse_domain::{NewCompany, NewProduct};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn income(id: i64, archived: bool) -> Value {
    json!({
        "id": id,
        "from_company": {"id": 1, "name": "Acme"},
        "invoice_number": "INV-5",
        "is_archive": archived
    })
}

async fn mount_income(stack: &TestStack, id: i64, expected_reads: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/incomes/{id}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(income(id, false)))
        .expect(expected_reads)
        .mount(&stack.server)
        .await;
}

/// Validates that creating a company refetches the company list.
///
/// # Test Steps
/// 1. Read companies twice and verify one GET
/// 2. Create a company
/// 3. Read again and confirm exactly two GETs in total
#[tokio::test]
async fn test_create_company_invalidates_companies() {
    let stack = TestStack::start(Some(stale_session())).await;
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Acme"}])))
        .expect(2)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/companies/"))
        .and(body_json(json!({"name": "Globex", "phone": "", "inn": "7700000000"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2, "name": "Globex"})))
        .expect(1)
        .mount(&stack.server)
        .await;

    stack.api.companies().await.unwrap();
    stack.api.companies().await.unwrap();
    assert_eq!(stack.api.caches().companies.stats().hits, 1);

    let company = NewCompany {
        name: "Globex".into(),
        phone: String::new(),
        inn: "7700000000".into(),
    };
    let created = stack.api.create_company(&company).await.unwrap();
    assert_eq!(created.id, 2);

    stack.api.companies().await.unwrap();
}

/// Validates that creating a product restarts the full product scan.
///
/// # Test Steps
/// 1. Read all products twice and verify page 1 is fetched once
/// 2. Create a product
/// 3. Read again and confirm page 1 was fetched twice
#[tokio::test]
async fn test_create_product_invalidates_all_products() {
    let stack = TestStack::start(Some(stale_session())).await;
    Mock::given(method("GET"))
        .and(path("/products/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "results": [{"id": 3, "name": "Bolt", "price": 1.5, "kpi": 0.0, "quantity": 10}]
        })))
        .expect(2)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/products/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 4, "name": "Nut"})))
        .expect(1)
        .mount(&stack.server)
        .await;

    assert_eq!(stack.api.all_products().await.unwrap().len(), 1);
    stack.api.all_products().await.unwrap();

    let product = NewProduct { name: "Nut".into(), price: 0.5, kpi: 0.0, quantity: 100 };
    stack.api.create_product(&product).await.unwrap();

    stack.api.all_products().await.unwrap();
}

/// Validates that editing and archiving an income refetch that income.
///
/// # Test Steps
/// 1. Read income 5 twice and verify one GET
/// 2. Patch it, then read again
/// 3. Archive it, then read again
/// 4. Confirm exactly three GETs and two PATCHes
#[tokio::test]
async fn test_income_updates_invalidate_that_income() {
    let stack = TestStack::start(Some(stale_session())).await;
    mount_income(&stack, 5, 3).await;
    Mock::given(method("PATCH"))
        .and(path("/incomes/5/"))
        .and(body_json(json!({"invoice_number": "INV-6"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(income(5, false)))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/incomes/5/"))
        .and(body_json(json!({"is_archive": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(income(5, true)))
        .expect(1)
        .mount(&stack.server)
        .await;

    stack.api.income(5).await.unwrap();
    stack.api.income(5).await.unwrap();

    stack.api.update_income(5, &json!({"invoice_number": "INV-6"})).await.unwrap();
    stack.api.income(5).await.unwrap();

    let archived = stack.api.archive_income(5).await.unwrap();
    assert!(archived.is_archive);
    stack.api.income(5).await.unwrap();
}

/// Validates that marking edits refetch the income they belong to.
///
/// # Test Steps
/// 1. Read income 5 twice and verify one GET
/// 2. Update, then delete a marking of income 5, reading it after each
/// 3. Confirm exactly three GETs of income 5
#[tokio::test]
async fn test_marking_edits_invalidate_owning_income() {
    let stack = TestStack::start(Some(stale_session())).await;
    mount_income(&stack, 5, 3).await;
    Mock::given(method("PUT"))
        .and(path("/incomes/5/products/2/markings/3/"))
        .and(body_json(json!({"marking": "0104600439931256"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "marking": "0104600439931256",
            "product": 2,
            "income": 5
        })))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/incomes/5/products/2/markings/3/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&stack.server)
        .await;

    stack.api.income(5).await.unwrap();
    stack.api.income(5).await.unwrap();

    let updated = stack
        .api
        .update_marking(5, 2, 3, &json!({"marking": "0104600439931256"}))
        .await
        .unwrap();
    assert_eq!(updated.income, Some(5));
    stack.api.income(5).await.unwrap();

    stack.api.delete_marking(5, 2, 3).await.unwrap();
    stack.api.income(5).await.unwrap();
}

/// Validates that a rejected mutation keeps the cached value.
///
/// # Test Steps
/// 1. Read companies once
/// 2. Answer the create call with a validation failure
/// 3. Read again and confirm the list was fetched only once
#[tokio::test]
async fn test_failed_mutation_keeps_cache() {
    let stack = TestStack::start(Some(stale_session())).await;
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/companies/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "inn": ["company with this inn already exists."]
        })))
        .expect(1)
        .mount(&stack.server)
        .await;

    stack.api.companies().await.unwrap();
    let company = NewCompany { name: "Acme".into(), phone: String::new(), inn: "1".into() };
    let err = stack.api.create_company(&company).await.unwrap_err();
    assert_eq!(err.status(), Some(400));

    stack.api.companies().await.unwrap();
}
