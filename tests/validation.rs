mod common;

use common::{request, request_with_body, spawn};
use ginza::schema::Regex;
use ginza::{json, App, Context, Error, Field, Schema};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CreateUser {
    name: String,
    email: String,
    age: Option<u32>,
    role: String,
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    city: String,
    zip: String,
}

fn create_user_schema() -> Schema {
    Schema::new()
        .describe("Create a user")
        .field("name", Field::string().required().min_length(2).max_length(50))
        .field("email", Field::string().required().email())
        .field("age", Field::integer().min(18).max(120))
        .field(
            "role",
            Field::string().one_of(["admin", "user", "guest"]).default("user"),
        )
        .field(
            "address",
            Field::object(
                Schema::new()
                    .field("city", Field::string().required())
                    .field(
                        "zip",
                        Field::string()
                            .required()
                            .pattern(Regex::new(r"^\d{5}$").unwrap()),
                    ),
            ),
        )
}

fn app() -> App {
    let mut app = App::new();
    let schema = create_user_schema();
    app.post("/users", move |c: Context| {
        let schema = schema.clone();
        async move {
            let user: CreateUser = c.bind_and_validate(&schema)?;
            c.json(
                201,
                &json!({
                    "name": user.name,
                    "email": user.email,
                    "age": user.age,
                    "role": user.role,
                    "city": user.address.map(|a| format!("{} {}", a.zip, a.city)),
                }),
            )
        }
    })
    .summary("Create a user")
    .tags(["users"])
    .body(create_user_schema());

    let paging = Schema::new()
        .field("page", Field::integer().min(1).default(1))
        .field("limit", Field::integer().min(1).max(100).default(20))
        .field("active", Field::boolean());
    app.get("/users", move |c: Context| {
        let paging = paging.clone();
        async move {
            #[derive(Deserialize)]
            struct Paging {
                page: u32,
                limit: u32,
                active: Option<bool>,
            }
            let q: Paging = c.bind_query_and_validate(&paging)?;
            c.json(200, &json!({ "page": q.page, "limit": q.limit, "active": q.active }))
        }
    });

    app.post("/handled", |c: Context| async move {
        match c.bind_and_validate::<CreateUser>(&create_user_schema()) {
            Ok(user) => c.json(200, &json!({ "name": user.name })),
            Err(Error::Validation(errors)) => c.fail_with_data(
                400,
                "Validation failed",
                json!({ "fields": errors }),
            ),
            Err(other) => Err(other),
        }
    });
    app
}

#[tokio::test]
async fn valid_body_binds_with_defaults() {
    let served = spawn(app()).await;
    let response = request_with_body(
        served.addr,
        "POST",
        "/users",
        "application/json",
        r#"{"name":"Jane Doe","email":"jane@example.com","age":30,"address":{"city":"Springfield","zip":"12345"}}"#,
    )
    .await;

    assert_eq!(response.status, 201);
    assert_eq!(
        response.json(),
        json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "age": 30,
            "role": "user",
            "city": "12345 Springfield",
        })
    );
    served.stop().await.unwrap();
}

#[tokio::test]
async fn invalid_body_reports_every_violation() {
    let served = spawn(app()).await;
    let response = request_with_body(
        served.addr,
        "POST",
        "/users",
        "application/json",
        r#"{"name":"J","email":"not-an-email","age":15,"role":"root","address":{"city":"X","zip":"12"}}"#,
    )
    .await;

    assert_eq!(response.status, 422);
    let body = response.json();
    let details = body["error"]["details"].as_array().unwrap();
    let fields: Vec<_> = details.iter().map(|d| d["field"].as_str().unwrap()).collect();
    assert_eq!(fields, vec!["name", "email", "age", "role", "address.zip"]);
    assert_eq!(details[0]["message"], "name must be at least 2 characters");
    assert_eq!(details[0].as_object().unwrap().len(), 2);
    served.stop().await.unwrap();
}

#[tokio::test]
async fn missing_required_field_is_a_single_error() {
    let served = spawn(app()).await;
    let response = request_with_body(
        served.addr,
        "POST",
        "/users",
        "application/json",
        r#"{"name":"Jane Doe"}"#,
    )
    .await;

    assert_eq!(response.status, 422);
    assert_eq!(
        response.json()["error"]["details"],
        json!([{ "field": "email", "message": "email is required" }])
    );
    served.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let served = spawn(app()).await;
    let response =
        request_with_body(served.addr, "POST", "/users", "application/json", "{\"name\": ").await;
    assert_eq!(response.status, 400);
    assert!(response.json()["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("decode error"));
    served.stop().await.unwrap();
}

#[tokio::test]
async fn form_bodies_are_validated_too() {
    let served = spawn(app()).await;
    let response = request_with_body(
        served.addr,
        "POST",
        "/users",
        "application/x-www-form-urlencoded",
        "name=Jane+Doe&email=jane%40example.com&role=guest",
    )
    .await;
    assert_eq!(response.status, 201);
    assert_eq!(response.json()["role"], "guest");
    served.stop().await.unwrap();
}

#[tokio::test]
async fn handlers_can_shape_validation_failures() {
    let served = spawn(app()).await;
    let response = request_with_body(
        served.addr,
        "POST",
        "/handled",
        "application/json",
        r#"{"name":"Jane Doe","email":"bad"}"#,
    )
    .await;
    assert_eq!(response.status, 400);
    assert_eq!(
        response.json(),
        json!({
            "error": "Validation failed",
            "fields": [{ "field": "email", "message": "email must be a valid email address" }],
        })
    );
    served.stop().await.unwrap();
}

#[tokio::test]
async fn query_parameters_are_coerced() {
    let served = spawn(app()).await;

    let defaults = request(served.addr, "GET", "/users").await;
    assert_eq!(defaults.json(), json!({ "page": 1, "limit": 20, "active": null }));

    let explicit = request(served.addr, "GET", "/users?page=3&limit=50&active=true").await;
    assert_eq!(explicit.json(), json!({ "page": 3, "limit": 50, "active": true }));

    let invalid = request(served.addr, "GET", "/users?page=0&limit=many").await;
    assert_eq!(invalid.status, 422);
    let fields: Vec<_> = invalid.json()["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["page", "limit"]);
    served.stop().await.unwrap();
}

#[test]
fn route_metadata_is_listed() {
    let app = app();
    let routes = app.routes();
    let create = routes.iter().find(|r| r.pattern == "/users" && r.method == ginza::Method::POST).unwrap();
    assert_eq!(create.meta.summary.as_deref(), Some("Create a user"));
    assert_eq!(create.meta.tags, vec!["users".to_string()]);
    let body = create.meta.body.as_ref().unwrap();
    assert_eq!(body.description(), Some("Create a user"));
    assert!(body.get("email").unwrap().is_required());
}
