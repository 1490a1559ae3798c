//! Declarative request validation with accumulated errors.
//!
//! ```sh
//! cargo run --example schema_validation
//! curl -X POST localhost:3000/users -H 'Content-Type: application/json' \
//!      -d '{"name":"J","email":"nope","age":15}'
//! curl 'localhost:3000/users?page=2&limit=10'
//! ```

use ginza::logging::{self, Mode};
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
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Address {
    street: String,
    city: String,
    zip: String,
}

#[derive(Debug, Deserialize)]
struct ListUsers {
    page: u32,
    limit: u32,
}

fn create_user_schema() -> Result<Schema, regex::Error> {
    Ok(Schema::new()
        .describe("User registration payload")
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
                    .field("street", Field::string().required())
                    .field("city", Field::string().required())
                    .field("zip", Field::string().required().pattern(Regex::new(r"^\d{5}$")?)),
            ),
        )
        .field(
            "tags",
            Field::array(Field::string().min_length(2)).max_items(5),
        ))
}

fn main() -> ginza::Result<()> {
    logging::init(Mode::Debug)?;

    let create_user = create_user_schema().map_err(|e| Error::Config(e.to_string()))?;
    let list_users = Schema::new()
        .field("page", Field::integer().min(1).default(1))
        .field("limit", Field::integer().min(1).max(100).default(20));

    let mut app = App::new();

    let schema = create_user.clone();
    app.post("/users", move |c: Context| {
        let schema = schema.clone();
        async move {
            // Validation errors become a 422 with a `details` array.
            let user: CreateUser = c.bind_and_validate(&schema)?;
            c.json(
                201,
                &json!({
                    "message": "User created",
                    "name": user.name,
                    "email": user.email,
                    "age": user.age,
                    "role": user.role,
                    "city": user.address.map(|a| format!("{}, {} {}", a.street, a.city, a.zip)),
                    "tags": user.tags.unwrap_or_default(),
                }),
            )
        }
    })
    .summary("Register a user")
    .tags(["users"])
    .body(create_user);

    app.get("/users", move |c: Context| {
        let schema = list_users.clone();
        async move {
            let q: ListUsers = c.bind_query_and_validate(&schema)?;
            c.json(200, &json!({ "page": q.page, "limit": q.limit, "users": [] }))
        }
    });

    app.listen("127.0.0.1:3000")
}
