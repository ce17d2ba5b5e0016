//! Drives the full approval scenario against a running server: the site
//! owner approves a freshly registered organization, a student applies and
//! is approved by the founder, and the student's fuzzy item search finds a
//! misspelled item. Grants the owner allow-list entry directly in Redis,
//! the same way an operator would.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use reqwest::Client;
use serde_json::{json, Value};

use reunitems::{
    database::{init_redis, RedisStore},
    repo,
    store::Store,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of a running server
    #[arg(long, default_value = "http://127.0.0.1:1111")]
    base_url: String,

    /// Redis connection URL, used to grant the site-owner allow-list entry
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let client = Client::new();

    let run = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    println!("Signing up owner, founder, and student...");
    let owner = signup(&client, &args.base_url, &format!("owner-{run}@example.com")).await;
    let founder = signup(&client, &args.base_url, &format!("alice-{run}@example.com")).await;
    let student = signup(&client, &args.base_url, &format!("bob-{run}@example.com")).await;

    println!("Granting site-owner privilege to {}...", owner.user_id);
    let manager = init_redis(&args.redis_url).await;
    let store = RedisStore::new(manager, Duration::from_millis(2000));
    store
        .set(repo::APP_ADMINS, &owner.user_id, json!({}))
        .await
        .unwrap();

    println!("Founder registers Branham...");
    let org = post(
        &client,
        &format!("{}/organizations", args.base_url),
        &founder.token,
        json!({ "name": "Branham" }),
    )
    .await;
    let org_id = org["id"].as_str().unwrap().to_string();

    println!("Owner reviews pending organizations...");
    let pending = get(
        &client,
        &format!("{}/organizations/pending", args.base_url),
        &owner.token,
    )
    .await;
    assert!(
        pending
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["id"] == json!(org_id)),
        "registered organization should be pending"
    );

    println!("Owner approves the organization...");
    post(
        &client,
        &format!("{}/organizations/{org_id}/approve", args.base_url),
        &owner.token,
        json!({}),
    )
    .await;

    let founder_orgs = get(
        &client,
        &format!("{}/me/organizations", args.base_url),
        &founder.token,
    )
    .await;
    let founder_member = &founder_orgs.as_array().unwrap()[0]["member"];
    assert_eq!(founder_member["role"], json!("superadmin"));
    assert_eq!(founder_member["applicationStatus"], json!("approved"));

    println!("Student applies as regular...");
    post(
        &client,
        &format!("{}/organizations/{org_id}/applications", args.base_url),
        &student.token,
        json!({ "role": "regular" }),
    )
    .await;

    println!("Founder approves the student...");
    post(
        &client,
        &format!(
            "{}/organizations/{org_id}/members/{}/approve",
            args.base_url, student.user_id
        ),
        &founder.token,
        json!({}),
    )
    .await;

    let student_orgs = get(
        &client,
        &format!("{}/me/organizations", args.base_url),
        &student.token,
    )
    .await;
    let student_member = &student_orgs.as_array().unwrap()[0]["member"];
    assert_eq!(student_member["role"], json!("regular"));
    assert_eq!(student_member["applicationStatus"], json!("approved"));

    println!("Founder catalogs a location and an item...");
    let location = post(
        &client,
        &format!("{}/organizations/{org_id}/locations", args.base_url),
        &founder.token,
        json!({ "name": "Gym" }),
    )
    .await;
    post(
        &client,
        &format!("{}/organizations/{org_id}/items", args.base_url),
        &founder.token,
        json!({
            "name": "Red Water Bottle",
            "locationId": location["id"],
            "description": "Standard red plastic bottle with a white lid."
        }),
    )
    .await;

    println!("Student searches with a misspelling...");
    let results = get(
        &client,
        &format!("{}/items?q=botle", args.base_url),
        &student.token,
    )
    .await;
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], json!("Red Water Bottle"));
    assert_eq!(results[0]["location"], json!("Gym"));

    println!("\nAll steps passed.");
}

struct Session {
    token: String,
    user_id: String,
}

async fn signup(client: &Client, base_url: &str, email: &str) -> Session {
    let response = client
        .post(format!("{base_url}/auth/signup"))
        .json(&json!({ "email": email, "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "signup failed for {email}");

    let body: Value = response.json().await.unwrap();

    Session {
        token: body["token"].as_str().unwrap().to_string(),
        user_id: body["userId"].as_str().unwrap().to_string(),
    }
}

async fn post(client: &Client, url: &str, token: &str, body: Value) -> Value {
    let response = client
        .post(url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(
        response.status().is_success(),
        "POST {url} failed: {}",
        response.status()
    );

    response.json().await.unwrap_or(Value::Null)
}

async fn get(client: &Client, url: &str, token: &str) -> Value {
    let response = client.get(url).bearer_auth(token).send().await.unwrap();
    assert!(
        response.status().is_success(),
        "GET {url} failed: {}",
        response.status()
    );

    response.json().await.unwrap()
}
