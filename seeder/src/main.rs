//! Populates a Redis-backed store with a demo organization, its campus
//! locations, and a few found items, so the server has something to show
//! on a fresh install. Optionally grants site-owner privilege to a user id
//! (the same thing as adding that id to the AppAdmins allow-list by hand).
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use reunitems::{
    database::{init_redis, RedisStore},
    models::{ApprovalStatus, GeoPoint, Item, Location, Organization},
    repo,
    store::Store,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Redis connection URL
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Grant site-owner privilege to this user id
    #[arg(long)]
    owner_id: Option<String>,
}

const LOCATIONS: [&str; 3] = ["Gym", "Room 304", "Cafeteria"];

const ITEMS: [(&str, &str, &str); 3] = [
    (
        "Red Water Bottle",
        "Gym",
        "Standard red plastic bottle with a white lid.",
    ),
    (
        "Calculus Textbook",
        "Room 304",
        "AP Calculus AB, 5th Edition. Has a ripped cover.",
    ),
    (
        "Black Hoodie",
        "Cafeteria",
        "Nike hoodie, size M. Found near table 4.",
    ),
];

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let manager = init_redis(&args.redis_url).await;
    let store = RedisStore::new(manager, Duration::from_millis(2000));

    if let Some(owner_id) = &args.owner_id {
        store
            .set(repo::APP_ADMINS, owner_id, serde_json::json!({}))
            .await
            .unwrap();
        println!("Granted site-owner privilege to {owner_id}");
    }

    let pb = ProgressBar::new((1 + LOCATIONS.len() + ITEMS.len()) as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("=> "),
    );

    pb.set_message("Creating organization");
    let org = Organization {
        id: String::new(),
        name: "Branham High School".to_string(),
        address: Some("1775 Branham Ln, San Jose".to_string()),
        point: Some(GeoPoint {
            latitude: 37.2358,
            longitude: -121.8863,
        }),
        approval_status: ApprovalStatus::Approved,
        applied_at: chrono::Utc::now(),
        created_at: chrono::Utc::now(),
    };
    let org_id = repo::add_organization(&store, org).await.unwrap();
    pb.inc(1);

    let mut location_ids = Vec::new();
    for name in LOCATIONS {
        pb.set_message(format!("Adding location {name}"));

        let location = Location {
            id: String::new(),
            name: name.to_string(),
            description: None,
            point: None,
        };
        let id = repo::add_location(&store, &org_id, &location).await.unwrap();

        location_ids.push((name, id));
        pb.inc(1);
    }

    for (name, location, description) in ITEMS {
        pb.set_message(format!("Adding item {name}"));

        let location_id = location_ids
            .iter()
            .find(|(loc_name, _)| *loc_name == location)
            .map(|(_, id)| id.clone())
            .unwrap();

        let item = Item {
            id: String::new(),
            name: name.to_string(),
            description: Some(description.to_string()),
            location_id,
            image_url: None,
            hide_question: None,
            hide_answer: None,
            found_at: chrono::Utc::now(),
        };
        repo::add_item(&store, &org_id, item).await.unwrap();

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    println!("\nSeeded organization: {org_id}");
    println!("Locations: {}", LOCATIONS.len());
    println!("Items: {}", ITEMS.len());
}
