#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use codeplatter_api::{
    config::Config,
    create_router,
    models::otp::{OtpPurpose, PendingRegistration},
    services::{
        otp_ledger::{MemoryOtpStore, OtpStore},
        AppState,
    },
};
use mongodb::bson::{doc, oid::ObjectId};

/// Low bcrypt cost keeps the test suite fast; production uses the default.
pub const TEST_BCRYPT_COST: u32 = 4;

pub struct TestApp {
    pub router: Router,
    /// Concrete handle onto the app's OTP store so tests can plant codes
    /// they know instead of reading outbound email.
    pub otp: Arc<MemoryOtpStore>,
    pub mongo: mongodb::Database,
}

pub async fn create_test_app() -> TestApp {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // No outbound mail and no throttling inside the suite
    std::env::set_var("EMAIL_SEND_DISABLED", "1");
    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let otp = Arc::new(MemoryOtpStore::new());

    // Create app state (connection is established inside)
    let app_state = Arc::new(
        AppState::with_otp_store(
            config.clone(),
            mongo_client.clone(),
            redis_client,
            otp.clone() as Arc<dyn OtpStore>,
        )
        .await
        .expect("Failed to initialize test app state"),
    );

    // Seed test data
    let mongo = mongo_client.database(&config.mongo_database);
    seed_catalog(&mongo).await;

    TestApp {
        router: create_router(app_state),
        otp,
        mongo,
    }
}

/// Plant a registration record with a code the test knows, then return
/// the code. Overwrites whatever code the API issued for the email.
pub fn plant_registration_code(app: &TestApp, email: &str, name: &str, password: &str) -> String {
    let password_hash =
        bcrypt::hash(password, TEST_BCRYPT_COST).expect("Failed to hash test password");
    app.otp.issue_at(
        Utc::now(),
        email,
        OtpPurpose::Registration,
        Some(PendingRegistration {
            name: name.to_string(),
            password_hash,
        }),
    )
}

/// Plant a password-reset record and return its code.
pub fn plant_reset_code(app: &TestApp, email: &str) -> String {
    app.otp
        .issue_at(Utc::now(), email, OtpPurpose::PasswordReset, None)
}

// Stable ids so re-seeding across parallel suites stays idempotent
pub const CATEGORY_SEARCHING_ID: &str = "65a000000000000000000001";
pub const CATEGORY_GRAPHS_ID: &str = "65a000000000000000000002";
pub const QUESTION_BINARY_SEARCH_ID: &str = "65a000000000000000000101";
pub const QUESTION_LINEAR_SEARCH_ID: &str = "65a000000000000000000102";
pub const QUESTION_DIJKSTRA_ID: &str = "65a000000000000000000103";
pub const QUESTION_MAX_FLOW_ID: &str = "65a000000000000000000104";

async fn seed_catalog(mongo: &mongodb::Database) {
    let now = mongodb::bson::DateTime::now();

    let questions = [
        (QUESTION_BINARY_SEARCH_ID, "Binary Search", "Easy"),
        (QUESTION_LINEAR_SEARCH_ID, "Linear Search", "Easy"),
        (QUESTION_DIJKSTRA_ID, "Dijkstra Shortest Path", "Medium"),
        (QUESTION_MAX_FLOW_ID, "Maximum Flow", "Hard"),
    ];

    let questions_collection = mongo.collection::<mongodb::bson::Document>("questions");
    for (id, title, difficulty) in questions {
        let oid = ObjectId::parse_str(id).unwrap();
        let exists = questions_collection
            .find_one(doc! { "_id": oid })
            .await
            .unwrap();
        if exists.is_none() {
            // Ignore duplicate key errors from parallel seeding
            let _ = questions_collection
                .insert_one(doc! {
                    "_id": oid,
                    "title": title,
                    "links": [format!("https://practice.example.com/{}", id)],
                    "difficulty": difficulty,
                    "createdAt": now,
                    "updatedAt": now,
                })
                .await;
        }
    }

    let categories = [
        (
            CATEGORY_SEARCHING_ID,
            "Searching",
            vec![QUESTION_BINARY_SEARCH_ID, QUESTION_LINEAR_SEARCH_ID],
        ),
        (
            CATEGORY_GRAPHS_ID,
            "Graphs",
            vec![QUESTION_DIJKSTRA_ID, QUESTION_MAX_FLOW_ID],
        ),
    ];

    let categories_collection = mongo.collection::<mongodb::bson::Document>("categories");
    for (id, title, question_ids) in categories {
        let oid = ObjectId::parse_str(id).unwrap();
        let question_oids: Vec<ObjectId> = question_ids
            .iter()
            .map(|q| ObjectId::parse_str(q).unwrap())
            .collect();
        let exists = categories_collection
            .find_one(doc! { "_id": oid })
            .await
            .unwrap();
        if exists.is_none() {
            let _ = categories_collection
                .insert_one(doc! {
                    "_id": oid,
                    "title": title,
                    "questions": question_oids,
                    "createdAt": now,
                    "updatedAt": now,
                })
                .await;
        }
    }
}
