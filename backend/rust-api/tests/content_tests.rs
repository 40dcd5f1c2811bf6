use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use tower::ServiceExt;

mod common;

use common::TestApp;

async fn get_content(app: &TestApp, query: &str) -> (StatusCode, serde_json::Value) {
    let uri = if query.is_empty() {
        "/api/v1/content".to_string()
    } else {
        format!("/api/v1/content?{}", query)
    };

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    (status, value)
}

fn category_titles(body: &serde_json::Value) -> Vec<String> {
    body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect()
}

fn all_questions(body: &serde_json::Value) -> Vec<serde_json::Value> {
    body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|c| c["questions"].as_array().unwrap().clone())
        .collect()
}

#[tokio::test]
async fn test_content_returns_categories_pagination_and_stats() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "").await;
    assert_eq!(status, StatusCode::OK);

    let titles = category_titles(&body);
    assert!(titles.contains(&"Searching".to_string()));
    assert!(titles.contains(&"Graphs".to_string()));

    let pagination = &body["pagination"];
    assert_eq!(pagination["page"], 1);
    assert_eq!(pagination["limit"], 10);
    assert!(pagination["totalCategories"].as_i64().unwrap() >= 2);
    assert!(pagination["totalPages"].as_i64().unwrap() >= 1);
    assert_eq!(pagination["hasPrevPage"], false);

    let stats = &body["stats"];
    assert!(stats["totalQuestions"].as_i64().unwrap() >= 4);
    assert!(stats["byDifficulty"]["easy"].as_i64().unwrap() >= 2);
}

#[tokio::test]
async fn test_content_search_filters_questions_and_drops_empty_categories() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "search=binary").await;
    assert_eq!(status, StatusCode::OK);

    let titles = category_titles(&body);
    assert!(titles.contains(&"Searching".to_string()));
    assert!(!titles.contains(&"Graphs".to_string()));

    for question in all_questions(&body) {
        assert!(question["title"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("binary"));
    }
}

#[tokio::test]
async fn test_content_difficulty_filter() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "difficulty=easy").await;
    assert_eq!(status, StatusCode::OK);

    let questions = all_questions(&body);
    assert!(!questions.is_empty());
    for question in questions {
        assert_eq!(question["difficulty"], "Easy");
    }

    // Stats are computed over the filtered set
    assert_eq!(body["stats"]["byDifficulty"]["medium"], 0);
    assert_eq!(body["stats"]["byDifficulty"]["hard"], 0);
}

#[tokio::test]
async fn test_content_invalid_difficulty_rejected() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "difficulty=extreme").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_content_invalid_sort_rejected() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "sortBy=rating_asc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = get_content(&app, "sortBy=title_upwards").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_content_sort_by_difficulty_desc() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "sortBy=difficulty_desc").await;
    assert_eq!(status, StatusCode::OK);

    let ordinal = |d: &str| match d {
        "Easy" => 0,
        "Medium" => 1,
        _ => 2,
    };

    for category in body["categories"].as_array().unwrap() {
        let questions = category["questions"].as_array().unwrap();
        for pair in questions.windows(2) {
            let a = ordinal(pair[0]["difficulty"].as_str().unwrap());
            let b = ordinal(pair[1]["difficulty"].as_str().unwrap());
            assert!(a >= b, "questions not sorted by descending difficulty");
        }
    }
}

#[tokio::test]
async fn test_content_pagination_clamps_inputs() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "limit=1000&page=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["limit"], 100);
    assert_eq!(body["pagination"]["page"], 1);

    let (status, body) = get_content(&app, "limit=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["limit"], 1);
}

#[tokio::test]
async fn test_content_pagination_invariant_over_pages() {
    let app = common::create_test_app().await;

    // Walk the catalog one category per page; preceding pages plus the
    // current page never exceed the reported total
    let (_, first) = get_content(&app, "limit=1&page=1").await;
    let total = first["pagination"]["totalCategories"].as_i64().unwrap();
    assert!(total >= 2);

    let mut seen = 0;
    for page in 1..=(total + 1) {
        let (status, body) = get_content(&app, &format!("limit=1&page={}", page)).await;
        assert_eq!(status, StatusCode::OK);

        let count = body["categories"].as_array().unwrap().len() as i64;
        assert!((page - 1) + count <= total || count == 0);
        seen += count;

        let has_next = body["pagination"]["hasNextPage"].as_bool().unwrap();
        assert_eq!(has_next, page < total);
    }
    assert_eq!(seen, total);
}

#[tokio::test]
async fn test_content_search_with_no_matches() {
    let app = common::create_test_app().await;

    let (status, body) = get_content(&app, "search=definitely-not-a-question-title").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["categories"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["totalCategories"], 0);
    assert_eq!(body["stats"]["totalQuestions"], 0);
}
