use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Question difficulty with a fixed ordinal (Easy < Medium < Hard) used
/// for difficulty sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(()),
        }
    }
}

/// Category document stored in the "categories" collection. The question
/// list keeps the curated order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<ObjectId>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

/// Question document stored in the "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    /// External practice links (problem statements, editorials)
    #[serde(default)]
    pub links: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

/// Query params for GET /api/v1/content
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    pub search: Option<String>,
    pub difficulty: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub title: String,
    pub links: Vec<String>,
    pub difficulty: Difficulty,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        QuestionView {
            id: question.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: question.title.clone(),
            links: question.links.clone(),
            difficulty: question.difficulty,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub id: String,
    pub title: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total_categories: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct DifficultyBreakdown {
    pub easy: i64,
    pub medium: i64,
    pub hard: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_categories: i64,
    pub total_questions: i64,
    pub by_difficulty: DifficultyBreakdown,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub categories: Vec<CategoryView>,
    pub pagination: PaginationMeta,
    pub stats: CatalogStats,
}
