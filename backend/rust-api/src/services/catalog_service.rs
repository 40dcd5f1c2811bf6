use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::FindOptions,
    Collection, Database,
};

use crate::errors::{AppError, AppResult};
use crate::models::catalog::{
    CatalogResponse, CatalogStats, Category, CategoryView, ContentQuery, Difficulty,
    DifficultyBreakdown, PaginationMeta, Question, QuestionView,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortField {
    Title,
    Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortSpec {
    field: SortField,
    direction: SortDirection,
}

pub struct CatalogService {
    mongo: Database,
}

impl CatalogService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Build the browsing response: filter questions, assemble categories,
    /// sort, then paginate the category list in memory.
    pub async fn browse(&self, query: ContentQuery) -> AppResult<CatalogResponse> {
        let page = clamp_page(query.page);
        let limit = clamp_limit(query.limit);

        let difficulty = query
            .difficulty
            .as_deref()
            .map(|value| {
                Difficulty::from_str(value)
                    .map_err(|_| AppError::validation(format!("Unknown difficulty: {}", value)))
            })
            .transpose()?;

        let sorts = query
            .sort_by
            .as_deref()
            .map(parse_sort_by)
            .transpose()?
            .unwrap_or_default();

        let filter_active = query.search.is_some() || difficulty.is_some();

        let questions = self.load_questions(query.search.as_deref(), difficulty).await?;
        let categories = self.load_categories().await?;

        let mut assembled: Vec<CategoryView> = categories
            .iter()
            .filter_map(|category| {
                // Preserve the curated question order unless a sort is given
                let mut views: Vec<QuestionView> = category
                    .questions
                    .iter()
                    .filter_map(|id| questions.get(id))
                    .map(QuestionView::from)
                    .collect();

                if filter_active && views.is_empty() {
                    return None;
                }

                if !sorts.is_empty() {
                    views.sort_by(|a, b| compare_questions(a, b, &sorts));
                }

                Some(CategoryView {
                    id: category.id.map(|id| id.to_hex()).unwrap_or_default(),
                    title: category.title.clone(),
                    questions: views,
                })
            })
            .collect();

        let stats = compute_stats(&assembled);
        let (page_items, pagination) = paginate(&mut assembled, page, limit);

        Ok(CatalogResponse {
            categories: page_items,
            pagination,
            stats,
        })
    }

    async fn load_questions(
        &self,
        search: Option<&str>,
        difficulty: Option<Difficulty>,
    ) -> AppResult<HashMap<ObjectId, Question>> {
        let mut filter = Document::new();

        if let Some(search) = search {
            filter.insert(
                "title",
                doc! { "$regex": format!("(?i){}", regex::escape(search)) },
            );
        }

        if let Some(difficulty) = difficulty {
            filter.insert("difficulty", difficulty.as_str());
        }

        let collection: Collection<Question> = self.mongo.collection("questions");
        let mut cursor = collection.find(filter).await?;

        let mut map = HashMap::new();
        while let Some(question) = cursor.try_next().await? {
            if let Some(id) = question.id {
                map.insert(id, question);
            }
        }
        Ok(map)
    }

    async fn load_categories(&self) -> AppResult<Vec<Category>> {
        let find_options = FindOptions::builder().sort(doc! { "title": 1 }).build();

        let collection: Collection<Category> = self.mongo.collection("categories");
        let cursor = collection
            .find(Document::new())
            .with_options(find_options)
            .await?;

        Ok(cursor.try_collect().await?)
    }
}

fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Parse a comma-separated list of `field_direction` pairs, e.g.
/// `difficulty_asc,title_desc`.
fn parse_sort_by(value: &str) -> AppResult<Vec<SortSpec>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (field, direction) = pair
                .rsplit_once('_')
                .ok_or_else(|| AppError::validation(format!("Invalid sort pair: {}", pair)))?;

            let field = match field {
                "title" => SortField::Title,
                "difficulty" => SortField::Difficulty,
                other => {
                    return Err(AppError::validation(format!("Unknown sort field: {}", other)))
                }
            };

            let direction = match direction {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                other => {
                    return Err(AppError::validation(format!(
                        "Unknown sort direction: {}",
                        other
                    )))
                }
            };

            Ok(SortSpec { field, direction })
        })
        .collect()
}

fn compare_questions(a: &QuestionView, b: &QuestionView, sorts: &[SortSpec]) -> Ordering {
    for spec in sorts {
        let ordering = match spec.field {
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Difficulty => a.difficulty.ordinal().cmp(&b.difficulty.ordinal()),
        };

        let ordering = match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compute_stats(categories: &[CategoryView]) -> CatalogStats {
    let mut by_difficulty = DifficultyBreakdown::default();
    let mut total_questions = 0;

    for category in categories {
        for question in &category.questions {
            total_questions += 1;
            match question.difficulty {
                Difficulty::Easy => by_difficulty.easy += 1,
                Difficulty::Medium => by_difficulty.medium += 1,
                Difficulty::Hard => by_difficulty.hard += 1,
            }
        }
    }

    CatalogStats {
        total_categories: categories.len() as i64,
        total_questions,
        by_difficulty,
    }
}

/// Slice one page out of the assembled category list and derive the
/// pagination metadata from the total count.
fn paginate(
    categories: &mut Vec<CategoryView>,
    page: i64,
    limit: i64,
) -> (Vec<CategoryView>, PaginationMeta) {
    let total_categories = categories.len() as i64;
    let total_pages = if total_categories == 0 {
        0
    } else {
        (total_categories as u64).div_ceil(limit as u64) as i64
    };

    let start = (page - 1).saturating_mul(limit).min(total_categories) as usize;
    let end = (start + limit as usize).min(total_categories as usize);
    let page_items = categories.drain(start..end).collect();

    let pagination = PaginationMeta {
        page,
        limit,
        total_categories,
        total_pages,
        has_next_page: page < total_pages,
        has_prev_page: page > 1 && total_categories > 0,
    };

    (page_items, pagination)
}
