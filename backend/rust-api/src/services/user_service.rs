use std::collections::HashMap;

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};

use crate::errors::{AppError, AppResult};
use crate::models::catalog::{Question, QuestionView};
use crate::models::user::User;

/// Per-user question collections: bookmarks and completion progress.
/// Both are ordered lists of question ids on the user document.
pub struct UserService {
    mongo: Database,
}

impl UserService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Toggle a question in the user's bookmark list. Returns the
    /// resulting membership state.
    pub async fn toggle_bookmark(&self, user_id: &str, question_id: &str) -> AppResult<bool> {
        self.toggle_question_ref(user_id, question_id, "bookmarks")
            .await
    }

    /// Toggle a question in the user's completed list.
    pub async fn toggle_progress(&self, user_id: &str, question_id: &str) -> AppResult<bool> {
        self.toggle_question_ref(user_id, question_id, "completed")
            .await
    }

    pub async fn list_bookmarks(&self, user_id: &str) -> AppResult<Vec<QuestionView>> {
        let user = self.load_user(user_id).await?;
        self.resolve_questions(&user.bookmarks).await
    }

    pub async fn list_progress(&self, user_id: &str) -> AppResult<Vec<QuestionView>> {
        let user = self.load_user(user_id).await?;
        self.resolve_questions(&user.completed).await
    }

    pub async fn update_profile(&self, user_id: &str, name: &str) -> AppResult<User> {
        let object_id = parse_user_id(user_id)?;
        let users = self.mongo.collection::<User>("users");

        let result = users
            .update_one(
                doc! { "_id": object_id },
                doc! {
                    "$set": {
                        "name": name,
                        "updatedAt": mongodb::bson::DateTime::now()
                    }
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::not_found("User not found"));
        }

        self.load_user(user_id).await
    }

    async fn toggle_question_ref(
        &self,
        user_id: &str,
        question_id: &str,
        field: &str,
    ) -> AppResult<bool> {
        let question_oid = ObjectId::parse_str(question_id)
            .map_err(|_| AppError::validation("Invalid question ID format"))?;

        let questions: Collection<Question> = self.mongo.collection("questions");
        let question = questions.find_one(doc! { "_id": question_oid }).await?;
        if question.is_none() {
            return Err(AppError::not_found("Question not found"));
        }

        let user = self.load_user(user_id).await?;
        let object_id = parse_user_id(user_id)?;

        let list = match field {
            "bookmarks" => &user.bookmarks,
            _ => &user.completed,
        };
        let present = list.contains(&question_oid);

        let update = if present {
            doc! {
                "$pull": { field: question_oid },
                "$set": { "updatedAt": mongodb::bson::DateTime::now() }
            }
        } else {
            doc! {
                "$addToSet": { field: question_oid },
                "$set": { "updatedAt": mongodb::bson::DateTime::now() }
            }
        };

        let users = self.mongo.collection::<User>("users");
        users.update_one(doc! { "_id": object_id }, update).await?;

        Ok(!present)
    }

    async fn load_user(&self, user_id: &str) -> AppResult<User> {
        let object_id = parse_user_id(user_id)?;

        let users = self.mongo.collection::<User>("users");
        users
            .find_one(doc! { "_id": object_id })
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Resolve question ids to documents, keeping the list's order.
    /// Dangling references (deleted questions) are skipped.
    async fn resolve_questions(&self, ids: &[ObjectId]) -> AppResult<Vec<QuestionView>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let questions: Collection<Question> = self.mongo.collection("questions");
        let mut cursor = questions.find(doc! { "_id": { "$in": ids } }).await?;

        let mut map: HashMap<ObjectId, Question> = HashMap::new();
        while let Some(question) = cursor.try_next().await? {
            if let Some(id) = question.id {
                map.insert(id, question);
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| map.get(id))
            .map(QuestionView::from)
            .collect())
    }
}

fn parse_user_id(user_id: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(user_id).map_err(|_| AppError::validation("Invalid user ID format"))
}
