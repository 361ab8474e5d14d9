use chrono::{DateTime, Utc};
use prepquest::db::{Entity, Value};
use prepquest::util::now;
use serde::{Deserialize, Serialize};

/// One row of `question`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    /// JSON array of tag strings.
    pub tags: Option<String>,
    pub answer: Option<String>,
    pub user_id: i64,
    pub edit_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Question {
    /// An unsaved question; `id` stays 0 until inserted.
    pub fn new(title: impl Into<String>, user_id: i64) -> Self {
        let now = now();
        Self {
            id: 0,
            title: title.into(),
            content: None,
            tags: None,
            answer: None,
            user_id,
            edit_time: now,
            create_time: now,
            update_time: now,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = Some(serde_json::Value::from(tags).to_string());
        self
    }

    /// Decodes `tags`; a missing column reads as no tags.
    pub fn tag_list(&self) -> prepquest::Result<Vec<String>> {
        match self.tags.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                anyhow::Error::new(e)
                    .context("question.tags is not a JSON string array")
                    .into()
            }),
        }
    }

    /// Marks the content as edited now.
    pub fn touch(&mut self) {
        let now = now();
        self.edit_time = now;
        self.update_time = now;
    }
}

impl Entity for Question {
    const TABLE: &'static str = "question";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "content",
        "tags",
        "answer",
        "user_id",
        "edit_time",
        "create_time",
        "update_time",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.title.clone().into(),
            self.content.clone().into(),
            self.tags.clone().into(),
            self.answer.clone().into(),
            self.user_id.into(),
            self.edit_time.into(),
            self.create_time.into(),
            self.update_time.into(),
        ]
    }
}

/// One row of `question_bank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Cover image URL.
    pub picture: Option<String>,
    pub user_id: i64,
    pub edit_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl QuestionBank {
    pub fn new(title: impl Into<String>, user_id: i64) -> Self {
        let now = now();
        Self {
            id: 0,
            title: title.into(),
            description: None,
            picture: None,
            user_id,
            edit_time: now,
            create_time: now,
            update_time: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    pub fn touch(&mut self) {
        let now = now();
        self.edit_time = now;
        self.update_time = now;
    }
}

impl Entity for QuestionBank {
    const TABLE: &'static str = "question_bank";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "picture",
        "user_id",
        "edit_time",
        "create_time",
        "update_time",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.title.clone().into(),
            self.description.clone().into(),
            self.picture.clone().into(),
            self.user_id.into(),
            self.edit_time.into(),
            self.create_time.into(),
            self.update_time.into(),
        ]
    }
}
