use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct List {
    pub id: i64,
    pub title: String,
    pub board_id: i64,
    pub position: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub list_id: i64,
    pub position: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub id: i64,
    pub title: String,
    pub color: String,
    pub board_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub card_id: i64,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDetail {
    #[serde(flatten)]
    pub board: Board,
    pub lists: Vec<ListWithCards>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListWithCards {
    #[serde(flatten)]
    pub list: List,
    pub cards: Vec<CardSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSummary {
    #[serde(flatten)]
    pub card: Card,
    pub labels: Vec<Label>,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetail {
    #[serde(flatten)]
    pub card: Card,
    pub labels: Vec<Label>,
    pub comments: Vec<Comment>,
}

// Partial updates. `None` means "leave the stored value alone".

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl BoardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPatch {
    pub title: Option<String>,
    /// Routed through the move algorithm, never written directly.
    pub position: Option<i32>,
}

impl ListPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.position.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `list_id` and `position` are routed through the move algorithm.
    pub list_id: Option<i64>,
    pub position: Option<i32>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.list_id.is_none()
            && self.position.is_none()
    }

    pub fn touches_placement(&self) -> bool {
        self.list_id.is_some() || self.position.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelPatch {
    pub title: Option<String>,
    pub color: Option<String>,
}

impl LabelPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.color.is_none()
    }
}

/// Blank descriptions are stored as NULL.
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
