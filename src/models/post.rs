use serde::{Deserialize, Serialize};
use crate::record::Item;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl Post {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl Item for Post {
    type Patch = PostPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: PostPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
    }
}
