//! FileGate port - attachment existence checks.
//!
//! Attachment storage lives outside the core. The core only ever asks
//! "does at least one file of category X exist for this deal", which
//! gates transitions such as submitting a draft for review.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{DealId, DomainError};

/// Category an attachment is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Brief,
    Draft,
    Final,
    Legal,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Brief => "brief",
            FileCategory::Draft => "draft",
            FileCategory::Final => "final",
            FileCategory::Legal => "legal",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Port for attachment existence checks.
#[async_trait]
pub trait FileGate: Send + Sync {
    /// True if at least one file of the category exists for the deal.
    async fn has_file(&self, deal_id: &DealId, category: FileCategory)
        -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn FileGate) {}

    #[test]
    fn category_has_stable_string_form() {
        assert_eq!(FileCategory::Draft.as_str(), "draft");
        assert_eq!(FileCategory::Legal.to_string(), "legal");
    }
}
