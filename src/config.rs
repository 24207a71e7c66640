use crate::error::ValidationError;
use crate::utils;

pub const DEFAULT_DOCUMENT_HRP: &str = "doc_";
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Academic", "Financial", "Administrative", "Procurement"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub document_hrp: String, // bech32 prefix for minted document ids
    pub categories: Vec<String>, // empty accepts any category
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            document_hrp: DEFAULT_DOCUMENT_HRP.to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_document_hrp(mut self, hrp: impl Into<String>) -> Self {
        self.document_hrp = hrp.into();
        self
    }
    pub fn set_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
    pub fn allow_any_category(mut self) -> Self {
        self.categories.clear();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !utils::is_valid_hrp(&self.document_hrp) {
            return Err(ValidationError::InvalidConfig(format!(
                "document_hrp {:?} is not a valid bech32 prefix",
                self.document_hrp
            )));
        }
        Ok(())
    }

    pub fn check_category(&self, category: &str) -> Result<(), ValidationError> {
        if self.categories.is_empty() || self.categories.iter().any(|c| c == category) {
            return Ok(());
        }
        Err(ValidationError::UnknownCategory(category.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.check_category("Procurement").is_ok());
        assert_eq!(
            config.check_category("Sports"),
            Err(ValidationError::UnknownCategory("Sports".into()))
        );
    }

    #[test]
    fn open_category_list() {
        let config = WorkflowConfig::new().allow_any_category();
        assert!(config.check_category("Sports").is_ok());
    }

    #[test]
    fn bad_prefix_is_refused() {
        let config = WorkflowConfig::new().set_document_hrp("");
        assert!(matches!(config.validate(), Err(ValidationError::InvalidConfig(_))));
    }
}
