// 入力検証結果の表現
//
// フィールド単位の拒否理由を集め、1件でもあれば検証失敗とする。

use std::fmt;

/// 必須フィールドが欠けている
pub const REJECTION_REQUIRED_CODE: &str = "field.required";

/// フィールドの形式が不正
pub const REJECTION_FORMAT_CODE: &str = "field.invalidFormat";

/// 1フィールドの拒否理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub code: &'static str,
    pub reason: String,
}

/// 検証対象オブジェクトの拒否理由一覧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    object_name: &'static str,
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new(object_name: &'static str) -> Self {
        Self {
            object_name,
            errors: Vec::new(),
        }
    }

    pub fn reject(&mut self, field: &'static str, code: &'static str, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            code,
            reason: reason.into(),
        });
    }

    /// 値が欠けている、または空白のみの場合に必須違反として拒否
    pub fn require_text(&mut self, field: &'static str, value: Option<&str>, reason: &str) {
        if value.is_none_or(|v| v.trim().is_empty()) {
            self.reject(field, REJECTION_REQUIRED_CODE, reason);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn object_name(&self) -> &str {
        self.object_name
    }

    /// 拒否されたフィールドがあるか
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// 拒否理由がなければ`value`を返す
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed for object='{}'. Error count: {}",
            self.object_name,
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "; {} [{}]: {}", error.field, error.code, error.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_errors_into_ok() {
        let errors = ValidationErrors::new("review");
        assert!(errors.is_empty());
        assert_eq!(errors.into_result(42), Ok(42));
    }

    #[test]
    fn test_rejected_errors_into_err() {
        let mut errors = ValidationErrors::new("review");
        errors.reject("score", REJECTION_REQUIRED_CODE, "The score is required.");

        let result = errors.into_result(());
        let errors = result.unwrap_err();
        assert_eq!(errors.errors().len(), 1);
        assert!(errors.has_field("score"));
        assert!(!errors.has_field("title"));
    }

    #[test]
    fn test_require_text() {
        let mut errors = ValidationErrors::new("review");
        errors.require_text("title", None, "The title is required.");
        errors.require_text("body", Some("   "), "The body is required.");
        errors.require_text("restaurantId", Some("r1"), "The restaurant ID is required.");

        assert_eq!(errors.errors().len(), 2);
        assert!(errors.has_field("title"));
        assert!(errors.has_field("body"));
        assert!(!errors.has_field("restaurantId"));
    }

    #[test]
    fn test_display() {
        let mut errors = ValidationErrors::new("review");
        errors.reject("score", REJECTION_REQUIRED_CODE, "The score is required.");
        assert_eq!(
            errors.to_string(),
            "Validation failed for object='review'. Error count: 1; score [field.required]: The score is required."
        );
    }
}
