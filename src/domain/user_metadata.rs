// 公開ユーザーメタデータ（accountId → username）

use serde::{Deserialize, Serialize};

use crate::domain::ValidationErrors;

/// ユーザーメタデータテーブルの1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserMetadata {
    pub account_id: String,
    /// 設定されるまではnull
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl PublicUserMetadata {
    pub fn new(account_id: impl Into<String>, username: Option<String>) -> Self {
        Self {
            account_id: account_id.into(),
            username,
        }
    }
}

/// ユーザーメタデータ系エンドポイントの応答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUserMetadataOutput {
    pub username: Option<String>,
}

impl From<Option<PublicUserMetadata>> for PublicUserMetadataOutput {
    fn from(metadata: Option<PublicUserMetadata>) -> Self {
        Self {
            username: metadata.and_then(|m| m.username),
        }
    }
}

/// ユーザーメタデータ更新リクエストのボディ
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadataSubmission {
    pub account_id: Option<String>,
    pub username: Option<String>,
}

impl UserMetadataSubmission {
    /// accountIdとusernameの両方が必須
    pub fn validate(self) -> Result<PublicUserMetadata, ValidationErrors> {
        let mut errors = ValidationErrors::new("publicUserMetadata");
        errors.require_text(
            "accountId",
            self.account_id.as_deref(),
            "The account ID is required.",
        );
        errors.require_text(
            "username",
            self.username.as_deref(),
            "The username is required.",
        );

        errors.into_result(())?;

        Ok(PublicUserMetadata {
            account_id: self.account_id.unwrap_or_default(),
            username: self.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_from_missing_metadata() {
        let output = PublicUserMetadataOutput::from(None);
        assert_eq!(output.username, None);
        assert_eq!(serde_json::to_string(&output).unwrap(), r#"{"username":null}"#);
    }

    #[test]
    fn test_output_from_metadata() {
        let output =
            PublicUserMetadataOutput::from(Some(PublicUserMetadata::new("a1", Some("fryfan".to_string()))));
        assert_eq!(output.username.as_deref(), Some("fryfan"));
    }

    #[test]
    fn test_submission_valid() {
        let submission = UserMetadataSubmission {
            account_id: Some("a1".to_string()),
            username: Some("fryfan".to_string()),
        };
        let metadata = submission.validate().unwrap();
        assert_eq!(metadata, PublicUserMetadata::new("a1", Some("fryfan".to_string())));
    }

    #[test]
    fn test_submission_missing_fields() {
        let errors = UserMetadataSubmission::default().validate().unwrap_err();
        assert!(errors.has_field("accountId"));
        assert!(errors.has_field("username"));
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn test_metadata_deserializes_without_username() {
        let metadata: PublicUserMetadata = serde_json::from_str(r#"{"accountId":"a1"}"#).unwrap();
        assert_eq!(metadata.username, None);
    }
}
