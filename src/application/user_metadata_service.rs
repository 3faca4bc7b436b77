// 公開ユーザーメタデータの取得と更新

use thiserror::Error;
use tracing::info;

use crate::domain::{
    PublicUserMetadata, PublicUserMetadataOutput, UserMetadataSubmission, ValidationErrors,
};
use crate::infrastructure::{UserMetadataRepository, UserMetadataRepositoryError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserMetadataServiceError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Repository error: {0}")]
    RepositoryError(String),
}

impl From<UserMetadataRepositoryError> for UserMetadataServiceError {
    fn from(error: UserMetadataRepositoryError) -> Self {
        Self::RepositoryError(error.to_string())
    }
}

impl From<ValidationErrors> for UserMetadataServiceError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

pub struct UserMetadataService<UR>
where
    UR: UserMetadataRepository,
{
    user_metadata_repo: UR,
}

impl<UR> UserMetadataService<UR>
where
    UR: UserMetadataRepository,
{
    pub fn new(user_metadata_repo: UR) -> Self {
        Self { user_metadata_repo }
    }

    /// アカウントの公開ユーザー名を取得（未登録ならnull）
    pub async fn get_public_user_metadata(
        &self,
        account_id: &str,
    ) -> Result<PublicUserMetadataOutput, UserMetadataServiceError> {
        let metadata = self.user_metadata_repo.get(account_id).await?;
        Ok(metadata.into())
    }

    /// ユーザー名が未設定の場合のみデフォルト名を保存する
    ///
    /// 既にユーザー名があればそれを変更せずに返す。
    pub async fn put_public_user_metadata(
        &self,
        account_id: &str,
        default_username: &str,
    ) -> Result<PublicUserMetadataOutput, UserMetadataServiceError> {
        if let Some(existing) = self
            .user_metadata_repo
            .get(account_id)
            .await?
            .and_then(|metadata| metadata.username)
        {
            return Ok(PublicUserMetadataOutput {
                username: Some(existing),
            });
        }

        let metadata = PublicUserMetadata::new(account_id, Some(default_username.to_string()));
        self.user_metadata_repo.put(&metadata).await?;
        info!(account_id = account_id, "デフォルトのユーザー名を保存");

        Ok(PublicUserMetadataOutput {
            username: metadata.username,
        })
    }

    /// 検証したうえでユーザー名を保存（既存は上書き）
    pub async fn upsert_public_user_metadata(
        &self,
        submission: UserMetadataSubmission,
    ) -> Result<PublicUserMetadataOutput, UserMetadataServiceError> {
        let metadata = submission.validate()?;
        self.user_metadata_repo.put(&metadata).await?;
        info!(
            account_id = metadata.account_id.as_str(),
            "ユーザー名を更新"
        );

        Ok(PublicUserMetadataOutput {
            username: metadata.username,
        })
    }
}
