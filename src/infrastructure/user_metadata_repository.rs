/// 公開ユーザーメタデータテーブルのリポジトリ
use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;
use tracing::warn;

use crate::domain::PublicUserMetadata;
use crate::infrastructure::batch_get::{batch_get_items, BatchGetError, Item, BATCH_GET_LIMIT};

const ACCOUNT_ID_KEY: &str = "accountId";

/// ユーザーメタデータリポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserMetadataRepositoryError {
    #[error("Write error: {0}")]
    WriteError(String),

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<BatchGetError> for UserMetadataRepositoryError {
    fn from(error: BatchGetError) -> Self {
        Self::ReadError(error.to_string())
    }
}

/// ユーザーメタデータ永続化用トレイト
#[async_trait]
pub trait UserMetadataRepository: Send + Sync {
    /// アカウントのメタデータを取得（強い整合性）
    async fn get(
        &self,
        account_id: &str,
    ) -> Result<Option<PublicUserMetadata>, UserMetadataRepositoryError>;

    /// メタデータを保存（既存は上書き）
    async fn put(&self, metadata: &PublicUserMetadata) -> Result<(), UserMetadataRepositoryError>;

    /// 複数アカウントのメタデータを一括取得
    ///
    /// `account_ids`は`BATCH_GET_LIMIT`件以下であること。
    /// メタデータのないアカウントは結果に含まれない。
    async fn batch_get(
        &self,
        account_ids: &[String],
    ) -> Result<Vec<PublicUserMetadata>, UserMetadataRepositoryError>;
}

/// DynamoDBベースのユーザーメタデータリポジトリ実装
#[derive(Debug, Clone)]
pub struct DynamoUserMetadataRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoUserMetadataRepository {
    /// 新しいDynamoUserMetadataRepositoryを作成
    ///
    /// # 引数
    /// * `client` - DynamoDBクライアント
    /// * `table_name` - ユーザーメタデータテーブル名
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn key_attributes(account_id: &str) -> Item {
        HashMap::from([(
            ACCOUNT_ID_KEY.to_string(),
            AttributeValue::S(account_id.to_string()),
        )])
    }

    fn item_to_metadata(item: Item) -> Result<PublicUserMetadata, UserMetadataRepositoryError> {
        serde_dynamo::from_item(item)
            .map_err(|e| UserMetadataRepositoryError::SerializationError(e.to_string()))
    }
}

#[async_trait]
impl UserMetadataRepository for DynamoUserMetadataRepository {
    async fn get(
        &self,
        account_id: &str,
    ) -> Result<Option<PublicUserMetadata>, UserMetadataRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(account_id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| UserMetadataRepositoryError::ReadError(e.into_service_error().to_string()))?;

        result.item.map(Self::item_to_metadata).transpose()
    }

    async fn put(&self, metadata: &PublicUserMetadata) -> Result<(), UserMetadataRepositoryError> {
        let item: Item = serde_dynamo::to_item(metadata)
            .map_err(|e| UserMetadataRepositoryError::SerializationError(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                UserMetadataRepositoryError::WriteError(e.into_service_error().to_string())
            })?;

        Ok(())
    }

    async fn batch_get(
        &self,
        account_ids: &[String],
    ) -> Result<Vec<PublicUserMetadata>, UserMetadataRepositoryError> {
        if account_ids.len() > BATCH_GET_LIMIT {
            return Err(UserMetadataRepositoryError::ReadError(format!(
                "Too many keys for one batch: {}",
                account_ids.len()
            )));
        }

        let keys = account_ids
            .iter()
            .map(|id| Self::key_attributes(id))
            .collect();

        let items = batch_get_items(&self.client, &self.table_name, keys, false).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| match Self::item_to_metadata(item) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!(error = %e, "変換できないユーザーメタデータをスキップ");
                    None
                }
            })
            .collect())
    }
}
