/// DynamoDB接続設定
use aws_config::SdkConfig;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;

/// rankingsテーブル名の環境変数
pub const RANKINGS_TABLE_ENV: &str = "RANKINGS_TABLE_NAME";

/// ユーザーメタデータテーブル名の環境変数
pub const USER_METADATA_TABLE_ENV: &str = "PUBLIC_USER_METADATA_TABLE_NAME";

/// DynamoDB設定のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DynamoDbConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// テーブル名とクライアントを持つDynamoDB設定
///
/// テーブル名は以下の環境変数で設定:
/// - RANKINGS_TABLE_NAME: レビュー行と集計行を保存するテーブル
/// - PUBLIC_USER_METADATA_TABLE_NAME: 公開ユーザー名を保存するテーブル
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    /// DynamoDBクライアントインスタンス
    client: DynamoDbClient,
    /// rankingsテーブル名
    rankings_table: String,
    /// ユーザーメタデータテーブル名
    user_metadata_table: String,
}

impl DynamoDbConfig {
    /// 環境からAWS設定を読み込み、環境変数からテーブル名を読み取って新しいDynamoDbConfigを作成
    pub async fn from_env() -> Result<Self, DynamoDbConfigError> {
        // 環境からAWS設定を読み込み（認証情報、リージョンなど）
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::from_sdk_config(&aws_config)
    }

    /// 読み込み済みのAWS設定からDynamoDbConfigを作成
    ///
    /// 同じ`SdkConfig`をSSMクライアントと共有する場合に使う。
    pub fn from_sdk_config(aws_config: &SdkConfig) -> Result<Self, DynamoDbConfigError> {
        let client = DynamoDbClient::new(aws_config);
        let (rankings_table, user_metadata_table) = Self::table_names_from_env()?;

        Ok(Self {
            client,
            rankings_table,
            user_metadata_table,
        })
    }

    /// 明示的な値で新しいDynamoDbConfigを作成（テスト用）
    pub fn new(client: DynamoDbClient, rankings_table: String, user_metadata_table: String) -> Self {
        Self {
            client,
            rankings_table,
            user_metadata_table,
        }
    }

    fn table_names_from_env() -> Result<(String, String), DynamoDbConfigError> {
        let rankings_table = std::env::var(RANKINGS_TABLE_ENV)
            .map_err(|_| DynamoDbConfigError::MissingEnvVar(RANKINGS_TABLE_ENV.to_string()))?;

        let user_metadata_table = std::env::var(USER_METADATA_TABLE_ENV)
            .map_err(|_| DynamoDbConfigError::MissingEnvVar(USER_METADATA_TABLE_ENV.to_string()))?;

        Ok((rankings_table, user_metadata_table))
    }

    /// DynamoDBクライアントへの参照を取得
    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    /// rankingsテーブル名を取得
    pub fn rankings_table(&self) -> &str {
        &self.rankings_table
    }

    /// ユーザーメタデータテーブル名を取得
    pub fn user_metadata_table(&self) -> &str {
        &self.user_metadata_table
    }
}

/// テスト用のDynamoDBクライアント（ネットワークには接続しない）
#[cfg(test)]
pub(crate) fn test_dynamodb_client() -> DynamoDbClient {
    use aws_sdk_dynamodb::config::{BehaviorVersion, Region};

    let config = aws_sdk_dynamodb::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("ap-northeast-1"))
        .build();
    DynamoDbClient::from_conf(config)
}
