//! IDトークンによる認可
//!
//! - OAuthクライアントIDと認可無効化フラグはSSM Parameter Storeから起動時に読み込む
//! - IDトークンはトークン情報エンドポイントで検証し、issがGoogle、audがクライアントIDであることを確認する
//! - 検証に成功したトークンのsubをアカウントIDとして返す

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// クライアントIDを保持するSSMパラメータ名の環境変数
pub const GOOGLE_CLIENT_ID_PARAMETER_ENV: &str = "GOOGLE_CLIENT_ID_PARAMETER_NAME";

/// 認可無効化フラグを保持するSSMパラメータ名の環境変数（任意）
pub const DISABLE_AUTH_PARAMETER_ENV: &str = "DISABLE_AUTH_PARAMETER_NAME";

/// トークン情報エンドポイントの上書き用環境変数（任意）
pub const TOKEN_INFO_ENDPOINT_ENV: &str = "TOKEN_INFO_ENDPOINT";

/// Googleのトークン情報エンドポイント
pub const DEFAULT_TOKEN_INFO_ENDPOINT: &str = "https://oauth2.googleapis.com/tokeninfo";

/// IDトークンの発行者として受け付ける値
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// トークン検証リクエストのタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// 認可設定のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("SSM parameter error: {0}")]
    ParameterError(String),
}

/// 認可エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthorizationError {
    #[error("Authorization header is missing or invalid")]
    MissingToken,

    #[error("Invalid ID token")]
    InvalidToken,

    #[error("Token verification failed: {0}")]
    VerificationFailed(String),
}

/// 認可の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// トークンを検証済み（subject = アカウントID）
    Verified { account_id: String },
    /// 設定により認可が無効
    Disabled,
}

/// 認可設定
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    client_id: String,
    disabled: bool,
    token_info_endpoint: String,
}

impl AuthConfig {
    pub fn new(client_id: impl Into<String>, token_info_endpoint: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            disabled: false,
            token_info_endpoint: token_info_endpoint.into(),
        }
    }

    /// 認可を無効化した設定
    pub fn disabled() -> Self {
        Self {
            client_id: String::new(),
            disabled: true,
            token_info_endpoint: DEFAULT_TOKEN_INFO_ENDPOINT.to_string(),
        }
    }

    /// 環境変数とSSM Parameter Storeから設定を読み込む
    pub async fn from_env_with_ssm(ssm_client: &SsmClient) -> Result<Self, AuthConfigError> {
        let client_id_parameter = std::env::var(GOOGLE_CLIENT_ID_PARAMETER_ENV).map_err(|_| {
            AuthConfigError::MissingEnvVar(GOOGLE_CLIENT_ID_PARAMETER_ENV.to_string())
        })?;
        let client_id = fetch_parameter(ssm_client, &client_id_parameter).await?;

        let disabled = match std::env::var(DISABLE_AUTH_PARAMETER_ENV) {
            Ok(parameter) => is_disabled_flag(&fetch_parameter(ssm_client, &parameter).await?),
            Err(_) => false,
        };

        let token_info_endpoint = std::env::var(TOKEN_INFO_ENDPOINT_ENV)
            .unwrap_or_else(|_| DEFAULT_TOKEN_INFO_ENDPOINT.to_string());

        info!(disabled = disabled, "認可設定を読み込み");

        Ok(Self {
            client_id,
            disabled,
            token_info_endpoint,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn token_info_endpoint(&self) -> &str {
        &self.token_info_endpoint
    }
}

/// SSMパラメータを復号して取得
async fn fetch_parameter(ssm_client: &SsmClient, name: &str) -> Result<String, AuthConfigError> {
    let output = ssm_client
        .get_parameter()
        .name(name)
        .with_decryption(true)
        .send()
        .await
        .map_err(|e| AuthConfigError::ParameterError(e.into_service_error().to_string()))?;

    output
        .parameter
        .and_then(|parameter| parameter.value)
        .ok_or_else(|| AuthConfigError::ParameterError(format!("Parameter has no value: {name}")))
}

fn is_disabled_flag(value: &str) -> bool {
    value.trim() == "true"
}

/// IDトークン認可用トレイト
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// ベアラートークンを検証する
    ///
    /// # 引数
    /// * `token` - Authorizationヘッダーから取り出したトークン（なければNone）
    async fn authorize(&self, token: Option<&str>) -> Result<Authorization, AuthorizationError>;
}

/// トークン情報エンドポイントの応答（必要なクレームのみ）
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenInfoClaims {
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub sub: Option<String>,
}

impl TokenInfoClaims {
    /// issがGoogleでaudがクライアントIDと一致すればsubを返す
    pub fn verify(self, client_id: &str) -> Result<String, AuthorizationError> {
        if !self.iss.as_deref().is_some_and(|iss| GOOGLE_ISSUERS.contains(&iss)) {
            return Err(AuthorizationError::InvalidToken);
        }
        if self.aud.as_deref() != Some(client_id) {
            return Err(AuthorizationError::InvalidToken);
        }

        self.sub
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthorizationError::InvalidToken)
    }
}

/// トークン情報エンドポイントでIDトークンを検証する認可実装
pub struct TokenInfoAuthorizer {
    config: AuthConfig,
    client: reqwest::Client,
}

impl TokenInfoAuthorizer {
    pub fn new(config: AuthConfig) -> Result<Self, AuthorizationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthorizationError::VerificationFailed(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Authorizer for TokenInfoAuthorizer {
    async fn authorize(&self, token: Option<&str>) -> Result<Authorization, AuthorizationError> {
        if self.config.is_disabled() {
            info!("認可が無効のためトークン検証をスキップ");
            return Ok(Authorization::Disabled);
        }

        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthorizationError::MissingToken)?;

        let response = self
            .client
            .get(self.config.token_info_endpoint())
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "トークン情報エンドポイントへの接続に失敗");
                AuthorizationError::VerificationFailed(e.to_string())
            })?;

        // 無効・期限切れのトークンには4xxが返る
        if response.status().is_client_error() {
            return Err(AuthorizationError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(AuthorizationError::VerificationFailed(format!(
                "Unexpected status: {}",
                response.status()
            )));
        }

        let claims: TokenInfoClaims = response
            .json()
            .await
            .map_err(|e| AuthorizationError::VerificationFailed(e.to_string()))?;

        let account_id = claims.verify(self.config.client_id())?;
        Ok(Authorization::Verified { account_id })
    }
}
