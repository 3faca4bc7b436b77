//! APIレスポンスの構築
//!
//! - 成功・失敗いずれの応答にもCORSヘッダーを付与する
//! - エラーはJSON形式で`error`（種別）と`message`（詳細）を返す
//! - 各層のエラーはここでHTTPステータスに対応付ける

use lambda_http::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Request, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::application::{
    RequestParseError, RequestParser, ReviewReaderError, ReviewWriterError,
    UserMetadataServiceError,
};
use crate::domain::ValidationErrors;
use crate::infrastructure::cors_config::{ALLOWED_HEADERS, ALLOWED_METHODS};
use crate::infrastructure::{AuthorizationError, CorsConfig};

/// APIエラーレスポンスのボディ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    /// エラー種別（例: "bad_request", "unauthorized", "not_found", "internal_error"）
    pub error: String,
    /// 詳細なエラーメッセージ
    pub message: String,
}

/// APIエラー
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: error.into(),
                message: message.into(),
            },
        }
    }

    /// 400 Bad Requestエラーを作成
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// 401 Unauthorizedエラーを作成
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// 404 Not Foundエラーを作成
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 500 Internal Server Errorを作成
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn error(&self) -> &str {
        &self.body.error
    }

    pub fn message(&self) -> &str {
        &self.body.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// ヘッダーを付けてHTTPレスポンスに変換
    pub fn into_response(self, headers: HeaderMap) -> Response<Body> {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), message = self.message(), "リクエスト処理に失敗");
        } else {
            warn!(status = self.status.as_u16(), message = self.message(), "リクエストを拒否");
        }
        ApiResponse::json(self.status, &self.body, headers)
    }
}

impl From<RequestParseError> for ApiError {
    fn from(error: RequestParseError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::bad_request(errors.to_string())
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(error: AuthorizationError) -> Self {
        Self::unauthorized(error.to_string())
    }
}

impl From<ReviewWriterError> for ApiError {
    fn from(error: ReviewWriterError) -> Self {
        Self::internal_error(error.to_string())
    }
}

impl From<ReviewReaderError> for ApiError {
    fn from(error: ReviewReaderError) -> Self {
        Self::internal_error(error.to_string())
    }
}

impl From<UserMetadataServiceError> for ApiError {
    fn from(error: UserMetadataServiceError) -> Self {
        match error {
            UserMetadataServiceError::Validation(errors) => errors.into(),
            UserMetadataServiceError::RepositoryError(_) => Self::internal_error(error.to_string()),
        }
    }
}

/// 成功レスポンスとヘッダーの構築
pub struct ApiResponse;

impl ApiResponse {
    /// CORSヘッダーを生成
    ///
    /// - Access-Control-Allow-Methods / Access-Control-Allow-Headers: 常に付与
    /// - Access-Control-Allow-Origin: リクエストのOriginが許可されている場合のみ付与
    pub fn cors_headers(cors: &CorsConfig, request: &Request) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );

        if let Some(origin) = RequestParser::origin(request)
            .and_then(|origin| cors.matching_origin(origin))
            .and_then(|origin| HeaderValue::from_str(origin).ok())
        {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }

        headers
    }

    /// JSONボディのレスポンスを生成
    pub fn json<T: Serialize>(status: StatusCode, body: &T, mut headers: HeaderMap) -> Response<Body> {
        let json = match serde_json::to_string(body) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "レスポンスのシリアライズに失敗");
                return Self::with_headers(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Body::Empty,
                    headers,
                );
            }
        };

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::with_headers(status, Body::Text(json), headers)
    }

    /// 200 OK（JSONボディ）
    pub fn ok<T: Serialize>(body: &T, headers: HeaderMap) -> Response<Body> {
        Self::json(StatusCode::OK, body, headers)
    }

    /// 204 No Content
    pub fn no_content(headers: HeaderMap) -> Response<Body> {
        Self::with_headers(StatusCode::NO_CONTENT, Body::Empty, headers)
    }

    /// ハンドラーの結果をレスポンスに変換
    pub fn from_result<T: Serialize>(result: Result<T, ApiError>, headers: HeaderMap) -> Response<Body> {
        match result {
            Ok(body) => Self::ok(&body, headers),
            Err(error) => error.into_response(headers),
        }
    }

    fn with_headers(status: StatusCode, body: Body, headers: HeaderMap) -> Response<Body> {
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}
