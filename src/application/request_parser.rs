// API Gatewayリクエストの解析
//
// クエリパラメータ・JSONボディ・ベアラートークンを取り出す。
// 取り出した値の業務上の検証はドメイン層で行う。

use lambda_http::http::header::{AUTHORIZATION, ORIGIN};
use lambda_http::{Request, RequestExt};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const RESTAURANT_ID_PARAM: &str = "restaurantId";
pub const ACCOUNT_ID_PARAM: &str = "accountId";
pub const COUNT_PARAM: &str = "count";
pub const IDS_PARAM: &str = "ids";
pub const INCLUDE_RATING_PARAM: &str = "rating";
pub const DEFAULT_USERNAME_PARAM: &str = "defaultUsername";

/// リクエスト形状のエラー型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestParseError {
    #[error("Request body is required")]
    MissingBody,

    #[error("Query parameters are required")]
    MissingQueryParameters,

    #[error("Required query parameter '{0}' is missing")]
    MissingQueryParameter(&'static str),

    #[error("At least one of these query parameters is required: {0}")]
    MissingAnyQueryParameter(String),

    #[error("Invalid value for query parameter '{name}': {reason}")]
    InvalidQueryParameter { name: &'static str, reason: String },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

pub struct RequestParser;

impl RequestParser {
    /// クエリパラメータを取得（空文字列は未指定として扱う）
    pub fn query_param<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request
            .query_string_parameters_ref()
            .and_then(|params| params.first(name))
            .filter(|value| !value.trim().is_empty())
    }

    /// 必須のクエリパラメータを取得
    pub fn required_query_param<'a>(
        request: &'a Request,
        name: &'static str,
    ) -> Result<&'a str, RequestParseError> {
        if request
            .query_string_parameters_ref()
            .is_none_or(|params| params.iter().next().is_none())
        {
            return Err(RequestParseError::MissingQueryParameters);
        }

        Self::query_param(request, name).ok_or(RequestParseError::MissingQueryParameter(name))
    }

    /// いずれかが指定されていればよいクエリパラメータを取得
    ///
    /// 戻り値は`names`と同じ順序で、最低1つは`Some`。
    pub fn any_query_params<'a>(
        request: &'a Request,
        names: &[&'static str],
    ) -> Result<Vec<Option<&'a str>>, RequestParseError> {
        let values: Vec<Option<&str>> = names
            .iter()
            .map(|name| Self::query_param(request, name))
            .collect();

        if values.iter().all(Option::is_none) {
            let joined = names
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(RequestParseError::MissingAnyQueryParameter(joined));
        }

        Ok(values)
    }

    /// JSONボディを解析
    pub fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, RequestParseError> {
        let body: &[u8] = request.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RequestParseError::MissingBody);
        }

        serde_json::from_slice(body).map_err(|e| RequestParseError::MalformedBody(e.to_string()))
    }

    /// ボディが存在することだけを確認
    pub fn require_body(request: &Request) -> Result<(), RequestParseError> {
        let body: &[u8] = request.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RequestParseError::MissingBody);
        }
        Ok(())
    }

    /// 件数パラメータ（正の整数）を解析
    pub fn parse_count(value: &str) -> Result<u32, RequestParseError> {
        match value.trim().parse::<u32>() {
            Ok(count) if count > 0 => Ok(count),
            _ => Err(RequestParseError::InvalidQueryParameter {
                name: COUNT_PARAM,
                reason: format!("'{value}' is not a positive integer"),
            }),
        }
    }

    /// カンマ区切りのID一覧を解析（空要素は無視）
    pub fn parse_ids(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 真偽値パラメータを解析（"true"以外はfalse）
    pub fn parse_flag(value: Option<&str>) -> bool {
        value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Authorizationヘッダーからトークンを取り出す
    ///
    /// `Bearer <token>`または`<token>`形式をサポート
    pub fn bearer_token(request: &Request) -> Option<&str> {
        let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
        let token = header
            .strip_prefix("Bearer ")
            .unwrap_or(header)
            .trim();
        (!token.is_empty()).then_some(token)
    }

    /// Originヘッダーを取得
    pub fn origin(request: &Request) -> Option<&str> {
        request.headers().get(ORIGIN)?.to_str().ok()
    }
}
