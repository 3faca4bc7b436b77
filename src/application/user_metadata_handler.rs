// 公開ユーザーメタデータAPIのハンドラー

use lambda_http::{Body, Request, Response};

use crate::application::{
    ApiError, ApiResponse, RequestParser, UserMetadataService, ACCOUNT_ID_PARAM,
    DEFAULT_USERNAME_PARAM,
};
use crate::domain::{PublicUserMetadataOutput, UserMetadataSubmission};
use crate::infrastructure::{CorsConfig, UserMetadataRepository};

/// アカウントの公開ユーザー名を取得する
pub async fn get_public_user_metadata<UR>(
    service: &UserMetadataService<UR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    UR: UserMetadataRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = get_inner(service, request).await;
    ApiResponse::from_result(result, headers)
}

async fn get_inner<UR>(
    service: &UserMetadataService<UR>,
    request: &Request,
) -> Result<PublicUserMetadataOutput, ApiError>
where
    UR: UserMetadataRepository,
{
    let account_id = RequestParser::required_query_param(request, ACCOUNT_ID_PARAM)?;
    Ok(service.get_public_user_metadata(account_id).await?)
}

/// ユーザー名が未設定ならデフォルト名を保存する
pub async fn put_public_user_metadata<UR>(
    service: &UserMetadataService<UR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    UR: UserMetadataRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = put_inner(service, request).await;
    ApiResponse::from_result(result, headers)
}

async fn put_inner<UR>(
    service: &UserMetadataService<UR>,
    request: &Request,
) -> Result<PublicUserMetadataOutput, ApiError>
where
    UR: UserMetadataRepository,
{
    let account_id = RequestParser::required_query_param(request, ACCOUNT_ID_PARAM)?;
    let default_username = RequestParser::required_query_param(request, DEFAULT_USERNAME_PARAM)?;

    Ok(service
        .put_public_user_metadata(account_id, default_username)
        .await?)
}

/// ユーザー名を保存する（既存は上書き）
pub async fn upsert_public_user_metadata<UR>(
    service: &UserMetadataService<UR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    UR: UserMetadataRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = upsert_inner(service, request).await;
    ApiResponse::from_result(result, headers)
}

async fn upsert_inner<UR>(
    service: &UserMetadataService<UR>,
    request: &Request,
) -> Result<PublicUserMetadataOutput, ApiError>
where
    UR: UserMetadataRepository,
{
    let submission: UserMetadataSubmission = RequestParser::json_body(request)?;
    Ok(service.upsert_public_user_metadata(submission).await?)
}
