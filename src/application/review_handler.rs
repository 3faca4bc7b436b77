// レビューAPIのハンドラー
//
// 各Lambdaバイナリはここの関数を1つ呼び出す。
// 成功・失敗いずれの応答にもCORSヘッダーを付与する。

use lambda_http::{Body, Request, Response};
use tracing::info;

use crate::application::{
    ApiError, ApiResponse, DeleteOutcome, GetAggregateReviewInformationOutput,
    GetAllReviewsOutput, RequestParser, ReviewQuery, ReviewReader, ReviewWriter,
    ACCOUNT_ID_PARAM, COUNT_PARAM, IDS_PARAM, INCLUDE_RATING_PARAM, RESTAURANT_ID_PARAM,
};
use crate::domain::{DeleteReviewRequest, Review, ReviewSubmission};
use crate::infrastructure::{
    Authorization, Authorizer, CorsConfig, RankingRepository, UserMetadataRepository,
};

/// レビューを投稿する
///
/// 認可済みの場合、ボディのaccountIdはトークンのsubjectで上書きする。
pub async fn add_review<RR, A>(
    writer: &ReviewWriter<RR>,
    authorizer: &A,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    RR: RankingRepository,
    A: Authorizer,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = add_review_inner(writer, authorizer, request).await;
    ApiResponse::from_result(result, headers)
}

async fn add_review_inner<RR, A>(
    writer: &ReviewWriter<RR>,
    authorizer: &A,
    request: &Request,
) -> Result<Review, ApiError>
where
    RR: RankingRepository,
    A: Authorizer,
{
    RequestParser::require_body(request)?;

    let authorization = authorizer
        .authorize(RequestParser::bearer_token(request))
        .await?;

    let mut submission: ReviewSubmission = RequestParser::json_body(request)?;
    if let Authorization::Verified { account_id } = authorization {
        submission.account_id = Some(account_id);
    }

    let review = submission.validate()?;
    Ok(writer.add_new_review(review).await?)
}

/// レビューを削除する（成功時は204、対象がなければ404）
pub async fn delete_review<RR>(
    writer: &ReviewWriter<RR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    RR: RankingRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);

    match delete_review_inner(writer, request).await {
        Ok(()) => ApiResponse::no_content(headers),
        Err(error) => error.into_response(headers),
    }
}

async fn delete_review_inner<RR>(writer: &ReviewWriter<RR>, request: &Request) -> Result<(), ApiError>
where
    RR: RankingRepository,
{
    let body: DeleteReviewRequest = RequestParser::json_body(request)?;
    let key = body.validate()?;

    match writer.delete_review(&key).await? {
        DeleteOutcome::Deleted => Ok(()),
        DeleteOutcome::NotFound => Err(ApiError::not_found(format!(
            "Review not found: {}",
            key.review_id()
        ))),
    }
}

/// レストランまたはアカウントのレビューを全件取得する
///
/// 両方指定された場合はrestaurantIdを優先する。
pub async fn get_all_reviews<RR, UR>(
    reader: &ReviewReader<RR, UR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = get_all_reviews_inner(reader, request).await;
    ApiResponse::from_result(result, headers)
}

async fn get_all_reviews_inner<RR, UR>(
    reader: &ReviewReader<RR, UR>,
    request: &Request,
) -> Result<GetAllReviewsOutput, ApiError>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    let values =
        RequestParser::any_query_params(request, &[RESTAURANT_ID_PARAM, ACCOUNT_ID_PARAM])?;

    let query = match (values[0], values[1]) {
        (Some(restaurant_id), _) => ReviewQuery::ByRestaurant(restaurant_id.to_string()),
        (None, Some(account_id)) => ReviewQuery::ByAccount(account_id.to_string()),
        (None, None) => {
            return Err(ApiError::bad_request(
                "At least one of these query parameters is required: 'restaurantId' or 'accountId'",
            ));
        }
    };

    let output = reader.get_all_reviews(&query).await?;
    info!(?query, count = output.reviews.len(), "レビュー一覧を取得");
    Ok(output)
}

/// 最新のレビューを指定件数取得する
pub async fn get_recent_reviews<RR, UR>(
    reader: &ReviewReader<RR, UR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = get_recent_reviews_inner(reader, request).await;
    ApiResponse::from_result(result, headers)
}

async fn get_recent_reviews_inner<RR, UR>(
    reader: &ReviewReader<RR, UR>,
    request: &Request,
) -> Result<GetAllReviewsOutput, ApiError>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    let count = RequestParser::parse_count(RequestParser::required_query_param(request, COUNT_PARAM)?)?;
    Ok(reader.get_recent_reviews(count).await?)
}

/// 複数レストランの平均評価を取得する
pub async fn get_aggregate_review_information<RR, UR>(
    reader: &ReviewReader<RR, UR>,
    cors: &CorsConfig,
    request: &Request,
) -> Response<Body>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    let headers = ApiResponse::cors_headers(cors, request);
    let result = get_aggregate_review_information_inner(reader, request).await;
    ApiResponse::from_result(result, headers)
}

async fn get_aggregate_review_information_inner<RR, UR>(
    reader: &ReviewReader<RR, UR>,
    request: &Request,
) -> Result<GetAggregateReviewInformationOutput, ApiError>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    let ids = RequestParser::parse_ids(RequestParser::required_query_param(request, IDS_PARAM)?);
    let include_rating =
        RequestParser::parse_flag(RequestParser::query_param(request, INCLUDE_RATING_PARAM));

    Ok(reader
        .get_aggregate_review_information(&ids, include_rating)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::api_response::tests::body_json;
    use crate::application::request_parser::tests::{request_with_body, request_with_query};
    use crate::application::RetryPolicy;
    use crate::domain::{AggregateRanking, RankingKey};
    use crate::infrastructure::authorizer::tests::MockAuthorizer;
    use crate::infrastructure::ranking_repository::tests::{review, MockRankingRepository};
    use crate::infrastructure::user_metadata_repository::tests::MockUserMetadataRepository;
    use crate::infrastructure::{AuthorizationError, RankingRepositoryError};
    use lambda_http::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
    use lambda_http::http::StatusCode;
    use std::time::Duration;

    const ORIGIN: &str = "https://fryrank.app";

    fn cors() -> CorsConfig {
        CorsConfig::parse(ORIGIN)
    }

    fn writer(repo: &MockRankingRepository) -> ReviewWriter<MockRankingRepository> {
        ReviewWriter::new(repo.clone()).with_retry_policy(RetryPolicy::new(3, Duration::ZERO))
    }

    fn reader(
        rankings: &MockRankingRepository,
        metadata: &MockUserMetadataRepository,
    ) -> ReviewReader<MockRankingRepository, MockUserMetadataRepository> {
        ReviewReader::new(rankings.clone(), metadata.clone())
    }

    fn review_request(body: &str, token: Option<&str>) -> Request {
        let mut builder = lambda_http::http::Request::builder()
            .method("POST")
            .header("Origin", ORIGIN);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    const REVIEW_BODY: &str = r#"{
        "restaurantId": "r1",
        "accountId": "body-account",
        "score": 4.5,
        "title": "Crispy",
        "body": "Great fries",
        "isoDateTime": "2026-01-01T00:00:00Z"
    }"#;

    // ==================== add_review ====================

    #[tokio::test]
    async fn test_add_review_uses_verified_account() {
        let repo = MockRankingRepository::new();
        let authorizer = MockAuthorizer::verified("token-subject");

        let response = add_review(
            &writer(&repo),
            &authorizer,
            &cors(),
            &review_request(REVIEW_BODY, Some("id-token")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            ORIGIN
        );
        let json = body_json(&response);
        assert_eq!(json["accountId"], "token-subject");
        assert_eq!(json["reviewId"], "r1:REVIEW:token-subject");
        assert!(json["username"].is_null());

        assert_eq!(authorizer.received_tokens(), vec![Some("id-token".to_string())]);
        assert!(repo.review(&RankingKey::review("r1", "token-subject")).is_some());
        assert_eq!(
            repo.aggregate("r1"),
            Some(AggregateRanking::new("r1", 4.5, 1))
        );
    }

    #[tokio::test]
    async fn test_add_review_with_disabled_auth_uses_body_account() {
        let repo = MockRankingRepository::new();

        let response = add_review(
            &writer(&repo),
            &MockAuthorizer::disabled(),
            &cors(),
            &review_request(REVIEW_BODY, None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&response)["accountId"], "body-account");
    }

    #[tokio::test]
    async fn test_add_review_rejected_token() {
        let repo = MockRankingRepository::new();

        let response = add_review(
            &writer(&repo),
            &MockAuthorizer::rejecting(AuthorizationError::InvalidToken),
            &cors(),
            &review_request(REVIEW_BODY, Some("bad")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(&response)["error"], "unauthorized");
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_some());
        assert_eq!(repo.row_count(), 0);
    }

    #[tokio::test]
    async fn test_add_review_missing_body_skips_authorization() {
        let repo = MockRankingRepository::new();
        let authorizer = MockAuthorizer::verified("a1");

        let response = add_review(
            &writer(&repo),
            &authorizer,
            &cors(),
            &review_request("", Some("id-token")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["message"], "Request body is required");
        assert!(authorizer.received_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_add_review_validation_lists_every_field() {
        let repo = MockRankingRepository::new();

        let response = add_review(
            &writer(&repo),
            &MockAuthorizer::verified("a1"),
            &cors(),
            &review_request(r#"{"restaurantId": "r1"}"#, Some("id-token")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message = body_json(&response)["message"].as_str().unwrap().to_string();
        for field in ["score", "title", "body"] {
            assert!(message.contains(field), "{field} missing from {message}");
        }
        assert_eq!(repo.row_count(), 0);
    }

    #[tokio::test]
    async fn test_add_review_conflict_exhaustion_is_internal_error() {
        let repo = MockRankingRepository::new();
        repo.force_conflicts(3);

        let response = add_review(
            &writer(&repo),
            &MockAuthorizer::verified("a1"),
            &cors(),
            &review_request(REVIEW_BODY, Some("id-token")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response)["error"], "internal_error");
    }

    // ==================== delete_review ====================

    #[tokio::test]
    async fn test_delete_review() {
        let repo = MockRankingRepository::new();
        let writer = writer(&repo);
        writer
            .add_new_review(review("r1", "a1", 4.0, "2026-01-01T00:00:00Z"))
            .await
            .unwrap();

        let response = delete_review(
            &writer,
            &cors(),
            &request_with_body(r#"{"reviewId": "r1:REVIEW:a1"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(repo.row_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_review_is_not_found() {
        let repo = MockRankingRepository::new();

        let response = delete_review(
            &writer(&repo),
            &cors(),
            &request_with_body(r#"{"reviewId": "r1:a1"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&response)["error"], "not_found");
    }

    #[tokio::test]
    async fn test_delete_malformed_review_id() {
        let repo = MockRankingRepository::new();

        let response = delete_review(
            &writer(&repo),
            &cors(),
            &request_with_body(r#"{"reviewId": "no-delimiter"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ==================== get_all_reviews ====================

    #[tokio::test]
    async fn test_get_all_reviews_by_restaurant_takes_precedence() {
        let rankings = MockRankingRepository::new();
        let metadata = MockUserMetadataRepository::new();
        rankings.seed_review(review("r1", "a1", 4.0, "2026-01-01T00:00:00Z"));
        rankings.seed_review(review("r2", "a1", 3.0, "2026-01-02T00:00:00Z"));
        metadata.insert("a1", Some("fryfan"));

        let response = get_all_reviews(
            &reader(&rankings, &metadata),
            &cors(),
            &request_with_query(&[("restaurantId", "r1"), ("accountId", "a1")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(&response);
        let reviews = json["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0]["restaurantId"], "r1");
        assert_eq!(reviews[0]["username"], "fryfan");
    }

    #[tokio::test]
    async fn test_get_all_reviews_by_account() {
        let rankings = MockRankingRepository::new();
        let metadata = MockUserMetadataRepository::new();
        rankings.seed_review(review("r1", "a1", 4.0, "2026-01-01T00:00:00Z"));
        rankings.seed_review(review("r2", "a1", 3.0, "2026-01-02T00:00:00Z"));
        rankings.seed_review(review("r2", "a2", 2.0, "2026-01-03T00:00:00Z"));

        let response = get_all_reviews(
            &reader(&rankings, &metadata),
            &cors(),
            &request_with_query(&[("accountId", "a1")]),
        )
        .await;

        let json = body_json(&response);
        let reviews = json["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0]["restaurantId"], "r2");
    }

    #[tokio::test]
    async fn test_get_all_reviews_without_params() {
        let response = get_all_reviews(
            &reader(
                &MockRankingRepository::new(),
                &MockUserMetadataRepository::new(),
            ),
            &cors(),
            &request_with_query(&[("count", "1")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&response)["message"],
            "At least one of these query parameters is required: 'restaurantId' or 'accountId'"
        );
    }

    #[tokio::test]
    async fn test_get_all_reviews_repository_error() {
        let rankings = MockRankingRepository::new();
        rankings.set_next_error(RankingRepositoryError::ReadError("timeout".to_string()));

        let response = get_all_reviews(
            &reader(&rankings, &MockUserMetadataRepository::new()),
            &cors(),
            &request_with_query(&[("restaurantId", "r1")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(&response)["message"]
            .as_str()
            .unwrap()
            .contains("timeout"));
    }

    // ==================== get_recent_reviews ====================

    #[tokio::test]
    async fn test_get_recent_reviews() {
        let rankings = MockRankingRepository::new();
        rankings.seed_review(review("r1", "a1", 4.0, "2026-01-01T00:00:00Z"));
        rankings.seed_review(review("r2", "a2", 3.0, "2026-01-02T00:00:00Z"));
        rankings.seed_review(review("r3", "a3", 5.0, "2026-01-03T00:00:00Z"));

        let response = get_recent_reviews(
            &reader(&rankings, &MockUserMetadataRepository::new()),
            &cors(),
            &request_with_query(&[("count", "2")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(&response);
        let reviews = json["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0]["restaurantId"], "r3");
        assert_eq!(reviews[1]["restaurantId"], "r2");
    }

    #[tokio::test]
    async fn test_get_recent_reviews_invalid_count() {
        let reader = reader(
            &MockRankingRepository::new(),
            &MockUserMetadataRepository::new(),
        );

        for request in [
            request_with_query(&[("count", "zero")]),
            request_with_query(&[("ids", "r1")]),
            Request::default(),
        ] {
            let response = get_recent_reviews(&reader, &cors(), &request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    // ==================== get_aggregate_review_information ====================

    #[tokio::test]
    async fn test_get_aggregate_review_information_with_rating() {
        let rankings = MockRankingRepository::new();
        let writer = writer(&rankings);
        for (account, score) in [("a1", 4.0), ("a2", 3.0), ("a3", 3.0)] {
            writer
                .add_new_review(review("r1", account, score, "2026-01-01T00:00:00Z"))
                .await
                .unwrap();
        }

        let response = get_aggregate_review_information(
            &reader(&rankings, &MockUserMetadataRepository::new()),
            &cors(),
            &request_with_query(&[("ids", "r1,r2"), ("rating", "true")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(&response);
        let information = &json["restaurantIdToRestaurantInformation"];
        assert_eq!(information["r1"]["restaurantId"], "r1");
        assert_eq!(information["r1"]["averageScore"], 3.3);
        assert!(information.get("r2").is_none());
    }

    #[tokio::test]
    async fn test_get_aggregate_review_information_without_rating() {
        let rankings = MockRankingRepository::new();
        writer(&rankings)
            .add_new_review(review("r1", "a1", 4.0, "2026-01-01T00:00:00Z"))
            .await
            .unwrap();

        let response = get_aggregate_review_information(
            &reader(&rankings, &MockUserMetadataRepository::new()),
            &cors(),
            &request_with_query(&[("ids", "r1")]),
        )
        .await;

        let json = body_json(&response);
        assert!(json["restaurantIdToRestaurantInformation"]["r1"]["averageScore"].is_null());
    }

    #[tokio::test]
    async fn test_get_aggregate_review_information_requires_ids() {
        let response = get_aggregate_review_information(
            &reader(
                &MockRankingRepository::new(),
                &MockUserMetadataRepository::new(),
            ),
            &cors(),
            &request_with_query(&[("rating", "true")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&response)["message"],
            "Required query parameter 'ids' is missing"
        );
    }
}
