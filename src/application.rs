// アプリケーション層モジュール
pub mod api_response;
pub mod request_parser;
pub mod review_handler;
pub mod review_reader;
pub mod review_writer;
pub mod user_metadata_handler;
pub mod user_metadata_service;

// 再エクスポート
pub use api_response::{ApiError, ApiErrorBody, ApiResponse};
pub use request_parser::{
    RequestParseError, RequestParser, ACCOUNT_ID_PARAM, COUNT_PARAM, DEFAULT_USERNAME_PARAM,
    IDS_PARAM, INCLUDE_RATING_PARAM, RESTAURANT_ID_PARAM,
};
pub use review_reader::{
    AggregateReviewInformation, GetAggregateReviewInformationOutput, GetAllReviewsOutput,
    ReviewQuery, ReviewReader, ReviewReaderError,
};
pub use review_writer::{DeleteOutcome, RetryPolicy, ReviewWriter, ReviewWriterError};
pub use user_metadata_service::{UserMetadataService, UserMetadataServiceError};
