// Domain layer modules
pub mod aggregate_ranking;
pub mod ranking;
pub mod review;
pub mod user_metadata;
pub mod validation;

// Re-exports
pub use aggregate_ranking::{truncate_to_one_decimal, AggregateRanking};
pub use ranking::{
    Ranking, RankingIdentifier, RankingKey, RankingKeyError, ReviewRanking,
    AGGREGATE_IDENTIFIER, REVIEW_IDENTIFIER_PREFIX,
};
pub use review::{DeleteReviewRequest, Review, ReviewSubmission, MAX_SCORE, MIN_SCORE};
pub use user_metadata::{PublicUserMetadata, PublicUserMetadataOutput, UserMetadataSubmission};
pub use validation::{FieldError, ValidationErrors, REJECTION_FORMAT_CODE, REJECTION_REQUIRED_CODE};
