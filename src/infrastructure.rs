// Infrastructure layer modules
pub mod authorizer;
pub mod batch_get;
pub mod config;
pub mod cors_config;
pub mod logging;
pub mod ranking_repository;
pub mod user_metadata_repository;

// Re-exports
pub use authorizer::{
    AuthConfig, AuthConfigError, Authorization, AuthorizationError, Authorizer,
    TokenInfoAuthorizer, TokenInfoClaims,
};
pub use batch_get::{BatchGetError, BatchGetOps, BatchGetPage, BATCH_GET_LIMIT};
pub use config::{DynamoDbConfig, DynamoDbConfigError};
pub use cors_config::CorsConfig;
pub use logging::init_logging;
pub use ranking_repository::{
    AggregateChange, AggregateExpectation, DynamoRankingRepository, RankingRepository,
    RankingRepositoryError, ReviewRemoval, ReviewWrite,
};
pub use user_metadata_repository::{
    DynamoUserMetadataRepository, UserMetadataRepository, UserMetadataRepositoryError,
};
