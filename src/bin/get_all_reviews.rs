/// get_all_reviews HTTP Lambdaエントリポイント
///
/// レストランまたはアカウントのレビュー一覧を返す。
use lambda_http::{run, service_fn, Error, Request};
use ranking::application::{review_handler, ReviewReader};
use ranking::infrastructure::{
    init_logging, CorsConfig, DynamoDbConfig, DynamoRankingRepository,
    DynamoUserMetadataRepository,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let dynamo = DynamoDbConfig::from_env().await?;

    let reader = ReviewReader::new(
        DynamoRankingRepository::new(
            dynamo.client().clone(),
            dynamo.rankings_table().to_string(),
        ),
        DynamoUserMetadataRepository::new(
            dynamo.client().clone(),
            dynamo.user_metadata_table().to_string(),
        ),
    );
    let cors = CorsConfig::from_env();

    info!("get_all_reviews Lambda関数を初期化");

    let (reader, cors) = (&reader, &cors);
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(review_handler::get_all_reviews(reader, cors, &request).await)
    }))
    .await
}
