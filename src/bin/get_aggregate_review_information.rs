/// get_aggregate_review_information HTTP Lambdaエントリポイント
///
/// 複数レストランの平均評価をまとめて返す。
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

    info!("get_aggregate_review_information Lambda関数を初期化");

    let (reader, cors) = (&reader, &cors);
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(review_handler::get_aggregate_review_information(reader, cors, &request).await)
    }))
    .await
}
