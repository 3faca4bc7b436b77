/// レビュー削除HTTP Lambdaエントリポイント
///
/// レビュー行を削除し、レストランの集計行を再計算する。
use lambda_http::{run, service_fn, Error, Request};
use ranking::application::{review_handler, ReviewWriter};
use ranking::infrastructure::{init_logging, CorsConfig, DynamoDbConfig, DynamoRankingRepository};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let dynamo = DynamoDbConfig::from_env().await?;

    let writer = ReviewWriter::new(DynamoRankingRepository::new(
        dynamo.client().clone(),
        dynamo.rankings_table().to_string(),
    ));
    let cors = CorsConfig::from_env();

    info!("delete_review Lambda関数を初期化");

    let (writer, cors) = (&writer, &cors);
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(review_handler::delete_review(writer, cors, &request).await)
    }))
    .await
}
