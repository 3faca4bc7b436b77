/// レビュー投稿HTTP Lambdaエントリポイント
///
/// ベアラートークンを検証し、レビュー行とレストランの集計行を
/// 1トランザクションで書き込む。
use aws_config::BehaviorVersion;
use aws_sdk_ssm::Client as SsmClient;
use lambda_http::{run, service_fn, Error, Request};
use ranking::application::{review_handler, ReviewWriter};
use ranking::infrastructure::{
    init_logging, AuthConfig, CorsConfig, DynamoDbConfig, DynamoRankingRepository,
    TokenInfoAuthorizer,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    // クライアントと設定は起動時に一度だけ構築する
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let dynamo = DynamoDbConfig::from_sdk_config(&sdk_config)?;
    let auth_config = AuthConfig::from_env_with_ssm(&SsmClient::new(&sdk_config)).await?;

    let writer = ReviewWriter::new(DynamoRankingRepository::new(
        dynamo.client().clone(),
        dynamo.rankings_table().to_string(),
    ));
    let authorizer = TokenInfoAuthorizer::new(auth_config)?;
    let cors = CorsConfig::from_env();

    info!("add_review Lambda関数を初期化");

    let (writer, authorizer, cors) = (&writer, &authorizer, &cors);
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(review_handler::add_review(writer, authorizer, cors, &request).await)
    }))
    .await
}
