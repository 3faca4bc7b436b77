/// get_public_user_metadata HTTP Lambdaエントリポイント
///
/// アカウントの公開ユーザー名を返す（未登録ならnull）。
use lambda_http::{run, service_fn, Error, Request};
use ranking::application::{user_metadata_handler, UserMetadataService};
use ranking::infrastructure::{
    init_logging, CorsConfig, DynamoDbConfig, DynamoUserMetadataRepository,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let dynamo = DynamoDbConfig::from_env().await?;

    let service = UserMetadataService::new(DynamoUserMetadataRepository::new(
        dynamo.client().clone(),
        dynamo.user_metadata_table().to_string(),
    ));
    let cors = CorsConfig::from_env();

    info!("get_public_user_metadata Lambda関数を初期化");

    let (service, cors) = (&service, &cors);
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(user_metadata_handler::get_public_user_metadata(service, cors, &request).await)
    }))
    .await
}
