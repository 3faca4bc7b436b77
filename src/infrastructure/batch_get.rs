/// DynamoDB BatchGetItemの共通処理
///
/// 1回の呼び出しで読めるキー数には上限があるため、呼び出し側で
/// `BATCH_GET_LIMIT`件以下に分割してから渡す。
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;
use tracing::warn;

/// 1回のBatchGetItemで要求できる最大キー数
pub const BATCH_GET_LIMIT: usize = 100;

/// UnprocessedKeysを再送する最大回数（初回を含む）
const MAX_BATCH_GET_ROUNDS: u32 = 4;

/// 再送前に待つ時間の基準値（ミリ秒、回数ごとに倍にする）
const BATCH_GET_BASE_DELAY_MS: u64 = 50;

pub type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BatchGetError {
    #[error("Batch get request error: {0}")]
    RequestError(String),

    #[error("Unprocessed keys remained after {0} rounds")]
    UnprocessedKeysRemained(u32),
}

/// 1回のBatchGetItemの結果
#[derive(Debug, Clone, Default)]
pub struct BatchGetPage {
    pub items: Vec<Item>,
    /// DynamoDBが処理しなかったキー（スロットリング時に返る）
    pub unprocessed: Option<KeysAndAttributes>,
}

/// 1テーブルに対するBatchGetItem呼び出し用トレイト
#[async_trait]
pub trait BatchGetOps: Send + Sync {
    async fn batch_get(
        &self,
        table_name: &str,
        request: KeysAndAttributes,
    ) -> Result<BatchGetPage, BatchGetError>;
}

#[async_trait]
impl BatchGetOps for DynamoDbClient {
    async fn batch_get(
        &self,
        table_name: &str,
        request: KeysAndAttributes,
    ) -> Result<BatchGetPage, BatchGetError> {
        let output = self
            .batch_get_item()
            .request_items(table_name, request)
            .send()
            .await
            .map_err(|e| BatchGetError::RequestError(e.into_service_error().to_string()))?;

        let items = output
            .responses
            .and_then(|mut responses| responses.remove(table_name))
            .unwrap_or_default();
        let unprocessed = output
            .unprocessed_keys
            .and_then(|mut unprocessed| unprocessed.remove(table_name));

        Ok(BatchGetPage { items, unprocessed })
    }
}

/// `round`回目が未処理キーを残したときに待つ時間
fn backoff_delay(base_delay: Duration, round: u32) -> Duration {
    base_delay.saturating_mul(2u32.saturating_pow(round.saturating_sub(1)))
}

/// 1テーブルからキーの集合を一括取得する
///
/// DynamoDBが返した`UnprocessedKeys`は指数バックオフを挟んで上限回数まで再送する。
/// 存在しないキーは結果に含まれない。
///
/// # 引数
/// * `keys` - 主キーの一覧（`BATCH_GET_LIMIT`件以下）
/// * `consistent_read` - 強い整合性で読むか
pub async fn batch_get_items<O>(
    ops: &O,
    table_name: &str,
    keys: Vec<Item>,
    consistent_read: bool,
) -> Result<Vec<Item>, BatchGetError>
where
    O: BatchGetOps + ?Sized,
{
    batch_get_with_backoff(
        ops,
        table_name,
        keys,
        consistent_read,
        Duration::from_millis(BATCH_GET_BASE_DELAY_MS),
    )
    .await
}

async fn batch_get_with_backoff<O>(
    ops: &O,
    table_name: &str,
    keys: Vec<Item>,
    consistent_read: bool,
    base_delay: Duration,
) -> Result<Vec<Item>, BatchGetError>
where
    O: BatchGetOps + ?Sized,
{
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut pending = Some(
        KeysAndAttributes::builder()
            .set_keys(Some(keys))
            .consistent_read(consistent_read)
            .build()
            .map_err(|e| BatchGetError::RequestError(e.to_string()))?,
    );
    let mut items = Vec::new();

    for round in 1..=MAX_BATCH_GET_ROUNDS {
        let Some(request) = pending.take() else {
            break;
        };

        let page = ops.batch_get(table_name, request).await?;
        items.extend(page.items);

        pending = page
            .unprocessed
            .filter(|request| !request.keys().is_empty());

        if let Some(request) = &pending
            && round < MAX_BATCH_GET_ROUNDS
        {
            let delay = backoff_delay(base_delay, round);
            warn!(
                table_name = table_name,
                round = round,
                unprocessed_count = request.keys().len(),
                delay_ms = delay.as_millis() as u64,
                "BatchGetItemの未処理キーを待機後に再送"
            );
            tokio::time::sleep(delay).await;
        }
    }

    if pending.is_some() {
        return Err(BatchGetError::UnprocessedKeysRemained(MAX_BATCH_GET_ROUNDS));
    }

    Ok(items)
}
