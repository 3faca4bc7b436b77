/// DynamoDBのrankingsテーブルを扱うリポジトリ
///
/// レビュー行と集計行は同じテーブルに保存される。アイテムとの相互変換はこの
/// モジュールの境界で行い、上位層にはタグ付き列挙型`Ranking`だけを見せる。
use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, ReturnValue, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{AggregateRanking, Ranking, RankingIdentifier, RankingKey, ReviewRanking};
use crate::infrastructure::batch_get::{batch_get_items, BatchGetError, Item, BATCH_GET_LIMIT};

/// レストラン別・投稿日時順のGSI
pub const RESTAURANT_ID_TIME_INDEX: &str = "restaurantId-isoDateTime-index";

/// アカウント別・投稿日時順のGSI
pub const ACCOUNT_ID_TIME_INDEX: &str = "accountId-isoDateTime-index";

/// 全レビューの投稿日時順GSI（isReview="true"の行のみ）
pub const RECENT_REVIEWS_INDEX: &str = "isReview-isoDateTime-index";

const RESTAURANT_ID_KEY: &str = "restaurantId";
const IDENTIFIER_KEY: &str = "identifier";
const ACCOUNT_ID_KEY: &str = "accountId";
const IS_REVIEW_KEY: &str = "isReview";
const REVIEW_COUNT_KEY: &str = "reviewCount";
const TOTAL_SCORE_KEY: &str = "totalScore";

/// レビュー行の`isReview`属性の値
const IS_REVIEW_VALUE: &str = "true";

/// トランザクションのキャンセル理由のうち条件不一致を表すコード
const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

/// rankingsリポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RankingRepositoryError {
    /// DynamoDBへの書き込みに失敗
    #[error("Write error: {0}")]
    WriteError(String),

    /// DynamoDBからの読み取りに失敗
    #[error("Read error: {0}")]
    ReadError(String),

    /// データのシリアライズ/デシリアライズに失敗
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 楽観的並行性制御の条件が満たされなかった（他の書き込みと競合）
    #[error("Condition check failed: {0}")]
    ConditionFailed(String),
}

impl From<BatchGetError> for RankingRepositoryError {
    fn from(error: BatchGetError) -> Self {
        Self::ReadError(error.to_string())
    }
}

/// 書き込み時点で集計行に期待する状態
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateExpectation {
    /// 集計行がまだ存在しない
    Absent,
    /// 読み取った時点から件数と合計が変わっていない
    Unchanged { review_count: u32, total_score: f64 },
}

impl AggregateExpectation {
    pub fn from_observed(observed: Option<&AggregateRanking>) -> Self {
        match observed {
            None => Self::Absent,
            Some(aggregate) => Self::Unchanged {
                review_count: aggregate.review_count,
                total_score: aggregate.total_score,
            },
        }
    }
}

/// レビュー投稿の書き込み内容（レビュー行と集計行を1トランザクションで保存）
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewWrite {
    pub review: ReviewRanking,
    /// 同じアカウントの既存レビューを差し替えるか
    pub replaces_existing_review: bool,
    pub aggregate: AggregateRanking,
    pub aggregate_expectation: AggregateExpectation,
}

/// 削除時の集計行の変更
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateChange {
    /// 再計算した集計行で置き換える
    Replace(AggregateRanking),
    /// 最後のレビューだったので集計行を削除する
    Remove,
}

/// レビュー削除の書き込み内容
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRemoval {
    /// 削除するレビュー行のキー
    pub review_key: RankingKey,
    pub aggregate_change: AggregateChange,
    pub aggregate_expectation: AggregateExpectation,
}

/// rankingsテーブル操作用トレイト
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// レストランの集計行を取得（強い整合性）
    async fn get_aggregate(
        &self,
        restaurant_id: &str,
    ) -> Result<Option<AggregateRanking>, RankingRepositoryError>;

    /// レビュー行を取得（強い整合性）
    async fn get_review(
        &self,
        key: &RankingKey,
    ) -> Result<Option<ReviewRanking>, RankingRepositoryError>;

    /// レビュー行と集計行を1トランザクションで保存
    ///
    /// # 戻り値
    /// * 成功時は`Ok(())`
    /// * 条件不一致時は`Err(RankingRepositoryError::ConditionFailed)`（どちらも書き込まれない）
    async fn write_review(&self, write: &ReviewWrite) -> Result<(), RankingRepositoryError>;

    /// レビュー行の削除と集計行の更新を1トランザクションで実行
    async fn remove_review(&self, removal: &ReviewRemoval) -> Result<(), RankingRepositoryError>;

    /// レビュー行だけを削除（集計行がない旧データ用）
    ///
    /// # 戻り値
    /// * 行を削除した場合は`Ok(true)`、存在しなかった場合は`Ok(false)`
    async fn delete_review(&self, key: &RankingKey) -> Result<bool, RankingRepositoryError>;

    /// レストランのレビューを新しい順に全件取得（集計行は含まない）
    async fn query_by_restaurant(
        &self,
        restaurant_id: &str,
    ) -> Result<Vec<ReviewRanking>, RankingRepositoryError>;

    /// アカウントのレビューを新しい順に全件取得
    async fn query_by_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<ReviewRanking>, RankingRepositoryError>;

    /// 全レストランの最新レビューを最大`count`件取得
    async fn query_recent(&self, count: u32) -> Result<Vec<ReviewRanking>, RankingRepositoryError>;

    /// 複数レストランの集計行を一括取得
    ///
    /// `restaurant_ids`は`BATCH_GET_LIMIT`件以下であること。
    /// 集計行のないレストランは結果に含まれない。
    async fn batch_get_aggregates(
        &self,
        restaurant_ids: &[String],
    ) -> Result<Vec<AggregateRanking>, RankingRepositoryError>;
}

/// DynamoDB上のレビュー行
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewItem {
    restaurant_id: String,
    identifier: String,
    account_id: String,
    score: f64,
    title: String,
    body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iso_date_time: Option<String>,
    #[serde(default)]
    is_review: String,
}

impl From<&ReviewRanking> for ReviewItem {
    fn from(review: &ReviewRanking) -> Self {
        Self {
            restaurant_id: review.restaurant_id.clone(),
            identifier: review.identifier().to_string(),
            account_id: review.account_id.clone(),
            score: review.score,
            title: review.title.clone(),
            body: review.body.clone(),
            iso_date_time: review.iso_date_time.clone(),
            is_review: IS_REVIEW_VALUE.to_string(),
        }
    }
}

impl From<ReviewItem> for ReviewRanking {
    fn from(item: ReviewItem) -> Self {
        Self {
            restaurant_id: item.restaurant_id,
            account_id: item.account_id,
            score: item.score,
            title: item.title,
            body: item.body,
            iso_date_time: item.iso_date_time,
        }
    }
}

/// DynamoDB上の集計行
///
/// `isoDateTime`にも識別子を入れ、レストラン別GSIの範囲に含める。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregateItem {
    restaurant_id: String,
    identifier: String,
    #[serde(default)]
    iso_date_time: Option<String>,
    total_score: f64,
    review_count: u32,
    average_score: f64,
}

impl From<&AggregateRanking> for AggregateItem {
    fn from(aggregate: &AggregateRanking) -> Self {
        let identifier = RankingIdentifier::Aggregate.to_string();
        Self {
            restaurant_id: aggregate.restaurant_id.clone(),
            iso_date_time: Some(identifier.clone()),
            identifier,
            total_score: aggregate.total_score,
            review_count: aggregate.review_count,
            average_score: aggregate.average_score,
        }
    }
}

impl From<AggregateItem> for AggregateRanking {
    fn from(item: AggregateItem) -> Self {
        Self {
            restaurant_id: item.restaurant_id,
            total_score: item.total_score,
            review_count: item.review_count,
            average_score: item.average_score,
        }
    }
}

/// トランザクション内の1操作に付ける条件式
struct WriteCondition {
    expression: &'static str,
    names: HashMap<String, String>,
    values: Option<HashMap<String, AttributeValue>>,
}

impl WriteCondition {
    fn identifier_names() -> HashMap<String, String> {
        HashMap::from([("#identifier".to_string(), IDENTIFIER_KEY.to_string())])
    }

    fn item_absent() -> Self {
        Self {
            expression: "attribute_not_exists(#identifier)",
            names: Self::identifier_names(),
            values: None,
        }
    }

    fn item_present() -> Self {
        Self {
            expression: "attribute_exists(#identifier)",
            names: Self::identifier_names(),
            values: None,
        }
    }

    fn aggregate(expectation: &AggregateExpectation) -> Self {
        match expectation {
            AggregateExpectation::Absent => Self::item_absent(),
            AggregateExpectation::Unchanged {
                review_count,
                total_score,
            } => Self {
                expression: "#reviewCount = :expectedReviewCount AND #totalScore = :expectedTotalScore",
                names: HashMap::from([
                    ("#reviewCount".to_string(), REVIEW_COUNT_KEY.to_string()),
                    ("#totalScore".to_string(), TOTAL_SCORE_KEY.to_string()),
                ]),
                values: Some(HashMap::from([
                    (
                        ":expectedReviewCount".to_string(),
                        AttributeValue::N(review_count.to_string()),
                    ),
                    (
                        ":expectedTotalScore".to_string(),
                        AttributeValue::N(total_score.to_string()),
                    ),
                ])),
            },
        }
    }
}

/// DynamoDBベースのrankingsリポジトリ実装
#[derive(Debug, Clone)]
pub struct DynamoRankingRepository {
    /// DynamoDBクライアント
    client: DynamoDbClient,
    /// rankingsテーブル名
    table_name: String,
}

impl DynamoRankingRepository {
    /// 新しいDynamoRankingRepositoryを作成
    ///
    /// # 引数
    /// * `client` - DynamoDBクライアント
    /// * `table_name` - rankingsテーブル名
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn key_attributes(key: &RankingKey) -> Item {
        HashMap::from([
            (
                RESTAURANT_ID_KEY.to_string(),
                AttributeValue::S(key.restaurant_id.clone()),
            ),
            (
                IDENTIFIER_KEY.to_string(),
                AttributeValue::S(key.identifier.to_string()),
            ),
        ])
    }

    fn review_to_item(review: &ReviewRanking) -> Result<Item, RankingRepositoryError> {
        serde_dynamo::to_item(ReviewItem::from(review))
            .map_err(|e| RankingRepositoryError::SerializationError(e.to_string()))
    }

    fn aggregate_to_item(aggregate: &AggregateRanking) -> Result<Item, RankingRepositoryError> {
        serde_dynamo::to_item(AggregateItem::from(aggregate))
            .map_err(|e| RankingRepositoryError::SerializationError(e.to_string()))
    }

    /// アイテムを識別子に従ってレビュー行または集計行へ変換
    fn item_to_ranking(item: Item) -> Result<Ranking, RankingRepositoryError> {
        let identifier = item
            .get(IDENTIFIER_KEY)
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| {
                RankingRepositoryError::SerializationError("Missing identifier field".to_string())
            })
            .and_then(|identifier| {
                RankingIdentifier::parse(identifier)
                    .map_err(|e| RankingRepositoryError::SerializationError(e.to_string()))
            })?;

        match identifier {
            RankingIdentifier::Review { .. } => {
                let review: ReviewItem = serde_dynamo::from_item(item)
                    .map_err(|e| RankingRepositoryError::SerializationError(e.to_string()))?;
                Ok(Ranking::Review(review.into()))
            }
            RankingIdentifier::Aggregate => {
                let aggregate: AggregateItem = serde_dynamo::from_item(item)
                    .map_err(|e| RankingRepositoryError::SerializationError(e.to_string()))?;
                Ok(Ranking::Aggregate(aggregate.into()))
            }
        }
    }

    /// クエリ結果からレビュー行だけを取り出す
    ///
    /// 集計行や変換できない行はスキップする。
    fn reviews_from_items(items: Vec<Item>) -> Vec<ReviewRanking> {
        items
            .into_iter()
            .filter_map(|item| match Self::item_to_ranking(item) {
                Ok(Ranking::Review(review)) => Some(review),
                Ok(Ranking::Aggregate(aggregate)) => {
                    debug!(
                        restaurant_id = aggregate.restaurant_id.as_str(),
                        "集計行をレビュー一覧から除外"
                    );
                    None
                }
                Err(e) => {
                    warn!(error = %e, "変換できない行をスキップ");
                    None
                }
            })
            .collect()
    }

    async fn get_item(&self, key: &RankingKey) -> Result<Option<Ranking>, RankingRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| RankingRepositoryError::ReadError(e.into_service_error().to_string()))?;

        result.item.map(Self::item_to_ranking).transpose()
    }

    /// GSIをパーティションキーで新しい順にクエリし、全ページを読み切る
    async fn query_reviews(
        &self,
        index_name: &str,
        key_attribute: &str,
        key_value: &str,
    ) -> Result<Vec<ReviewRanking>, RankingRepositoryError> {
        let mut reviews = Vec::new();
        let mut exclusive_start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index_name)
                .key_condition_expression("#key = :value")
                .filter_expression("attribute_exists(#isReview)")
                .expression_attribute_names("#key", key_attribute)
                .expression_attribute_names("#isReview", IS_REVIEW_KEY)
                .expression_attribute_values(":value", AttributeValue::S(key_value.to_string()))
                .scan_index_forward(false)
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(|e| {
                    RankingRepositoryError::ReadError(e.into_service_error().to_string())
                })?;

            reviews.extend(Self::reviews_from_items(result.items.unwrap_or_default()));

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        debug!(
            index_name = index_name,
            review_count = reviews.len(),
            "レビュー一覧を取得"
        );

        Ok(reviews)
    }

    async fn transact(
        &self,
        items: Vec<TransactWriteItem>,
    ) -> Result<(), RankingRepositoryError> {
        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| Self::classify_transaction_error(e.into_service_error()))?;
        Ok(())
    }

    /// 条件不一致によるキャンセルを競合として区別する
    fn classify_transaction_error(error: TransactWriteItemsError) -> RankingRepositoryError {
        if let TransactWriteItemsError::TransactionCanceledException(canceled) = &error
            && canceled
                .cancellation_reasons()
                .iter()
                .any(|reason| reason.code() == Some(CONDITIONAL_CHECK_FAILED))
        {
            return RankingRepositoryError::ConditionFailed(error.to_string());
        }
        RankingRepositoryError::WriteError(error.to_string())
    }

    fn put_item(
        &self,
        item: Item,
        condition: WriteCondition,
    ) -> Result<TransactWriteItem, RankingRepositoryError> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(condition.expression)
            .set_expression_attribute_names(Some(condition.names))
            .set_expression_attribute_values(condition.values)
            .build()
            .map_err(|e| RankingRepositoryError::WriteError(e.to_string()))?;

        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn delete_item(
        &self,
        key: &RankingKey,
        condition: WriteCondition,
    ) -> Result<TransactWriteItem, RankingRepositoryError> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .condition_expression(condition.expression)
            .set_expression_attribute_names(Some(condition.names))
            .set_expression_attribute_values(condition.values)
            .build()
            .map_err(|e| RankingRepositoryError::WriteError(e.to_string()))?;

        Ok(TransactWriteItem::builder().delete(delete).build())
    }
}

#[async_trait]
impl RankingRepository for DynamoRankingRepository {
    async fn get_aggregate(
        &self,
        restaurant_id: &str,
    ) -> Result<Option<AggregateRanking>, RankingRepositoryError> {
        Ok(self
            .get_item(&RankingKey::aggregate(restaurant_id))
            .await?
            .and_then(Ranking::into_aggregate))
    }

    async fn get_review(
        &self,
        key: &RankingKey,
    ) -> Result<Option<ReviewRanking>, RankingRepositoryError> {
        Ok(self.get_item(key).await?.and_then(Ranking::into_review))
    }

    async fn write_review(&self, write: &ReviewWrite) -> Result<(), RankingRepositoryError> {
        let review_condition = if write.replaces_existing_review {
            WriteCondition::item_present()
        } else {
            WriteCondition::item_absent()
        };

        let review_put = self.put_item(Self::review_to_item(&write.review)?, review_condition)?;
        let aggregate_put = self.put_item(
            Self::aggregate_to_item(&write.aggregate)?,
            WriteCondition::aggregate(&write.aggregate_expectation),
        )?;

        self.transact(vec![review_put, aggregate_put]).await
    }

    async fn remove_review(&self, removal: &ReviewRemoval) -> Result<(), RankingRepositoryError> {
        let review_delete = self.delete_item(&removal.review_key, WriteCondition::item_present())?;
        let aggregate_condition = WriteCondition::aggregate(&removal.aggregate_expectation);
        let aggregate_write = match &removal.aggregate_change {
            AggregateChange::Replace(aggregate) => {
                self.put_item(Self::aggregate_to_item(aggregate)?, aggregate_condition)?
            }
            AggregateChange::Remove => self.delete_item(
                &RankingKey::aggregate(&removal.review_key.restaurant_id),
                aggregate_condition,
            )?,
        };

        self.transact(vec![review_delete, aggregate_write]).await
    }

    async fn delete_review(&self, key: &RankingKey) -> Result<bool, RankingRepositoryError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| RankingRepositoryError::WriteError(e.into_service_error().to_string()))?;

        Ok(result.attributes.is_some_and(|attributes| !attributes.is_empty()))
    }

    async fn query_by_restaurant(
        &self,
        restaurant_id: &str,
    ) -> Result<Vec<ReviewRanking>, RankingRepositoryError> {
        self.query_reviews(RESTAURANT_ID_TIME_INDEX, RESTAURANT_ID_KEY, restaurant_id)
            .await
    }

    async fn query_by_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<ReviewRanking>, RankingRepositoryError> {
        self.query_reviews(ACCOUNT_ID_TIME_INDEX, ACCOUNT_ID_KEY, account_id)
            .await
    }

    async fn query_recent(&self, count: u32) -> Result<Vec<ReviewRanking>, RankingRepositoryError> {
        let limit = i32::try_from(count).unwrap_or(i32::MAX);

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(RECENT_REVIEWS_INDEX)
            .key_condition_expression("#isReview = :isReview")
            .expression_attribute_names("#isReview", IS_REVIEW_KEY)
            .expression_attribute_values(":isReview", AttributeValue::S(IS_REVIEW_VALUE.to_string()))
            .scan_index_forward(false)
            .limit(limit)
            .send()
            .await
            .map_err(|e| RankingRepositoryError::ReadError(e.into_service_error().to_string()))?;

        Ok(Self::reviews_from_items(result.items.unwrap_or_default()))
    }

    async fn batch_get_aggregates(
        &self,
        restaurant_ids: &[String],
    ) -> Result<Vec<AggregateRanking>, RankingRepositoryError> {
        if restaurant_ids.len() > BATCH_GET_LIMIT {
            return Err(RankingRepositoryError::ReadError(format!(
                "Too many keys for one batch: {}",
                restaurant_ids.len()
            )));
        }

        let keys = restaurant_ids
            .iter()
            .map(|id| Self::key_attributes(&RankingKey::aggregate(id)))
            .collect();

        let items = batch_get_items(&self.client, &self.table_name, keys, false).await?;

        let aggregates = items
            .into_iter()
            .filter_map(|item| match Self::item_to_ranking(item) {
                Ok(ranking) => ranking.into_aggregate(),
                Err(e) => {
                    warn!(error = %e, "変換できない集計行をスキップ");
                    None
                }
            })
            .collect();

        Ok(aggregates)
    }
}
