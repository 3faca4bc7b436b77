// レビューの投稿と削除
//
// レビュー行と集計行は常に1トランザクションで書き込む。集計行は読み取り時点の
// 件数と合計を条件にして書き込み、他の書き込みと競合した場合は読み直して再試行する。

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{AggregateRanking, RankingKey, Review, ReviewRanking};
use crate::infrastructure::{
    AggregateChange, AggregateExpectation, RankingRepository, RankingRepositoryError,
    ReviewRemoval, ReviewWrite,
};

/// 競合時の最大試行回数（初回を含む）
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 競合時の初回待機時間（ミリ秒）
pub const DEFAULT_BASE_DELAY_MS: u64 = 50;

/// レビュー書き込みのエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReviewWriterError {
    #[error("Repository error: {0}")]
    RepositoryError(String),

    #[error("Concurrent update conflict for restaurant {restaurant_id} after {attempts} attempts")]
    ConflictRetriesExhausted { restaurant_id: String, attempts: u32 },
}

impl From<RankingRepositoryError> for ReviewWriterError {
    fn from(error: RankingRepositoryError) -> Self {
        Self::RepositoryError(error.to_string())
    }
}

/// 削除の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// 競合時の再試行ポリシー（指数バックオフ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt`回目の失敗後に待つ時間
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        )
    }
}

/// レビュー書き込みサービス
pub struct ReviewWriter<RR>
where
    RR: RankingRepository,
{
    ranking_repo: RR,
    retry_policy: RetryPolicy,
}

impl<RR> ReviewWriter<RR>
where
    RR: RankingRepository,
{
    pub fn new(ranking_repo: RR) -> Self {
        Self {
            ranking_repo,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// レビューを保存し、レストランの集計行を更新する
    ///
    /// 同じアカウントが同じレストランに投稿済みの場合はレビューを差し替え、
    /// 集計行の件数は変えずに合計だけを更新する。
    /// 投稿日時がなければ現在時刻を付ける。
    ///
    /// # Returns
    /// * `Ok(Review)` - 保存したレビュー（usernameはnull）
    /// * `Err(ReviewWriterError)` - 保存に失敗した場合（何も書き込まれていない）
    pub async fn add_new_review(
        &self,
        mut review: ReviewRanking,
    ) -> Result<Review, ReviewWriterError> {
        review
            .iso_date_time
            .get_or_insert_with(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        for attempt in 1..=self.retry_policy.max_attempts() {
            let write = self.prepare_write(&review).await?;

            match self.ranking_repo.write_review(&write).await {
                Ok(()) => {
                    info!(
                        restaurant_id = review.restaurant_id.as_str(),
                        account_id = review.account_id.as_str(),
                        review_count = write.aggregate.review_count,
                        replaced = write.replaces_existing_review,
                        "レビューを保存"
                    );
                    return Ok(Review::from_ranking(review, None));
                }
                Err(RankingRepositoryError::ConditionFailed(reason)) => {
                    self.back_off(&review.restaurant_id, attempt, &reason).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ReviewWriterError::ConflictRetriesExhausted {
            restaurant_id: review.restaurant_id,
            attempts: self.retry_policy.max_attempts(),
        })
    }

    /// 現在の集計行と既存レビューを読み、書き込み内容を組み立てる
    async fn prepare_write(&self, review: &ReviewRanking) -> Result<ReviewWrite, ReviewWriterError> {
        let current_aggregate = self
            .ranking_repo
            .get_aggregate(&review.restaurant_id)
            .await?;
        let previous_review = self.ranking_repo.get_review(&review.key()).await?;

        let aggregate = match (&current_aggregate, &previous_review) {
            (None, _) => AggregateRanking::for_first_review(&review.restaurant_id, review.score),
            (Some(current), Some(previous)) => {
                current.with_replaced_review(previous.score, review.score)
            }
            (Some(current), None) => current.with_new_review(review.score),
        };

        Ok(ReviewWrite {
            review: review.clone(),
            replaces_existing_review: previous_review.is_some(),
            aggregate,
            aggregate_expectation: AggregateExpectation::from_observed(current_aggregate.as_ref()),
        })
    }

    /// レビューを削除し、レストランの集計行を再計算する
    ///
    /// 最後のレビューだった場合は集計行も削除する。
    /// 集計行が存在しない旧データではレビュー行だけを削除する。
    pub async fn delete_review(&self, key: &RankingKey) -> Result<DeleteOutcome, ReviewWriterError> {
        for attempt in 1..=self.retry_policy.max_attempts() {
            let Some(review) = self.ranking_repo.get_review(key).await? else {
                info!(review_id = key.review_id().as_str(), "削除対象のレビューが存在しない");
                return Ok(DeleteOutcome::NotFound);
            };

            let Some(aggregate) = self.ranking_repo.get_aggregate(&key.restaurant_id).await? else {
                warn!(
                    restaurant_id = key.restaurant_id.as_str(),
                    "集計行がないためレビュー行のみ削除"
                );
                let deleted = self.ranking_repo.delete_review(key).await?;
                return Ok(if deleted {
                    DeleteOutcome::Deleted
                } else {
                    DeleteOutcome::NotFound
                });
            };

            let aggregate_change = match aggregate.without_review(review.score) {
                Some(updated) => AggregateChange::Replace(updated),
                None => AggregateChange::Remove,
            };
            let removal = ReviewRemoval {
                review_key: key.clone(),
                aggregate_change,
                aggregate_expectation: AggregateExpectation::from_observed(Some(&aggregate)),
            };

            match self.ranking_repo.remove_review(&removal).await {
                Ok(()) => {
                    info!(
                        restaurant_id = key.restaurant_id.as_str(),
                        account_id = review.account_id.as_str(),
                        aggregate_removed = matches!(removal.aggregate_change, AggregateChange::Remove),
                        "レビューを削除"
                    );
                    return Ok(DeleteOutcome::Deleted);
                }
                Err(RankingRepositoryError::ConditionFailed(reason)) => {
                    self.back_off(&key.restaurant_id, attempt, &reason).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ReviewWriterError::ConflictRetriesExhausted {
            restaurant_id: key.restaurant_id.clone(),
            attempts: self.retry_policy.max_attempts(),
        })
    }

    async fn back_off(&self, restaurant_id: &str, attempt: u32, reason: &str) {
        warn!(
            restaurant_id = restaurant_id,
            attempt = attempt,
            max_attempts = self.retry_policy.max_attempts(),
            reason = reason,
            "集計行の更新が競合"
        );
        if attempt < self.retry_policy.max_attempts() {
            tokio::time::sleep(self.retry_policy.delay_after(attempt)).await;
        }
    }
}
