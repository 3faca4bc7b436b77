// レビューと平均評価の読み取り

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Review, ReviewRanking};
use crate::infrastructure::{
    RankingRepository, RankingRepositoryError, UserMetadataRepository,
    UserMetadataRepositoryError, BATCH_GET_LIMIT,
};

/// レビュー読み取りのエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReviewReaderError {
    #[error("Repository error: {0}")]
    RepositoryError(String),
}

impl From<RankingRepositoryError> for ReviewReaderError {
    fn from(error: RankingRepositoryError) -> Self {
        Self::RepositoryError(error.to_string())
    }
}

impl From<UserMetadataRepositoryError> for ReviewReaderError {
    fn from(error: UserMetadataRepositoryError) -> Self {
        Self::RepositoryError(error.to_string())
    }
}

/// レビュー一覧の応答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetAllReviewsOutput {
    pub reviews: Vec<Review>,
}

/// 1レストランの評価情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReviewInformation {
    pub restaurant_id: String,
    /// 小数第1位で切り捨てた平均（評価を要求しない場合はnull）
    pub average_score: Option<f64>,
}

/// 評価情報一括取得の応答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAggregateReviewInformationOutput {
    pub restaurant_id_to_restaurant_information: HashMap<String, AggregateReviewInformation>,
}

/// 一覧の取得条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewQuery {
    ByRestaurant(String),
    ByAccount(String),
}

/// 重複を除く（最初に現れた順を保つ）
fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// レビュー読み取りサービス
pub struct ReviewReader<RR, UR>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    ranking_repo: RR,
    user_metadata_repo: UR,
}

impl<RR, UR> ReviewReader<RR, UR>
where
    RR: RankingRepository,
    UR: UserMetadataRepository,
{
    pub fn new(ranking_repo: RR, user_metadata_repo: UR) -> Self {
        Self {
            ranking_repo,
            user_metadata_repo,
        }
    }

    /// 条件に合うレビューを新しい順に全件取得
    pub async fn get_all_reviews(
        &self,
        query: &ReviewQuery,
    ) -> Result<GetAllReviewsOutput, ReviewReaderError> {
        let rankings = match query {
            ReviewQuery::ByRestaurant(restaurant_id) => {
                self.ranking_repo.query_by_restaurant(restaurant_id).await?
            }
            ReviewQuery::ByAccount(account_id) => {
                self.ranking_repo.query_by_account(account_id).await?
            }
        };

        Ok(GetAllReviewsOutput {
            reviews: self.attach_usernames(rankings).await?,
        })
    }

    /// 全レストランの最新レビューを最大`count`件取得
    pub async fn get_recent_reviews(
        &self,
        count: u32,
    ) -> Result<GetAllReviewsOutput, ReviewReaderError> {
        let rankings = self.ranking_repo.query_recent(count).await?;
        Ok(GetAllReviewsOutput {
            reviews: self.attach_usernames(rankings).await?,
        })
    }

    /// 複数レストランの平均評価を取得
    ///
    /// 集計行のないレストランは結果に含まれない。
    ///
    /// # Arguments
    /// * `restaurant_ids` - レストランID（重複・順序は問わない）
    /// * `include_rating` - falseの場合、平均はすべてnull
    pub async fn get_aggregate_review_information(
        &self,
        restaurant_ids: &[String],
        include_rating: bool,
    ) -> Result<GetAggregateReviewInformationOutput, ReviewReaderError> {
        let ids = distinct(restaurant_ids.iter().cloned());
        let mut information = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(BATCH_GET_LIMIT) {
            for aggregate in self.ranking_repo.batch_get_aggregates(chunk).await? {
                let average_score = include_rating.then(|| aggregate.truncated_average());
                information.insert(
                    aggregate.restaurant_id.clone(),
                    AggregateReviewInformation {
                        restaurant_id: aggregate.restaurant_id,
                        average_score,
                    },
                );
            }
        }

        debug!(
            requested = ids.len(),
            found = information.len(),
            include_rating = include_rating,
            "平均評価を取得"
        );

        Ok(GetAggregateReviewInformationOutput {
            restaurant_id_to_restaurant_information: information,
        })
    }

    /// レビューに公開ユーザー名を付ける（メタデータがなければnull）
    async fn attach_usernames(
        &self,
        rankings: Vec<ReviewRanking>,
    ) -> Result<Vec<Review>, ReviewReaderError> {
        let account_ids = distinct(rankings.iter().map(|r| r.account_id.clone()));
        let mut usernames: HashMap<String, String> = HashMap::new();

        for chunk in account_ids.chunks(BATCH_GET_LIMIT) {
            for metadata in self.user_metadata_repo.batch_get(chunk).await? {
                if let Some(username) = metadata.username {
                    usernames.insert(metadata.account_id, username);
                }
            }
        }

        Ok(rankings
            .into_iter()
            .map(|ranking| {
                let username = usernames.get(&ranking.account_id).cloned();
                Review::from_ranking(ranking, username)
            })
            .collect())
    }
}
