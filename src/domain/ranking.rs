// rankingsテーブルの行モデル
//
// 1つのテーブルにレビュー行と集計行が同居する。両者はソートキー`identifier`の
// 値で区別され、アプリケーション層ではタグ付き列挙型として扱う。

use std::fmt;

use thiserror::Error;

use crate::domain::AggregateRanking;

/// レビュー行の識別子プレフィックス（`REVIEW:<accountId>`）
pub const REVIEW_IDENTIFIER_PREFIX: &str = "REVIEW:";

/// 集計行の識別子（レストランごとに1行）
pub const AGGREGATE_IDENTIFIER: &str = "AGGREGATE";

/// 外部公開用レビューIDの区切り文字（`<restaurantId>:<identifier>`）
pub const REVIEW_ID_DELIMITER: char = ':';

/// 識別子・レビューIDの解析エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RankingKeyError {
    /// 未知の識別子（REVIEW:でもAGGREGATEでもない）
    #[error("Unknown ranking identifier: {0}")]
    UnknownIdentifier(String),

    /// レビューIDに区切り文字が含まれない
    #[error("Review ID must contain ':': {0}")]
    MissingDelimiter(String),

    /// レビューIDのレストランIDまたはアカウントIDが空
    #[error("Review ID has an empty component: {0}")]
    EmptyComponent(String),
}

/// rankingsテーブルのソートキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RankingIdentifier {
    /// 1アカウントのレビュー行
    Review { account_id: String },
    /// レストランの集計行
    Aggregate,
}

impl RankingIdentifier {
    pub fn review(account_id: impl Into<String>) -> Self {
        Self::Review {
            account_id: account_id.into(),
        }
    }

    /// 保存済みの識別子文字列を解析
    pub fn parse(identifier: &str) -> Result<Self, RankingKeyError> {
        if identifier == AGGREGATE_IDENTIFIER {
            return Ok(Self::Aggregate);
        }

        match identifier.strip_prefix(REVIEW_IDENTIFIER_PREFIX) {
            Some(account_id) if !account_id.is_empty() => Ok(Self::review(account_id)),
            _ => Err(RankingKeyError::UnknownIdentifier(identifier.to_string())),
        }
    }

    pub fn is_review(&self) -> bool {
        matches!(self, Self::Review { .. })
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate)
    }
}

impl fmt::Display for RankingIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Review { account_id } => write!(f, "{REVIEW_IDENTIFIER_PREFIX}{account_id}"),
            Self::Aggregate => f.write_str(AGGREGATE_IDENTIFIER),
        }
    }
}

/// rankingsテーブルの主キー（restaurantId + identifier）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RankingKey {
    pub restaurant_id: String,
    pub identifier: RankingIdentifier,
}

impl RankingKey {
    pub fn review(restaurant_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            identifier: RankingIdentifier::review(account_id),
        }
    }

    pub fn aggregate(restaurant_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            identifier: RankingIdentifier::Aggregate,
        }
    }

    /// 外部公開用のレビューID（`<restaurantId>:REVIEW:<accountId>`）
    pub fn review_id(&self) -> String {
        format!(
            "{}{}{}",
            self.restaurant_id, REVIEW_ID_DELIMITER, self.identifier
        )
    }

    /// 削除リクエストのレビューIDを主キーへ変換
    ///
    /// 最初の`:REVIEW:`で分割し、前半をレストランID、後半をアカウントIDとする。
    /// レストランIDにコロンが含まれていても`review_id()`の出力は元のキーに戻る。
    /// `:REVIEW:`がない場合は最初の`:`で分割し、後半をアカウントIDとみなす。
    /// 返るキーは常にレビュー行を指す。
    ///
    /// # Arguments
    /// * `review_id` - `restaurantId:REVIEW:accountId`または`restaurantId:accountId`
    pub fn parse_review_id(review_id: &str) -> Result<Self, RankingKeyError> {
        let review_marker = format!("{REVIEW_ID_DELIMITER}{REVIEW_IDENTIFIER_PREFIX}");

        let (restaurant_id, account_id) = review_id
            .split_once(review_marker.as_str())
            .or_else(|| review_id.split_once(REVIEW_ID_DELIMITER))
            .ok_or_else(|| RankingKeyError::MissingDelimiter(review_id.to_string()))?;

        if restaurant_id.is_empty() || account_id.is_empty() {
            return Err(RankingKeyError::EmptyComponent(review_id.to_string()));
        }

        Ok(Self::review(restaurant_id, account_id))
    }
}

/// レビュー行
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRanking {
    pub restaurant_id: String,
    pub account_id: String,
    pub score: f64,
    pub title: String,
    pub body: String,
    /// 投稿日時（ISO-8601）。旧データには存在しない場合がある
    pub iso_date_time: Option<String>,
}

impl ReviewRanking {
    pub fn identifier(&self) -> RankingIdentifier {
        RankingIdentifier::review(&self.account_id)
    }

    pub fn key(&self) -> RankingKey {
        RankingKey::review(&self.restaurant_id, &self.account_id)
    }

    pub fn review_id(&self) -> String {
        self.key().review_id()
    }
}

/// rankingsテーブルの1行
#[derive(Debug, Clone, PartialEq)]
pub enum Ranking {
    Review(ReviewRanking),
    Aggregate(AggregateRanking),
}

impl Ranking {
    pub fn restaurant_id(&self) -> &str {
        match self {
            Self::Review(review) => &review.restaurant_id,
            Self::Aggregate(aggregate) => &aggregate.restaurant_id,
        }
    }

    pub fn key(&self) -> RankingKey {
        match self {
            Self::Review(review) => review.key(),
            Self::Aggregate(aggregate) => aggregate.key(),
        }
    }

    pub fn into_review(self) -> Option<ReviewRanking> {
        match self {
            Self::Review(review) => Some(review),
            Self::Aggregate(_) => None,
        }
    }

    pub fn into_aggregate(self) -> Option<AggregateRanking> {
        match self {
            Self::Review(_) => None,
            Self::Aggregate(aggregate) => Some(aggregate),
        }
    }
}
