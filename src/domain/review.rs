// レビューの入出力モデルと入力検証

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{
    RankingKey, ReviewRanking, ValidationErrors, REJECTION_FORMAT_CODE, REJECTION_REQUIRED_CODE,
};

/// 受け付けるスコアの下限
pub const MIN_SCORE: f64 = 0.0;

/// 受け付けるスコアの上限
pub const MAX_SCORE: f64 = 10.0;

/// 応答用のレビュー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// `<restaurantId>:REVIEW:<accountId>`
    pub review_id: String,
    pub restaurant_id: String,
    pub account_id: String,
    pub score: f64,
    pub title: String,
    pub body: String,
    pub iso_date_time: Option<String>,
    /// 公開ユーザー名（未設定の場合はnull）
    pub username: Option<String>,
}

impl Review {
    pub fn from_ranking(ranking: ReviewRanking, username: Option<String>) -> Self {
        Self {
            review_id: ranking.review_id(),
            restaurant_id: ranking.restaurant_id,
            account_id: ranking.account_id,
            score: ranking.score,
            title: ranking.title,
            body: ranking.body,
            iso_date_time: ranking.iso_date_time,
            username,
        }
    }
}

/// レビュー投稿リクエストのボディ
///
/// 欠けたフィールドも受け取り、検証で一括して拒否する。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub restaurant_id: Option<String>,
    pub account_id: Option<String>,
    pub score: Option<f64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub iso_date_time: Option<String>,
}

impl ReviewSubmission {
    /// 投稿内容を検証してレビュー行へ変換
    ///
    /// # Returns
    /// * `Ok(ReviewRanking)` - すべてのフィールドが有効な場合
    /// * `Err(ValidationErrors)` - 拒否されたすべてのフィールドを含む
    pub fn validate(self) -> Result<ReviewRanking, ValidationErrors> {
        let mut errors = ValidationErrors::new("review");

        errors.require_text(
            "restaurantId",
            self.restaurant_id.as_deref(),
            "The restaurant ID is required.",
        );
        errors.require_text(
            "accountId",
            self.account_id.as_deref(),
            "The account ID is required.",
        );
        match self.score {
            None => errors.reject("score", REJECTION_REQUIRED_CODE, "The score is required."),
            Some(score) if !(MIN_SCORE..=MAX_SCORE).contains(&score) => errors.reject(
                "score",
                REJECTION_FORMAT_CODE,
                format!("The score must be between {MIN_SCORE} and {MAX_SCORE}."),
            ),
            Some(_) => {}
        }
        errors.require_text("title", self.title.as_deref(), "The title is required.");
        errors.require_text("body", self.body.as_deref(), "The body is required.");
        if let Some(iso_date_time) = self.iso_date_time.as_deref()
            && DateTime::parse_from_rfc3339(iso_date_time).is_err()
        {
            errors.reject(
                "isoDateTime",
                REJECTION_FORMAT_CODE,
                "The ISO date time must be an RFC 3339 timestamp.",
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ReviewRanking {
            restaurant_id: self.restaurant_id.unwrap_or_default(),
            account_id: self.account_id.unwrap_or_default(),
            score: self.score.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            iso_date_time: self.iso_date_time,
        })
    }
}

/// レビュー削除リクエストのボディ
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReviewRequest {
    pub review_id: Option<String>,
}

impl DeleteReviewRequest {
    /// レビューIDを検証して削除対象のキーへ変換
    pub fn validate(self) -> Result<RankingKey, ValidationErrors> {
        let mut errors = ValidationErrors::new("deleteReviewRequest");

        let Some(review_id) = self.review_id.filter(|id| !id.trim().is_empty()) else {
            errors.reject(
                "reviewId",
                REJECTION_REQUIRED_CODE,
                "The review ID is required.",
            );
            return Err(errors);
        };

        RankingKey::parse_review_id(&review_id).map_err(|e| {
            errors.reject("reviewId", REJECTION_FORMAT_CODE, e.to_string());
            errors
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_submission() -> ReviewSubmission {
        ReviewSubmission {
            restaurant_id: Some("r1".to_string()),
            account_id: Some("a1".to_string()),
            score: Some(7.5),
            title: Some("Great fries".to_string()),
            body: Some("Crispy and hot".to_string()),
            iso_date_time: Some("2024-03-01T12:00:00Z".to_string()),
        }
    }

    // ==================== 投稿検証 ====================

    #[test]
    fn test_valid_submission() {
        let ranking = valid_submission().validate().unwrap();
        assert_eq!(ranking.restaurant_id, "r1");
        assert_eq!(ranking.account_id, "a1");
        assert_eq!(ranking.score, 7.5);
        assert_eq!(ranking.iso_date_time.as_deref(), Some("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn test_iso_date_time_is_optional() {
        let submission = ReviewSubmission {
            iso_date_time: None,
            ..valid_submission()
        };
        assert!(submission.validate().is_ok());
    }

    #[test]
    fn test_invalid_iso_date_time() {
        let submission = ReviewSubmission {
            iso_date_time: Some("yesterday".to_string()),
            ..valid_submission()
        };
        let errors = submission.validate().unwrap_err();
        assert!(errors.has_field("isoDateTime"));
        assert_eq!(errors.errors()[0].code, REJECTION_FORMAT_CODE);
    }

    #[test]
    fn test_score_out_of_range_is_rejected() {
        for score in [-0.5, 10.5, f64::MAX, f64::INFINITY, f64::NAN] {
            let submission = ReviewSubmission {
                score: Some(score),
                ..valid_submission()
            };
            let errors = submission.validate().unwrap_err();
            assert!(errors.has_field("score"), "{score} should be rejected");
            assert_eq!(errors.errors()[0].code, REJECTION_FORMAT_CODE);
        }
    }

    #[test]
    fn test_score_bounds_are_accepted() {
        for score in [MIN_SCORE, MAX_SCORE] {
            let submission = ReviewSubmission {
                score: Some(score),
                ..valid_submission()
            };
            assert_eq!(submission.validate().unwrap().score, score);
        }
    }

    #[test]
    fn test_review_with_colon_in_restaurant_id_can_be_deleted() {
        let submission = ReviewSubmission {
            restaurant_id: Some("places:ChIJ123".to_string()),
            ..valid_submission()
        };
        let ranking = submission.validate().unwrap();

        let key = DeleteReviewRequest {
            review_id: Some(ranking.review_id()),
        }
        .validate()
        .unwrap();

        assert_eq!(key, ranking.key());
    }

    #[test]
    fn test_all_missing_fields_are_reported() {
        let errors = ReviewSubmission::default().validate().unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["restaurantId", "accountId", "score", "title", "body"]
        );
        assert!(errors
            .errors()
            .iter()
            .all(|e| e.code == REJECTION_REQUIRED_CODE));
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let submission = ReviewSubmission {
            title: Some("  ".to_string()),
            ..valid_submission()
        };
        let errors = submission.validate().unwrap_err();
        assert_eq!(errors.errors().len(), 1);
        assert!(errors.has_field("title"));
    }

    #[test]
    fn test_submission_deserializes_camel_case() {
        let json = r#"{"restaurantId":"r1","accountId":"a1","score":5,"title":"t","body":"b"}"#;
        let submission: ReviewSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.restaurant_id.as_deref(), Some("r1"));
        assert_eq!(submission.score, Some(5.0));
        assert!(submission.iso_date_time.is_none());
    }

    // ==================== 応答 ====================

    #[test]
    fn test_review_serializes_with_review_id_and_null_username() {
        let ranking = valid_submission().validate().unwrap();
        let review = Review::from_ranking(ranking, None);
        let json = serde_json::to_value(&review).unwrap();

        assert_eq!(json["reviewId"], "r1:REVIEW:a1");
        assert_eq!(json["restaurantId"], "r1");
        assert_eq!(json["isoDateTime"], "2024-03-01T12:00:00Z");
        assert!(json["username"].is_null());
    }

    // ==================== 削除リクエスト ====================

    #[test]
    fn test_delete_request_valid() {
        let request = DeleteReviewRequest {
            review_id: Some("r1:REVIEW:a1".to_string()),
        };
        assert_eq!(request.validate().unwrap(), RankingKey::review("r1", "a1"));
    }

    #[test]
    fn test_delete_request_missing_review_id() {
        let errors = DeleteReviewRequest::default().validate().unwrap_err();
        assert!(errors.has_field("reviewId"));
        assert_eq!(errors.errors()[0].code, REJECTION_REQUIRED_CODE);
    }

    #[test]
    fn test_delete_request_without_delimiter() {
        let request = DeleteReviewRequest {
            review_id: Some("r1".to_string()),
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.errors()[0].code, REJECTION_FORMAT_CODE);
    }
}
