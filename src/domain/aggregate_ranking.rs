// レストラン別の集計行と平均スコアの計算
//
// 集計行はレビュー件数と合計スコアを保持し、平均スコアはそこから導出する。
// 件数が0になる集計行は存在させない（最後のレビュー削除時は行ごと消す）。

use crate::domain::RankingKey;

/// レストランの集計行
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRanking {
    pub restaurant_id: String,
    pub total_score: f64,
    pub review_count: u32,
    pub average_score: f64,
}

impl AggregateRanking {
    /// 合計スコアと件数から集計行を作成（平均は再計算する）
    pub fn new(restaurant_id: impl Into<String>, total_score: f64, review_count: u32) -> Self {
        let average_score = if review_count == 0 {
            0.0
        } else {
            total_score / f64::from(review_count)
        };

        Self {
            restaurant_id: restaurant_id.into(),
            total_score,
            review_count,
            average_score,
        }
    }

    /// レストランの最初のレビューから集計行を作成
    pub fn for_first_review(restaurant_id: impl Into<String>, score: f64) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            total_score: score,
            review_count: 1,
            average_score: score,
        }
    }

    /// 新しいレビューを1件加えた集計行
    pub fn with_new_review(&self, score: f64) -> Self {
        Self::new(
            &self.restaurant_id,
            self.total_score + score,
            self.review_count + 1,
        )
    }

    /// 同一アカウントのレビューを差し替えた集計行（件数は変わらない）
    pub fn with_replaced_review(&self, old_score: f64, new_score: f64) -> Self {
        Self::new(
            &self.restaurant_id,
            self.total_score - old_score + new_score,
            self.review_count,
        )
    }

    /// レビューを1件取り除いた集計行
    ///
    /// # Returns
    /// * `Some(AggregateRanking)` - レビューが残っている場合
    /// * `None` - 最後のレビューを取り除いた場合（集計行は削除すべき）
    pub fn without_review(&self, score: f64) -> Option<Self> {
        if self.review_count <= 1 {
            return None;
        }

        Some(Self::new(
            &self.restaurant_id,
            self.total_score - score,
            self.review_count - 1,
        ))
    }

    pub fn key(&self) -> RankingKey {
        RankingKey::aggregate(&self.restaurant_id)
    }

    /// 応答用の平均スコア（小数第1位で切り捨て）
    pub fn truncated_average(&self) -> f64 {
        truncate_to_one_decimal(self.average_score)
    }
}

/// 小数第1位で0方向へ切り捨てる
///
/// `value * 10.0`の切り捨てでは`0.3`のような値が表現誤差で`0.2`に落ちるため、
/// 最短の10進表現の文字列を桁で切る。
pub fn truncate_to_one_decimal(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }

    // f64のDisplayは指数表記を使わない
    let repr = value.to_string();
    let truncated = match repr.split_once('.') {
        Some((integer, fraction)) => {
            let first_digit = fraction.chars().next().unwrap_or('0');
            format!("{integer}.{first_digit}")
        }
        None => repr,
    };

    truncated.parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== 集計計算 ====================

    #[test]
    fn test_for_first_review() {
        let aggregate = AggregateRanking::for_first_review("r1", 8.0);
        assert_eq!(aggregate.restaurant_id, "r1");
        assert_eq!(aggregate.review_count, 1);
        assert_eq!(aggregate.total_score, 8.0);
        assert_eq!(aggregate.average_score, 8.0);
    }

    #[test]
    fn test_with_new_review() {
        let aggregate = AggregateRanking::new("r1", 50.0, 10).with_new_review(6.0);
        assert_eq!(aggregate.review_count, 11);
        assert_eq!(aggregate.total_score, 56.0);
        assert!((aggregate.average_score - 56.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_with_replaced_review_keeps_count() {
        let aggregate = AggregateRanking::new("r1", 15.0, 3).with_replaced_review(4.0, 7.0);
        assert_eq!(aggregate.review_count, 3);
        assert_eq!(aggregate.total_score, 18.0);
        assert_eq!(aggregate.average_score, 6.0);
    }

    #[test]
    fn test_without_review() {
        let aggregate = AggregateRanking::new("r1", 15.0, 3)
            .without_review(5.0)
            .unwrap();
        assert_eq!(aggregate.review_count, 2);
        assert_eq!(aggregate.total_score, 10.0);
        assert_eq!(aggregate.average_score, 5.0);
    }

    #[test]
    fn test_without_last_review_removes_aggregate() {
        let aggregate = AggregateRanking::for_first_review("r1", 5.0);
        assert!(aggregate.without_review(5.0).is_none());
    }

    #[test]
    fn test_new_with_zero_count_has_zero_average() {
        let aggregate = AggregateRanking::new("r1", 0.0, 0);
        assert_eq!(aggregate.average_score, 0.0);
    }

    #[test]
    fn test_key_points_to_aggregate_row() {
        let aggregate = AggregateRanking::for_first_review("r1", 5.0);
        assert_eq!(aggregate.key(), RankingKey::aggregate("r1"));
    }

    // ==================== 切り捨て ====================

    #[test]
    fn test_truncate_to_one_decimal() {
        assert_eq!(truncate_to_one_decimal(7.06), 7.0);
        assert_eq!(truncate_to_one_decimal(7.19), 7.1);
        assert_eq!(truncate_to_one_decimal(6.666666666666667), 6.6);
        assert_eq!(truncate_to_one_decimal(5.0), 5.0);
        assert_eq!(truncate_to_one_decimal(9.99), 9.9);
    }

    #[test]
    fn test_truncate_does_not_round_up_representation_error() {
        // 0.3 * 10 = 2.9999999999999996 となるケース
        assert_eq!(truncate_to_one_decimal(0.3), 0.3);
        assert_eq!(truncate_to_one_decimal(2.3), 2.3);
    }

    #[test]
    fn test_truncate_toward_zero_for_negative() {
        assert_eq!(truncate_to_one_decimal(-1.25), -1.2);
    }

    #[test]
    fn test_truncated_average() {
        let aggregate = AggregateRanking::new("r1", 20.0, 3);
        assert_eq!(aggregate.truncated_average(), 6.6);
    }
}
