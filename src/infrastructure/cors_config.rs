/// CORS設定
///
/// 許可するオリジンは環境変数`ALLOWED_ORIGINS`にカンマ区切りで指定する。
/// 未設定の場合はどのオリジンにも`Access-Control-Allow-Origin`を返さない。

/// 許可オリジンの環境変数
pub const ALLOWED_ORIGINS_ENV: &str = "ALLOWED_ORIGINS";

/// `Access-Control-Allow-Methods`の値
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// `Access-Control-Allow-Headers`の値
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// 環境変数から許可オリジンを読み込む
    pub fn from_env() -> Self {
        std::env::var(ALLOWED_ORIGINS_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// カンマ区切りのオリジン一覧を解析（空要素は無視）
    pub fn parse(value: &str) -> Self {
        Self::new(
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// リクエストのオリジンが許可されていれば、応答に載せるオリジンを返す
    ///
    /// 比較は大文字小文字を区別しない。
    pub fn matching_origin(&self, origin: &str) -> Option<&str> {
        self.allowed_origins
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(origin.trim()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_origins() {
        let config = CorsConfig::parse("https://fryrank.app, http://localhost:3000,,");
        assert_eq!(
            config.allowed_origins(),
            &["https://fryrank.app".to_string(), "http://localhost:3000".to_string()]
        );
    }

    #[test]
    fn test_matching_origin_is_case_insensitive() {
        let config = CorsConfig::parse("https://fryrank.app");
        assert_eq!(
            config.matching_origin("HTTPS://FryRank.app"),
            Some("https://fryrank.app")
        );
        assert_eq!(config.matching_origin("https://evil.example"), None);
    }

    #[test]
    fn test_default_allows_nothing() {
        assert_eq!(CorsConfig::default().matching_origin("https://fryrank.app"), None);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe { std::env::set_var(ALLOWED_ORIGINS_ENV, "https://fryrank.app") };
        let config = CorsConfig::from_env();
        unsafe { std::env::remove_var(ALLOWED_ORIGINS_ENV) };

        assert_eq!(config.allowed_origins(), &["https://fryrank.app".to_string()]);
    }

    #[test]
    #[serial]
    fn test_from_env_unset() {
        unsafe { std::env::remove_var(ALLOWED_ORIGINS_ENV) };
        assert!(CorsConfig::from_env().allowed_origins().is_empty());
    }
}
