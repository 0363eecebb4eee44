//! Order hub configuration
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | `HTTP_PORT` | 8080 | HTTP / WebSocket 端口 |
//! | `ENVIRONMENT` | development | development / staging / production |
//! | `DATABASE_URL` | - | PostgreSQL；未设置时使用内存存储 |
//! | `CATALOG_SEED_PATH` | - | 内存模式下的菜单种子 JSON |
//! | `JWT_SECRET` | 开发环境自动生成 | 员工 JWT 签名密钥（非开发环境必填） |
//! | `DECLINED_ITEMS` | exclude | 拒单菜品策略：exclude / block |
//! | `LIVE_CHANNEL_CAPACITY` | 256 | 每个推送主题的缓冲区大小 |
//! | `LOG_LEVEL` | order_hub=info,tower_http=info | tracing EnvFilter |
//! | `LOG_FORMAT` | text | text / json |
//! | `LOG_DIR` | - | 设置后按天滚动写入日志文件 |

use crate::lifecycle::DeclinedItemPolicy;
use crate::live::DEFAULT_CHANNEL_CAPACITY;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const DEFAULT_LOG_FILTER: &str = "order_hub=info,tower_http=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// PostgreSQL connection URL; in-memory store when absent
    pub database_url: Option<String>,
    /// JSON catalog seed for the in-memory catalog
    pub catalog_seed_path: Option<String>,
    /// JWT secret for staff authentication
    pub jwt_secret: String,
    pub declined_items: DeclinedItemPolicy,
    pub live_channel_capacity: usize,
    pub log_filter: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn optional(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|s| !s.trim().is_empty())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let declined_items = match Self::optional("DECLINED_ITEMS") {
            Some(raw) => raw.parse()?,
            None => DeclinedItemPolicy::default(),
        };

        let live_channel_capacity = match Self::optional("LIVE_CHANNEL_CAPACITY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| format!("LIVE_CHANNEL_CAPACITY must be a positive integer, got {raw}"))?,
            None => DEFAULT_CHANNEL_CAPACITY,
        };

        Ok(Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            database_url: Self::optional("DATABASE_URL"),
            catalog_seed_path: Self::optional("CATALOG_SEED_PATH"),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            declined_items,
            live_channel_capacity,
            log_filter: Self::optional("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
            log_json: Self::optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            log_dir: Self::optional("LOG_DIR"),
        })
    }

    /// Development defaults, used by tests
    pub fn development(jwt_secret: impl Into<String>) -> Self {
        Self {
            http_port: 8080,
            environment: "development".into(),
            database_url: None,
            catalog_seed_path: None,
            jwt_secret: jwt_secret.into(),
            declined_items: DeclinedItemPolicy::default(),
            live_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.into(),
            log_json: false,
            log_dir: None,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
