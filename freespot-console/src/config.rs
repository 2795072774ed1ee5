use std::time::Duration;

use freespot_client::ClientConfig;
use shared::models::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use shared::DetectionStart;
use thiserror::Error;

/// 控制台配置错误
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Client error: {0}")]
    Client(#[from] freespot_client::ClientError),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// 控制台配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | FREESPOT_API_URL | http://localhost:8000 | 检测后端地址 |
/// | FREESPOT_REQUEST_TIMEOUT_SECS | 30 | REST 请求超时(秒) |
/// | LOG_LEVEL | info | 日志级别 (RUST_LOG 优先) |
/// | LOG_DIR | - | 日志目录, 存在时按天滚动写文件 |
/// | FLOOR_REFRESH_SECS | 60 | 楼层/桌台列表刷新间隔 |
/// | PERSIST_STATUS | false | 把检测得到的桌台状态写回后端 |
/// | AUTO_START_DETECTION | false | 加载楼层后请求后端启动检测 |
/// | CANVAS_WIDTH / CANVAS_HEIGHT | 1280 / 720 | 启动检测时上报的画布尺寸 |
#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientConfig,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 0 关闭定时刷新
    pub floor_refresh: Duration,
    pub persist_status: bool,
    pub auto_start_detection: bool,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Config {
    /// 从环境变量加载配置 (调用方负责先加载 .env)
    pub fn from_env() -> ConsoleResult<Self> {
        Ok(Self {
            client: ClientConfig::from_env()?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            floor_refresh: Duration::from_secs(parse_var("FLOOR_REFRESH_SECS", 60)?),
            persist_status: parse_var("PERSIST_STATUS", false)?,
            auto_start_detection: parse_var("AUTO_START_DETECTION", false)?,
            canvas_width: parse_var("CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH)?,
            canvas_height: parse_var("CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT)?,
        })
    }

    /// 指定后端地址, 其余取默认值
    ///
    /// 常用于测试场景
    pub fn with_api_url(url: impl AsRef<str>) -> Self {
        Self {
            client: ClientConfig::new(url),
            ..Self::default()
        }
    }

    pub fn with_persist_status(mut self, persist: bool) -> Self {
        self.persist_status = persist;
        self
    }

    pub fn with_floor_refresh(mut self, every: Duration) -> Self {
        self.floor_refresh = every;
        self
    }

    /// 启动检测请求体
    pub fn detection_start(&self) -> DetectionStart {
        DetectionStart {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            log_level: "info".into(),
            log_dir: None,
            floor_refresh: Duration::from_secs(60),
            persist_status: false,
            auto_start_detection: false,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> ConsoleResult<T> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConsoleError::InvalidValue { key, value }),
        _ => Ok(default),
    }
}
