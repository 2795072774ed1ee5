//! FreeSpot Console - 餐桌占用实时看板 (无界面版)
//!
//! # 架构概述
//!
//! - **配置** (`config`): 环境变量 + `.env`
//! - **日志** (`logger`): tracing fmt, 可选按天滚动文件
//! - **后台任务** (`tasks`): 统一注册、panic 捕获、优雅关闭
//! - **看板** (`board`): 楼层/桌台副本, 由检测帧更新
//! - **主流程** (`app`): 健康检查 → 加载楼层 → 每层一条检测流 → 更新看板
//!
//! ```text
//! freespot-console/src/
//! ├── app.rs      # Console::run
//! ├── board.rs    # OccupancyBoard
//! ├── config.rs   # Config, ConsoleError
//! ├── logger.rs
//! └── tasks.rs    # BackgroundTasks
//! ```

pub mod app;
pub mod board;
pub mod config;
pub mod logger;
pub mod tasks;

pub use app::Console;
pub use board::{BoardSummary, FloorSnapshot, OccupancyBoard, StatusChange};
pub use config::{Config, ConsoleError, ConsoleResult};
pub use logger::{init_logger, init_logger_with_file};
pub use tasks::{BackgroundTasks, TaskKind};

/// 加载 `.env` 并初始化日志, 返回配置
pub fn setup_environment() -> ConsoleResult<Config> {
    // .env 不存在不算错误
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {e}");
    }
    let config = Config::from_env()?;
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    ______                _____             __
   / ____/_______  ___   / ___/____  ____  / /_
  / /_  / ___/ _ \/ _ \  \__ \/ __ \/ __ \/ __/
 / __/ / /  /  __/  __/ ___/ / /_/ / /_/ / /_
/_/   /_/   \___/\___/ /____/ .___/\____/\__/
                           /_/
    "#
    );
}
