use anyhow::Context;
use freespot_console::{Console, print_banner, setup_environment};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志)
    let config = setup_environment().context("Invalid configuration")?;

    print_banner();
    tracing::info!(api = %config.client.base_url, "FreeSpot console starting...");

    // 2. 组装客户端
    let console = Console::new(config).context("Failed to build API client")?;

    // 3. Ctrl-C 触发关闭
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received"),
            Err(e) => tracing::error!("Listening for Ctrl-C failed: {e}"),
        }
        signal.cancel();
    });

    // 4. 运行直到关闭
    console.run(shutdown).await?;
    tracing::info!("FreeSpot console stopped");
    Ok(())
}
