use std::path::PathBuf;

use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio::signal;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::db::init_db;
use crate::{IQDB, server};

#[derive(Parser, Debug, Clone)]
pub struct HttpCommand {
    /// 监听地址
    #[arg(default_value = "127.0.0.1")]
    pub host: String,
    /// 监听端口
    #[arg(default_value_t = 5588)]
    pub port: u16,
    /// SQLite 数据库文件
    #[arg(default_value = "iqdb.db")]
    pub dbfile: PathBuf,
}

impl SubCommandExtend for HttpCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let db = init_db(&self.dbfile).await?;
        let iqdb = IQDB::open(db).await?;

        // 创建应用状态
        let state = server::AppState::new(iqdb);

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        let addr = format!("{}:{}", self.host, self.port);
        info!("starting server at http://{}", addr);
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

        info!("服务器已退出");
        Ok(())
    }
}

/// 等待 SIGINT / SIGTERM，收到后通知服务循环优雅停机
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("收到退出信号，正在停止服务器……");
}
