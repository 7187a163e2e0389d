use clap::Parser;

use crate::cli::HttpCommand;

/// 基于 Haar 小波签名的相似图片搜索服务
#[derive(Parser)]
#[command(name = "iqdb", version, about)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(clap::Subcommand)]
pub enum SubCommand {
    /// 启动 HTTP 服务器
    Http(HttpCommand),
}
