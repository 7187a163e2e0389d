use clap::Parser;

use iqdb::cli::SubCommandExtend;
use iqdb::config::{Opts, SubCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Http(config) => config.run(&opts).await,
    }
}
