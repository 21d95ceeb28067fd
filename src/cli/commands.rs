use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "courier-chain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start", about = "Start a node and open the operator console")]
    Start(StartArgs),
    #[command(name = "ping", about = "Check that a remote node answers")]
    Ping {
        #[arg(help = "Remote node address, e.g. 127.0.0.1:5000")]
        addr: String,
    },
    #[command(name = "chain", about = "Print the chain held by a remote node")]
    Chain {
        #[arg(help = "Remote node address, e.g. 127.0.0.1:5000")]
        addr: String,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct StartArgs {
    #[arg(long = "config", help = "TOML settings file")]
    pub config: Option<PathBuf>,
    #[arg(long = "listen", help = "Address to bind, e.g. 0.0.0.0:5000")]
    pub listen: Option<String>,
    #[arg(
        long = "port",
        conflicts_with = "listen",
        help = "Port to bind on 127.0.0.1"
    )]
    pub port: Option<u16>,
    #[arg(long = "advertise", help = "Address announced to peers")]
    pub advertise: Option<String>,
    #[arg(
        long = "bootstrap",
        num_args = 1..,
        help = "Peers contacted at startup"
    )]
    pub bootstrap: Vec<String>,
    #[arg(long = "difficulty", help = "Required leading zeros, e.g. 000")]
    pub difficulty: Option<String>,
}

impl StartArgs {
    /// Command-line flags take precedence over file and environment
    pub fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(port) = self.port {
            config.listen_addr = format!("127.0.0.1:{port}");
        }
        if let Some(advertise) = &self.advertise {
            config.advertised_addr = Some(advertise.clone());
        }
        if !self.bootstrap.is_empty() {
            config.bootstrap_peers = self.bootstrap.clone();
        }
        if let Some(difficulty) = &self.difficulty {
            config.difficulty = difficulty.clone();
        }
    }
}
