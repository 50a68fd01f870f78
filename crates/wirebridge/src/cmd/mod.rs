use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a demo echo dispatcher on a socket.
    Serve(ServeArgs),
    /// Send one RPC request and print the response.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Unix socket path to bind (ignored with --tcp).
    pub path: PathBuf,
    /// Bind a TCP listener on this address instead, e.g. 127.0.0.1:6001.
    #[arg(long, value_name = "ADDR")]
    pub tcp: Option<String>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Unix socket path to connect to (ignored with --tcp).
    pub path: PathBuf,
    /// Connect over TCP to this address instead.
    #[arg(long, value_name = "ADDR")]
    pub tcp: Option<String>,
    /// Service method name.
    #[arg(long, short = 'm')]
    pub method: String,
    /// JSON body (sent under the JSON codec).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string body (sent under the raw codec).
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read a raw body from a file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
