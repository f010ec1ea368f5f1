//! StarRocks MCP Server
//!
//! A Model Context Protocol (MCP) server for StarRocks databases. It lets an
//! AI agent query a StarRocks cluster through a small fixed tool catalog
//! using JSON-RPC 2.0 over stdio.
//!
//! # Features
//!
//! - SELECT queries via `read-query`
//! - Schema inspection via `list-tables` and `describe-table`
//! - Writes and table creation via `write-query` and `create-table`,
//!   disabled entirely in read-only mode

mod config;
mod db;
mod error;
mod rpc;
mod server;
mod tools;

use clap::Parser;
use config::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the JSON-RPC stream.
    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .init();

    server::run(args).await
}
