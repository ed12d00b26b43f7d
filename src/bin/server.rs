//! Git S3 Gateway Server
//!
//! S3-compatible HTTP server backed by GitHub repository contents

use anyhow::Context;
use clap::Parser;
use git_s3_gateway::{
    Gateway, GatewayConfig, GitHubClient, GitHubConfig, DEFAULT_API_URL, DEFAULT_DELETE_BRANCH,
    DEFAULT_MAX_BODY_SIZE,
};
use hyper::body::Incoming;
use hyper::Request;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "git-s3-gateway")]
#[command(about = "S3-compatible HTTP server backed by GitHub repositories")]
struct Args {
    /// Bind address
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port number
    #[arg(short = 'P', long, env = "PORT", default_value = "3000")]
    port: u16,

    /// GitHub token (unauthenticated requests are heavily rate limited)
    #[arg(long, env = "TOKEN_GITHUB", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API base URL (set for GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Branch that delete commits target
    #[arg(long, env = "DELETE_BRANCH", default_value = DEFAULT_DELETE_BRANCH)]
    delete_branch: String,

    /// Maximum accepted request body in bytes
    #[arg(long, env = "MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_BODY_SIZE)]
    max_body_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting Git S3 Gateway");
    info!("GitHub API: {}", args.api_url);
    if args.token.is_none() {
        warn!("TOKEN_GITHUB is not set; requests to GitHub are unauthenticated");
    }

    let client = GitHubClient::new(&GitHubConfig {
        api_url: args.api_url.clone(),
        token: args.token.clone(),
    })
    .context("failed to build GitHub client")?;

    let gateway = Arc::new(Gateway::new(
        Arc::new(client),
        GatewayConfig {
            token_configured: args.token.is_some(),
            delete_branch: args.delete_branch.clone(),
            max_body_size: args.max_body_size,
        },
    ));

    let service = ServiceBuilder::new()
        .layer(CorsLayer::permissive())
        .service_fn(move |req: Request<Incoming>| {
            let gateway = gateway.clone();
            async move { Ok::<_, Infallible>(gateway.handle(req).await) }
        });
    let service = TowerToHyperService::new(service);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.host, args.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let local_addr = listener.local_addr()?;

    let http_server = ConnBuilder::new(TokioExecutor::new());

    info!("Server is running on http://{}", local_addr);
    info!(
        "Use with: aws --endpoint-url=http://{}/s3 s3 ls s3://owner@repo",
        local_addr
    );

    loop {
        // Accept connection or wait for Ctrl+C
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((socket, peer)) => {
                        debug!(%peer, "Accepted connection");
                        let service_clone = service.clone();
                        let http_server_clone = http_server.clone();
                        tokio::spawn(async move {
                            let conn = http_server_clone.serve_connection(TokioIo::new(socket), service_clone);
                            if let Err(e) = conn.await {
                                warn!(%peer, "Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Server stopped");

    Ok(())
}
