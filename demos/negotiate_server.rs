// demos/negotiate_server.rs

//! A hyper server that greets each client by its Windows account name.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=winauth=debug cargo run --example negotiate_server -- 0.0.0.0:8080
//! ```
//!
//! Then, from a domain-joined machine:
//!
//! ```bash
//! curl --negotiate -u : http://web.contoso.com:8080/
//! ```

#[cfg(windows)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use hyper_util::rt::TokioIo;
    use hyper_util::service::TowerToHyperService;
    use tokio::net::TcpListener;
    use tower::{service_fn, Layer};
    use winauth::auth::{CredentialCache, NegotiateConfig, NegotiateLayer, Sspi};

    env_logger::init();

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()?;

    let sspi = Sspi::native();
    let installed = sspi.packages()?;
    let config = NegotiateConfig::new().retain_available(&installed);
    println!("Offering: {:?}", config.offered_packages());

    let cache = Arc::new(CredentialCache::new(sspi, config.credentials().clone()));
    let layer = NegotiateLayer::new(cache, config);

    let listener = TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        // One service, and so one handshake, per connection.
        let service = TowerToHyperService::new(layer.layer(service_fn(whoami)));

        tokio::spawn(async move {
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                log::warn!("connection from {} failed: {}", peer, e);
            }
        });
    }
}

#[cfg(windows)]
async fn whoami(
    req: http::Request<hyper::body::Incoming>,
) -> Result<http::Response<String>, std::convert::Infallible> {
    use std::sync::Arc;
    use winauth::auth::AuthenticatedIdentity;

    let body = match req.extensions().get::<Arc<AuthenticatedIdentity>>() {
        Some(identity) => format!(
            "Hello, {} (authenticated with {})\n",
            identity.name(),
            identity.package()
        ),
        None => "Hello, stranger\n".to_string(),
    };

    Ok(http::Response::new(body))
}

#[cfg(not(windows))]
fn main() {
    eprintln!("negotiate_server needs the Windows SSPI facility");
}
