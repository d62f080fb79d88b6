use assistant_relay::init_logging::init_logging;
use assistant_relay::{Relay, RelayConfig};
use conf::Conf;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Conf, Debug)]
struct Config {
    /// If true, just validate config and don't start
    #[conf(long)]
    dry_run: bool,
    /// Socket to listen for HTTP requests (GET /health, POST /assist)
    #[conf(long, env, default_value = "127.0.0.1:8087")]
    http_listen_addr: SocketAddr,
    #[conf(flatten)]
    relay: RelayConfig,
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = Config::parse();

    info!("Config = {config:#?}");

    if config.dry_run {
        return;
    }

    let token = CancellationToken::new();

    // A credential failure here is fatal: without it no conversation can
    // ever succeed, so the relay must not come up at all.
    let relay = match Relay::new(config.relay, token.clone()) {
        Ok(relay) => Arc::new(relay),
        Err(err) => {
            error!("Could not initialize relay: {err}");
            std::process::exit(1);
        }
    };

    let listener = TcpListener::bind(config.http_listen_addr).await.unwrap();
    info!("Listening for http on {}", config.http_listen_addr);

    // Listen for ctrl-c
    let thread_token = token.clone();
    tokio::task::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        warn!("ctrl-c: Stop requested");
        thread_token.cancel();
    });

    let _http_task = start_http_task(listener, relay.clone());

    // Block until the token is canceled.
    relay.run().await;
}

fn start_http_task(listener: TcpListener, relay: Arc<Relay>) -> tokio::task::JoinHandle<()> {
    // Loop waiting for incoming http connections, and pass them to the relay
    tokio::task::spawn(async move {
        loop {
            let Ok((stream, remote_addr)) = listener
                .accept()
                .await
                .inspect_err(|err| error!("Error accepting connection: {err}"))
            else {
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            };
            info!("New connection from: {}", remote_addr);

            // Spawn a new task to handle each connection
            let thread_relay = relay.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                // Serve the connection using auto protocol detection (HTTP/1 or HTTP/2)
                if let Err(err) = auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                    .serve_connection(
                        io,
                        service_fn(|req| {
                            let thread_relay = thread_relay.clone();
                            async move { thread_relay.handle_http_request(req).await }
                        }),
                    )
                    .await
                {
                    error!("Error serving connection: {err}");
                }
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_defaults() {
        let config =
            Config::try_parse_from::<&str, &str, &str>(["assistant-relay"], vec![]).unwrap();

        assert!(!config.dry_run);
        assert_eq!(
            config.http_listen_addr,
            "127.0.0.1:8087".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.relay.credentials, PathBuf::from("credentials.json"));
        assert_eq!(config.relay.device_model_id, "test_device_model_id");
        assert_eq!(config.relay.device_id, "test_device_id");
        assert_eq!(config.relay.language, "en-US");
        assert_eq!(config.relay.grpc_deadline, 10);
        assert!(!config.relay.display);
        assert!(config.relay.events.is_none());
    }

    #[test]
    fn test_hub_api_can_be_configured() {
        let config = Config::try_parse_from::<&str, &str, &str>(
            [
                "assistant-relay",
                "--hub-api-url",
                "http://hub.local:8123/",
            ],
            vec![],
        )
        .unwrap();

        let events = config.relay.events.expect("events group should be present");
        assert_eq!(events.hub_api_url.as_str(), "http://hub.local:8123/");
        assert!(events.hub_token_file.is_none());
    }
}
