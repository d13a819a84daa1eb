//! Demo client dialing through the grpcwrap connection factory.
//!
//! Reads a JSON config from the first argument, or builds one from
//! `SERVER_ADDR` (default `127.0.0.1:9102`).
//!
//! Usage:
//!   cargo run --bin greeter-server
//!   cargo run --bin greeter-client
//!   cargo run --bin greeter-client -- '{"address": "127.0.0.1:9102", "log_level": 1}'

use std::env;
use std::time::Duration;

use grpcwrap::{CallOptions, ClientConfig, ClientOptions, Code, connect_with_options};
use grpcwrap_examples::{HelloReply, HelloRequest, SAY_HELLO};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,grpcwrap=debug".into()),
        )
        .init();

    let config: ClientConfig = match env::args().nth(1) {
        Some(raw) => serde_json::from_str(&raw)?,
        None => ClientConfig::new(
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:9102".to_string()),
        ),
    };

    println!("=== grpcwrap greeter client ===");
    println!("Config: {config:?}");
    println!();

    let conn = connect_with_options(&config, ClientOptions::new()).await?;
    println!("Dialed {} (resolved {:?})", conn.target(), conn.resolved().hosts());
    println!("Interceptors: {:?}", conn.interceptors());
    println!();

    // Test 1: transient failures are retried with 1s, 2s backoff
    println!("Test 1: Unary call through warm-up failures...");
    {
        let reply: HelloReply = conn
            .call_unary(SAY_HELLO, &HelloRequest { name: "Alice".into() })
            .await?;
        assert_eq!(reply.message, "Hello, Alice!");
        println!("  PASS: Response message = {:?}", reply.message);
    }

    // Test 2: terminal errors surface at once
    println!("Test 2: Unary call with empty name...");
    {
        let err = conn
            .call_unary::<_, HelloReply>(SAY_HELLO, &HelloRequest::default())
            .await
            .expect_err("empty name must be rejected");
        assert_eq!(err.code(), Code::InvalidArgument);
        println!("  PASS: Error = {err}");
    }

    // Test 3: per-call timeout and metadata
    println!("Test 3: Unary call with timeout and header...");
    {
        let options = CallOptions::new()
            .timeout(Duration::from_secs(5))
            .header("x-request-id", "greeter-client-3");
        let reply: HelloReply = conn
            .call_unary_with_options(SAY_HELLO, &HelloRequest { name: "Bob".into() }, options)
            .await?;
        assert_eq!(reply.message, "Hello, Bob!");
        println!("  PASS: Response message = {:?}", reply.message);
    }

    conn.close();
    println!();
    println!("All tests passed");
    Ok(())
}
