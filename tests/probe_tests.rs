use axum::{Router, http::StatusCode, routing::get};
use dbstrap::BootstrapError;
use dbstrap::config::{DbConfig, DbUrl, ProbeConfig, SslPaths};
use dbstrap::db::{ConnectionState, DbModule, HostProbe, HttpProbe, PgDriver};
use dbstrap::error::IsRetryable;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

async fn spawn_test_server(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    port
}

fn http_probe(port: u16) -> HttpProbe {
    HttpProbe::new(&ProbeConfig {
        port,
        scheme: "http".to_string(),
        timeout_secs: 2,
    })
}

#[tokio::test]
async fn status_200_counts_as_responding() {
    let app = Router::new().route("/", get(|| async { "{\"role\": \"master\"}" }));
    let port = spawn_test_server(app).await;

    assert!(http_probe(port).is_responding("127.0.0.1", None).await);
}

#[tokio::test]
async fn non_200_status_is_not_responding() {
    let app = Router::new().route(
        "/",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "{\"role\": \"replica\"}") }),
    );
    let port = spawn_test_server(app).await;

    assert!(!http_probe(port).is_responding("127.0.0.1", None).await);
}

#[tokio::test]
async fn refused_connection_is_not_responding() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    assert!(!http_probe(port).is_responding("127.0.0.1", None).await);
}

#[test]
fn default_probe_targets_management_port_over_https() {
    let cfg = ProbeConfig::default();
    assert_eq!(cfg.port, 8008);
    assert_eq!(cfg.scheme, "https");
}

#[tokio::test]
async fn malformed_ca_rejects_init_as_configuration_error() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("dbstrap-bad-ca-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let ca = dir.join("ca.pem");
    std::fs::write(
        &ca,
        "-----BEGIN CERTIFICATE-----\nnot-a-certificate\n-----END CERTIFICATE-----\n",
    )
    .expect("write ca");

    let mut cfg = DbConfig {
        url: DbUrl::Candidates(vec![
            "postgres://db-1.invalid/app".to_string(),
            "postgres://db-2.invalid/app".to_string(),
        ]),
        ..Default::default()
    };
    cfg.options.ssl = Some(SslPaths {
        ca,
        cert: None,
        key: None,
    });

    let module = DbModule::builder(cfg, PgDriver)
        .spawn()
        .await
        .expect("spawn bootstrap actor");
    let err = tokio::time::timeout(Duration::from_secs(10), module.init())
        .await
        .expect("init must not keep selecting hosts")
        .expect_err("malformed CA must be fatal");

    assert!(matches!(err, BootstrapError::ProbeClient(_)), "got {err:?}");
    assert!(err.is_configuration());
    assert!(!err.is_retryable());
    assert!(module.connection().is_none());
    assert_eq!(module.status().await.unwrap().state, ConnectionState::Idle);

    module.shutdown().await;
    let _ = std::fs::remove_dir_all(dir);
}
