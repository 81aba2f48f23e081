//! Command server tests over a loopback socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pantilt_common::command::Response;
use pantilt_common::consts::MAX_COMMAND_LINE_BYTES;
use pantilt_common::position::PanTilt;
use pantilt_control::server::CommandServer;
use pantilt_control::state::SharedPosition;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Response {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("response in time")
            .unwrap()
            .expect("connection open");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, raw: &str) -> Response {
        self.send(raw).await;
        self.recv().await
    }
}

async fn start(shared: Arc<SharedPosition>) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    let server = CommandServer::bind("127.0.0.1:0", shared).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = stop_rx.await;
    }));
    (addr, stop_tx, task)
}

#[tokio::test]
async fn command_sets_target_and_reports_current() {
    let shared = Arc::new(SharedPosition::default());
    shared.write_current(PanTilt::new(1.0, -1.0));
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;

    let mut client = Client::connect(addr).await;
    let response = client.request(r#"{"pan": 45, "tilt": 10}"#).await;

    assert_eq!(response, Response::ok(PanTilt::new(1.0, -1.0)));
    assert_eq!(shared.read_target(), PanTilt::new(45.0, 10.0));
}

#[tokio::test]
async fn malformed_line_keeps_connection_open() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;
    let mut client = Client::connect(addr).await;

    match client.request("{not json").await {
        Response::Error { message } => assert!(!message.is_empty()),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(matches!(
        client.request(r#"{"pan": "left"}"#).await,
        Response::Error { .. }
    ));

    let response = client.request(r#"{"tilt": -15}"#).await;
    assert!(matches!(response, Response::Ok { .. }));
    assert_eq!(shared.read_target(), PanTilt::new(0.0, -15.0));
}

#[tokio::test]
async fn invalid_utf8_gets_error_and_connection_stays_open() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;
    let mut client = Client::connect(addr).await;

    client.writer.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();
    match client.recv().await {
        Response::Error { message } => assert!(message.contains("UTF-8"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }

    let response = client.request(r#"{"pan": 10}"#).await;
    assert!(matches!(response, Response::Ok { .. }));
    assert_eq!(shared.read_target().pan, 10.0);
}

#[tokio::test]
async fn oversized_line_is_rejected_and_skipped() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;
    let mut client = Client::connect(addr).await;

    // A valid command padded past the limit must not be applied.
    let mut line = String::from(r#"{"pan": 70, "pad": ""#);
    line.push_str(&"x".repeat(MAX_COMMAND_LINE_BYTES));
    line.push_str(r#""}"#);
    client.send(&line).await;
    match client.recv().await {
        Response::Error { message } => assert!(message.contains("exceeds"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(shared.read_target().pan, 0.0);

    let response = client.request(r#"{"tilt": 5}"#).await;
    assert!(matches!(response, Response::Ok { .. }));
    assert_eq!(shared.read_target(), PanTilt::new(0.0, 5.0));
}

#[tokio::test]
async fn blank_lines_get_no_response() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;
    let mut client = Client::connect(addr).await;

    client.send("").await;
    client.send("   ").await;
    client.send(r#"{"pan": 5}"#).await;

    // The first line back answers the only real command.
    assert!(matches!(client.recv().await, Response::Ok { .. }));
    assert_eq!(shared.read_target().pan, 5.0);
}

#[tokio::test]
async fn one_response_per_line_in_order() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;
    let mut client = Client::connect(addr).await;

    client
        .writer
        .write_all(b"{\"pan\": 1}\nbad\n{}\n")
        .await
        .unwrap();

    assert!(matches!(client.recv().await, Response::Ok { .. }));
    assert!(matches!(client.recv().await, Response::Error { .. }));
    assert!(matches!(client.recv().await, Response::Ok { .. }));
}

#[tokio::test]
async fn concurrent_clients_share_state() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, _stop, _task) = start(Arc::clone(&shared)).await;

    let mut pan_client = Client::connect(addr).await;
    let mut tilt_client = Client::connect(addr).await;

    pan_client.request(r#"{"pan": 20}"#).await;
    tilt_client.request(r#"{"tilt": -20}"#).await;

    assert_eq!(shared.read_target(), PanTilt::new(20.0, -20.0));

    // A disconnect does not affect the other connection.
    drop(pan_client);
    let response = tilt_client.request("{}").await;
    assert!(matches!(response, Response::Ok { .. }));
}

#[tokio::test]
async fn serve_returns_on_shutdown() {
    let shared = Arc::new(SharedPosition::default());
    let (_addr, stop, task) = start(shared).await;

    stop.send(()).unwrap();
    timeout(Duration::from_secs(5), task)
        .await
        .expect("server stopped")
        .unwrap();
}

#[tokio::test]
async fn shutdown_closes_open_connections() {
    let shared = Arc::new(SharedPosition::default());
    let (addr, stop, task) = start(shared).await;
    let mut client = Client::connect(addr).await;
    assert!(matches!(client.request("{}").await, Response::Ok { .. }));

    stop.send(()).unwrap();
    timeout(Duration::from_secs(5), task)
        .await
        .expect("server stopped")
        .unwrap();

    let next = timeout(Duration::from_secs(5), client.lines.next_line())
        .await
        .expect("connection closed in time");
    assert!(!matches!(next, Ok(Some(_))), "unexpected line: {next:?}");
}
