use auction_service::oracle::{serve, serve_connection, OracleService};
use auction_service::protocol::{RecommenderEvent, RecommenderProtocol, RecordingObserver};
use auction_service::recommender::wire::{RpcRequest, RpcResponse};
use auction_service::recommender::{
    Interaction, MockInteractions, Recommendation, RecommenderClient, RecommenderConfig, RecommenderError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

fn client_for(port: u16) -> RecommenderClient {
    RecommenderClient::new(RecommenderConfig {
        host: "127.0.0.1".to_string(),
        port,
        timeout: Duration::from_secs(2),
    })
}

fn observed_client(port: u16) -> (RecommenderClient, Arc<RecordingObserver<RecommenderProtocol>>) {
    let observer = Arc::new(RecordingObserver::new());
    (client_for(port).with_observer(observer.clone()), observer)
}

async fn start_oracle() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(serve(listener, Arc::new(OracleService::new(&MockInteractions))));
    port
}

/// Hangs up on the first `drops` connections, then behaves like the real oracle.
async fn start_flaky_oracle(drops: usize) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    let service = Arc::new(OracleService::new(&MockInteractions));

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            if counter.fetch_add(1, Ordering::SeqCst) < drops {
                drop(stream);
                continue;
            }
            tokio::spawn(serve_connection(stream, service.clone()));
        }
    });
    (port, accepted)
}

/// Answers every request with whatever `reply` makes of it.
async fn start_scripted_oracle(reply: fn(&RpcRequest) -> RpcResponse) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let request: RpcRequest = serde_json::from_str(&line).unwrap();
                    let mut frame = serde_json::to_vec(&reply(&request)).unwrap();
                    frame.push(b'\n');
                    if writer.write_all(&frame).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    port
}

/// Answers one request per connection, then hangs up.
async fn start_one_shot_oracle() -> (u16, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let answered = Arc::new(AtomicUsize::new(0));
    let (accepted_count, answered_count) = (accepted.clone(), answered.clone());
    let service = Arc::new(OracleService::new(&MockInteractions));

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            accepted_count.fetch_add(1, Ordering::SeqCst);
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            if let Ok(Some(line)) = lines.next_line().await {
                let request: RpcRequest = serde_json::from_str(&line).unwrap();
                let mut frame = serde_json::to_vec(&service.dispatch(request)).unwrap();
                frame.push(b'\n');
                writer.write_all(&frame).await.unwrap();
                answered_count.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    (port, accepted, answered)
}

async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn rec(item_id: i64, score: f64) -> Recommendation {
    Recommendation { item_id, score }
}

#[tokio::test]
async fn recommends_from_the_pushed_interactions() {
    let port = start_oracle().await;
    let (client, observer) = observed_client(port);

    assert!(client.warmup().await.unwrap());
    let recs = client.get_recommendations_for_user(&MockInteractions, 1, 10).await.unwrap();

    assert_eq!(recs, vec![rec(104, 1.0), rec(103, 0.4)]);
    assert_eq!(observer.events(), vec![RecommenderEvent::SendGetRecs, RecommenderEvent::RecvRecList]);
    assert!(client.is_connected().await);
}

#[tokio::test]
async fn pushed_snapshot_replaces_the_oracle_data() {
    let port = start_oracle().await;
    let client = client_for(port);
    let snapshot = vec![
        Interaction { user_id: 5, item_id: 1, rating: 10.0 },
        Interaction { user_id: 6, item_id: 1, rating: 20.0 },
        Interaction { user_id: 6, item_id: 2, rating: 20.0 },
    ];

    let recs = client.get_recommendations_for_user(&snapshot, 5, 10).await.unwrap();
    assert_eq!(recs, vec![rec(2, 1.0)]);
}

#[tokio::test]
async fn similar_items_run_their_own_cycle() {
    let port = start_oracle().await;
    let (client, observer) = observed_client(port);

    let similar = client.get_similar_items(101, 2).await.unwrap();
    assert_eq!(similar, vec![rec(102, 1.0), rec(103, 1.0)]);

    // A second call gets a fresh monitor rather than reusing the finished one.
    client.get_similar_items(101, 2).await.unwrap();
    assert_eq!(
        observer.events(),
        vec![
            RecommenderEvent::SendGetSimilar,
            RecommenderEvent::RecvSimilarList,
            RecommenderEvent::SendGetSimilar,
            RecommenderEvent::RecvSimilarList,
        ]
    );
}

#[tokio::test]
async fn unreachable_oracle_is_a_remote_error() {
    let port = unused_port().await;
    let (client, observer) = observed_client(port);

    let err = client.get_recommendations_for_user(&MockInteractions, 1, 5).await.unwrap_err();
    match err {
        RecommenderError::Remote { method, .. } => assert_eq!(method, "recommend_for_user"),
        other => panic!("expected a remote error, got {:?}", other),
    }
    assert_eq!(observer.events(), vec![RecommenderEvent::SendGetRecs, RecommenderEvent::RecvRecError]);
    assert!(client.warmup().await.is_err());
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn dropped_connection_is_retried_once() {
    let (port, accepted) = start_flaky_oracle(1).await;
    let client = client_for(port);

    let similar = client.get_similar_items(104, 10).await.unwrap();
    assert_eq!(similar, vec![rec(101, 1.0)]);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_failure_gives_up() {
    let (port, accepted) = start_flaky_oracle(usize::MAX).await;
    let (client, observer) = observed_client(port);

    let err = client.get_similar_items(101, 10).await.unwrap_err();
    assert!(matches!(err, RecommenderError::Remote { .. }), "{:?}", err);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert_eq!(observer.events(), vec![RecommenderEvent::SendGetSimilar, RecommenderEvent::RecvRecError]);
}

#[tokio::test]
async fn healthy_connection_is_reused() {
    let (port, accepted) = start_flaky_oracle(0).await;
    let client = client_for(port);

    client.get_similar_items(101, 10).await.unwrap();
    client.get_similar_items(101, 10).await.unwrap();
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn idle_connection_closed_by_the_oracle_is_replaced() {
    let (port, accepted, answered) = start_one_shot_oracle().await;
    let client = client_for(port);

    client.get_similar_items(101, 10).await.unwrap();
    let mut connected = true;
    for _ in 0..200 {
        connected = client.is_connected().await;
        if !connected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!connected);

    let similar = client.get_similar_items(104, 10).await.unwrap();
    assert_eq!(similar, vec![rec(101, 1.0)]);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert_eq!(answered.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn null_result_means_no_recommendations() {
    let port = start_scripted_oracle(|request| RpcResponse::ok(request.id.clone(), Value::Null)).await;
    let client = client_for(port);

    assert_eq!(client.get_similar_items(1, 10).await.unwrap(), Vec::new());
    assert!(!client.warmup().await.unwrap());
}

#[tokio::test]
async fn failed_push_does_not_block_recommendations() {
    let port = start_scripted_oracle(|request| match request.method.as_str() {
        "load_interactions" => RpcResponse::err(request.id.clone(), "read-only replica"),
        _ => RpcResponse::ok(request.id.clone(), json!([{"item_id": "7", "score": "0.5"}, {"item_id": 8.0, "score": 1}])),
    })
    .await;
    let (client, observer) = observed_client(port);

    let recs = client.get_recommendations_for_user(&MockInteractions, 1, 10).await.unwrap();
    assert_eq!(recs, vec![rec(7, 0.5), rec(8, 1.0)]);
    assert_eq!(observer.events(), vec![RecommenderEvent::SendGetRecs, RecommenderEvent::RecvRecList]);
}

#[tokio::test]
async fn remote_errors_are_reported_after_the_retry() {
    let port = start_oracle().await;
    let client = client_for(port);

    let err = client.call("nope", Vec::new()).await.unwrap_err();
    match err {
        RecommenderError::Remote { method, message } => {
            assert_eq!(method, "nope");
            assert!(message.contains("unknown method: nope"), "{}", message);
        }
        other => panic!("expected a remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_rows_end_the_cycle_with_an_error() {
    let port = start_scripted_oracle(|request| RpcResponse::ok(request.id.clone(), json!(3))).await;
    let (client, observer) = observed_client(port);

    let err = client.get_similar_items(1, 10).await.unwrap_err();
    assert!(matches!(err, RecommenderError::Materialize(_)), "{:?}", err);
    assert_eq!(observer.events(), vec![RecommenderEvent::SendGetSimilar, RecommenderEvent::RecvRecError]);
}
