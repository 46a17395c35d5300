use auction_service::oracle::{serve_connection, serve_connection_limited, OracleService};
use auction_service::recommender::wire::{RpcRequest, RpcResponse};
use auction_service::recommender::{
    materialize, Interaction, MaterializeError, MockInteractions, Recommendation,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

fn request(method: &str, params: Vec<Value>) -> RpcRequest {
    RpcRequest {
        id: "req-1".to_string(),
        method: method.to_string(),
        params,
    }
}

fn rec(item_id: i64, score: f64) -> Recommendation {
    Recommendation { item_id, score }
}

#[test]
fn recommends_what_neighbours_rated() {
    let oracle = OracleService::new(&MockInteractions);
    assert_eq!(oracle.recommend_for_user(1, 10), vec![rec(104, 1.0), rec(103, 0.4)]);
    assert_eq!(oracle.recommend_for_user(1, 1), vec![rec(104, 1.0)]);
}

#[test]
fn unknown_user_gets_everyone_elses_favourites() {
    let oracle = OracleService::new(&MockInteractions);
    let recs = oracle.recommend_for_user(42, 2);
    // 101 collects 5 + 4 + 1 from all three users.
    assert_eq!(recs, vec![rec(101, 1.0), rec(104, 0.5)]);
}

#[test]
fn similar_items_share_raters() {
    let oracle = OracleService::new(&MockInteractions);
    assert_eq!(oracle.similar_items(103, 10), vec![rec(101, 1.0)]);
    assert!(oracle.similar_items(999, 10).is_empty());
}

#[test]
fn load_replaces_the_data_set() {
    let oracle = OracleService::new(&MockInteractions);
    oracle.load_interactions(vec![Interaction { user_id: 1, item_id: 9, rating: 1.0 }]);

    assert_eq!(oracle.snapshot().len(), 1);
    assert!(oracle.recommend_for_user(1, 10).is_empty());
}

#[test]
fn dispatch_answers_each_method() {
    let oracle = OracleService::new(&MockInteractions);
    assert!(!oracle.is_warm());

    let warm = oracle.dispatch(request("warmup", Vec::new()));
    assert_eq!(warm, RpcResponse::ok("req-1".to_string(), json!(true)));
    assert!(oracle.is_warm());

    let similar = oracle.dispatch(request("similar_items", vec![json!(104), json!(5)]));
    assert_eq!(similar.result, Some(json!([{"item_id": 101, "score": 1.0}])));

    let loaded = oracle.dispatch(request(
        "load_interactions",
        vec![json!([{"user_id": 1, "item_id": 2, "rating": 3.0}])],
    ));
    assert_eq!(loaded.result, Some(json!(true)));
    assert_eq!(oracle.snapshot().len(), 1);
}

#[test]
fn dispatch_accepts_the_older_method_names() {
    let oracle = OracleService::new(&MockInteractions);
    let recs = oracle.dispatch(request("get_recommendations_for_user", vec![json!(1)]));
    let similar = oracle.dispatch(request("get_similar_items", vec![json!(101), json!(1)]));

    assert_eq!(materialize(&recs.result.unwrap()).unwrap(), vec![rec(104, 1.0), rec(103, 0.4)]);
    assert_eq!(materialize(&similar.result.unwrap()).unwrap(), vec![rec(102, 1.0)]);
}

#[test]
fn dispatch_reports_bad_requests() {
    let oracle = OracleService::new(&MockInteractions);

    let unknown = oracle.dispatch(request("nope", Vec::new()));
    assert_eq!(unknown, RpcResponse::err("req-1".to_string(), "unknown method: nope"));

    let missing = oracle.dispatch(request("recommend_for_user", Vec::new()));
    assert_eq!(missing.error.as_deref(), Some("parameter 0 must be an integer"));

    let garbage = oracle.dispatch(request("load_interactions", vec![json!("rows")]));
    assert!(garbage.error.unwrap().starts_with("invalid interactions"));
    assert_eq!(oracle.snapshot().len(), 6);
}

#[test]
fn materialize_coerces_numeric_strings_and_floats() {
    let rows = json!([
        {"item_id": "7", "score": "0.5"},
        {"item_id": 8.0, "score": 1},
        {"item_id": 9, "score": 0.25, "reason": "ignored"},
    ]);
    assert_eq!(materialize(&rows).unwrap(), vec![rec(7, 0.5), rec(8, 1.0), rec(9, 0.25)]);
}

#[test]
fn materialize_refuses_ids_it_would_have_to_invent() {
    for item_id in [json!(101.7), json!(u64::MAX), json!(1e300), json!("101.0")] {
        let rows = json!([{"item_id": item_id, "score": 1}]);
        assert!(
            matches!(materialize(&rows), Err(MaterializeError::NotNumeric { index: 0, field: "item_id", .. })),
            "{} was accepted",
            item_id
        );
    }
    assert_eq!(materialize(&json!([{"item_id": -3.0, "score": 1}])).unwrap(), vec![rec(-3, 1.0)]);
}

#[test]
fn materialize_treats_empty_answers_as_no_rows() {
    assert!(materialize(&Value::Null).unwrap().is_empty());
    assert!(materialize(&json!({})).unwrap().is_empty());
    assert!(materialize(&json!([])).unwrap().is_empty());
}

#[test]
fn materialize_names_the_broken_row() {
    let missing = json!([{"item_id": 1, "score": 0.1}, {"item_id": 2}]);
    assert_eq!(
        materialize(&missing),
        Err(MaterializeError::MissingField { index: 1, field: "score" })
    );

    let not_numeric = json!([{"item_id": "abc", "score": 0.1}]);
    assert!(matches!(
        materialize(&not_numeric),
        Err(MaterializeError::NotNumeric { index: 0, field: "item_id", .. })
    ));

    assert_eq!(materialize(&json!(3)), Err(MaterializeError::NotAList("a number".to_string())));
}

#[tokio::test]
async fn server_answers_line_by_line() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let service = Arc::new(OracleService::new(&MockInteractions));
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve_connection(stream, service).await
    });

    let stream = TcpStream::connect(address).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"this is not json\n").await.unwrap();
    let reply: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply.id, "");
    assert!(reply.error.unwrap().starts_with("malformed request"));

    writer
        .write_all(b"{\"id\":\"a\",\"method\":\"similar_items\",\"params\":[103]}\n")
        .await
        .unwrap();
    let reply: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply, RpcResponse::ok("a".to_string(), json!([{"item_id": 101, "score": 1.0}])));
}

#[tokio::test]
async fn server_skips_oversized_lines_and_keeps_serving() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let service = Arc::new(OracleService::new(&MockInteractions));
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve_connection_limited(stream, service, 64).await
    });

    let stream = TcpStream::connect(address).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let mut oversized = vec![b'x'; 4096];
    oversized.push(b'\n');
    writer.write_all(&oversized).await.unwrap();
    let reply: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply.id, "");
    assert_eq!(reply.error.as_deref(), Some("request exceeds 64 bytes"));

    writer
        .write_all(b"{\"id\":\"b\",\"method\":\"similar_items\",\"params\":[103]}\n")
        .await
        .unwrap();
    let reply: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply, RpcResponse::ok("b".to_string(), json!([{"item_id": 101, "score": 1.0}])));
}
