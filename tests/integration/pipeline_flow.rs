//! Push and pull paths feeding one reconciler

use async_trait::async_trait;
use serde_json::{json, Value};
use signal_desk::classify::{ClassifierConfig, Tier};
use signal_desk::coalesce::Coalescer;
use signal_desk::pipeline::{
    push_handler, request_snapshot, run_reconciler, spawn_push_queue, PipelineInput, Reconciler, Snapshot,
};
use signal_desk::poll::{FetchScope, PollConfig, Poller, PullKind, SignalSource, SourceError};
use signal_desk::store::StoreConfig;
use signal_desk::ws::{Connector, Session, SharedConnection, WsConfig, WsMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

struct FakeConnector {
    opened: mpsc::UnboundedSender<mpsc::Sender<WsMessage>>,
}

impl Connector for FakeConnector {
    fn open(&mut self) -> Session {
        let (tx, rx) = mpsc::channel(64);
        let _ = self.opened.send(tx);
        Session::detached(rx)
    }
}

struct CandidateSource;

#[async_trait]
impl SignalSource for CandidateSource {
    async fn fetch(&self, kind: PullKind, _scope: &FetchScope) -> Result<Vec<Value>, SourceError> {
        match kind {
            PullKind::Candidates => Ok(vec![json!({
                "pair": "USDJPY",
                "direction": "SELL",
                "confidence": 50,
                "strength": 60,
                "decision": "ENTER",
                "isValid": true,
                "entryPrice": "155.00",
                "stopLoss": "155.50",
                "takeProfit": "154.00"
            })]),
            PullKind::Signals => Err(SourceError::Status {
                status: 502,
                body: "bad gateway".into(),
            }),
            PullKind::Events => Ok(Vec::new()),
        }
    }
}

fn strict_signal_frame() -> String {
    json!({
        "type": "new_signal",
        "id": "frame-1",
        "payload": {
            "pair": "EURUSD",
            "direction": "BUY",
            "timeframe": "H1",
            "strategy": "trend",
            "confidence": 82,
            "strength": 70,
            "decision": {"state": "ENTER_STRONG", "blocked": false},
            "isValid": true,
            "entryPrice": 1.1,
            "stopLoss": 1.09,
            "takeProfit": 1.12
        }
    })
    .to_string()
}

async fn wait_for<F>(inputs: &mpsc::Sender<PipelineInput>, done: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    timeout(Duration::from_secs(30), async {
        loop {
            let snapshot = request_snapshot(inputs).await.unwrap();
            if done(&snapshot) {
                return snapshot;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("condition not reached")
}

fn reconciler() -> Reconciler {
    Reconciler::new(&StoreConfig::default(), ClassifierConfig::default())
}

#[tokio::test(start_paused = true)]
async fn push_path_routes_every_message_type() {
    let (inputs_tx, inputs_rx) = mpsc::channel(256);
    let _reconciler = tokio::spawn(run_reconciler(reconciler(), inputs_rx, None));
    let coalescer = Coalescer::spawn(Duration::from_millis(650), inputs_tx.clone());

    let (opened_tx, mut opened_rx) = mpsc::unbounded_channel();
    let connection = SharedConnection::spawn(WsConfig::new("wss://test"), FakeConnector { opened: opened_tx });
    let _sub = connection.subscribe(push_handler(spawn_push_queue(inputs_tx.clone()), coalescer.sender()));

    let server = opened_rx.recv().await.unwrap();
    server.send(WsMessage::Connected).await.unwrap();
    server.send(WsMessage::Text(strict_signal_frame())).await.unwrap();
    for bid in ["1.1000", "1.1001", "1.1002"] {
        let frame = json!({"type": "tick", "data": {"symbol": "EURUSD", "bid": bid}});
        server.send(WsMessage::Text(frame.to_string())).await.unwrap();
    }
    server
        .send(WsMessage::Text(json!({"type": "bridge_heartbeat", "payload": {"source": "mt5"}}).to_string()))
        .await
        .unwrap();
    server
        .send(WsMessage::Text(json!({"type": "order_filled", "message": "filled 0.1 lot"}).to_string()))
        .await
        .unwrap();
    server.send(WsMessage::Text("not json".into())).await.unwrap();

    let snapshot = wait_for(&inputs_tx, |s| {
        s.signal_count == 1 && s.quote_count == 1 && s.event_count == 1
    })
    .await;

    assert!(snapshot.live);
    assert_eq!(snapshot.classification.tier, Tier::Strict);
    assert_eq!(snapshot.classification.signals[0].pair, "EURUSD");
    assert_eq!(snapshot.recent_events[0].kind, "order_filled");
}

#[tokio::test(start_paused = true)]
async fn pulled_candidates_back_fill_until_push_arrives() {
    let (inputs_tx, inputs_rx) = mpsc::channel(256);

    let poller = Poller::new(
        std::sync::Arc::new(CandidateSource),
        PollConfig::default(),
        FetchScope::default(),
    );
    let handle = poller.start(inputs_tx.clone()).await;
    let _reconciler = tokio::spawn(run_reconciler(reconciler(), inputs_rx, Some(handle.scope_receiver())));

    let snapshot = wait_for(&inputs_tx, |s| s.candidate_count == 1).await;
    assert_eq!(snapshot.signal_count, 0);
    assert!(snapshot.classification.used_fallback);
    assert_eq!(snapshot.classification.tier, Tier::Relaxed);
    assert_eq!(snapshot.classification.signals[0].pair, "USDJPY");

    let coalescer = Coalescer::spawn(Duration::from_millis(650), inputs_tx.clone());
    let (opened_tx, mut opened_rx) = mpsc::unbounded_channel();
    let connection = SharedConnection::spawn(WsConfig::new("wss://test"), FakeConnector { opened: opened_tx });
    let _sub = connection.subscribe(push_handler(spawn_push_queue(inputs_tx.clone()), coalescer.sender()));
    let server = opened_rx.recv().await.unwrap();
    server.send(WsMessage::Connected).await.unwrap();
    server.send(WsMessage::Text(strict_signal_frame())).await.unwrap();

    let snapshot = wait_for(&inputs_tx, |s| s.signal_count == 1).await;
    assert!(!snapshot.classification.used_fallback);
    assert_eq!(snapshot.classification.tier, Tier::Strict);
    assert_eq!(snapshot.candidate_count, 1);
}
