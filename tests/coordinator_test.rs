// Fan-out, fault isolation and completion of the streaming coordinator

mod common;

use common::{session_id_for, target, wait_until, MockBroker, ScriptTransport};
use ssmtail::logs::{color_for, FilterSpec, MemorySink};
use ssmtail::stream::{on_interrupt, Coordinator, RunSummary, FINISHED_MARKER, INTERRUPT_ACK};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn coordinator(
    broker: &Arc<MockBroker>,
    transport: &Arc<ScriptTransport>,
    sink: &Arc<MemorySink>,
) -> Coordinator {
    Coordinator::new(broker.clone(), transport.clone(), sink.clone())
        .with_timeouts(Duration::from_secs(10), Duration::from_secs(5))
}

fn lines_from(sink: &MemorySink, index: usize, id: &str) -> Vec<String> {
    let prefix = format!("[{}] ", color_for(index).paint(id));
    sink.lines()
        .iter()
        .filter_map(|line| line.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_every_target_streams_with_its_own_color() {
    let broker = Arc::new(MockBroker::new());
    let transport = Arc::new(
        ScriptTransport::new("echo from-default")
            .with_script("i-1", "echo one")
            .with_script("i-2", "echo two"),
    );
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let coord = coordinator(&broker, &transport, &sink);
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            coord
                .run(vec![target("i-1"), target("i-2")], FilterSpec::pass_through(), cancel)
                .await
        }
    });

    assert!(wait_until(|| sink.lines().len() >= 2).await);
    assert_eq!(lines_from(&sink, 0, "i-1"), vec!["one"]);
    assert_eq!(lines_from(&sink, 1, "i-2"), vec!["two"]);

    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            workers: 2,
            closed: 2
        }
    );
    assert_eq!(sink.lines().last().unwrap(), FINISHED_MARKER);
}

#[tokio::test]
async fn test_interrupt_while_one_session_is_still_opening() {
    let broker = Arc::new(MockBroker::new().with_open_delay("i-2", Duration::from_secs(3)));
    let transport = Arc::new(ScriptTransport::new("echo up; exec sleep 30"));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let coord = coordinator(&broker, &transport, &sink);
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            coord
                .run(
                    vec![target("i-1"), target("i-2"), target("i-3")],
                    FilterSpec::pass_through(),
                    cancel,
                )
                .await
        }
    });

    assert!(wait_until(|| sink.lines().len() >= 2).await);
    assert!(broker.opened().len() == 2);

    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run should end once the pending open resolves")
        .unwrap();

    assert_eq!(summary.closed, 3);
    for id in ["i-1", "i-2", "i-3"] {
        assert_eq!(broker.close_count(&session_id_for(id)), 1, "{}", id);
    }

    let mut spawned = transport.spawned();
    spawned.sort();
    assert_eq!(spawned, vec!["i-1", "i-3"]);
}

#[tokio::test]
async fn test_open_failure_is_isolated_to_its_target() {
    let broker = Arc::new(MockBroker::new().with_failing_open("i-1"));
    let transport = Arc::new(ScriptTransport::new("echo alive"));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let coord = coordinator(&broker, &transport, &sink);
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            coord
                .run(vec![target("i-1"), target("i-2")], FilterSpec::pass_through(), cancel)
                .await
        }
    });

    assert!(wait_until(|| !lines_from(&sink, 1, "i-2").is_empty()).await);
    assert_eq!(sink.errors().len(), 1);

    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.workers, 2);
    assert_eq!(summary.closed, 2);
    assert_eq!(broker.closed(), vec![session_id_for("i-2")]);
}

#[tokio::test]
async fn test_line_order_preserved_within_target() {
    let broker = Arc::new(MockBroker::new());
    let transport = Arc::new(
        ScriptTransport::new("echo other")
            .with_script("i-1", "i=1; while [ $i -le 50 ]; do echo $i; i=$((i+1)); done"),
    );
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let coord = coordinator(&broker, &transport, &sink);
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            coord
                .run(vec![target("i-1"), target("i-2")], FilterSpec::pass_through(), cancel)
                .await
        }
    });

    assert!(wait_until(|| lines_from(&sink, 0, "i-1").len() == 50).await);

    let expected: Vec<String> = (1..=50).map(|i| i.to_string()).collect();
    assert_eq!(lines_from(&sink, 0, "i-1"), expected);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_repeated_interrupts_close_each_session_once() {
    let broker = Arc::new(MockBroker::new());
    let transport = Arc::new(ScriptTransport::new("echo up; exec sleep 30"));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let coord = coordinator(&broker, &transport, &sink);
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            coord
                .run(vec![target("i-1"), target("i-2")], FilterSpec::pass_through(), cancel)
                .await
        }
    });

    assert!(wait_until(|| sink.lines().len() >= 2).await);

    let fired: Vec<bool> = (0..3).map(|_| on_interrupt(&cancel, &*sink)).collect();
    assert_eq!(fired, vec![true, false, false]);

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.closed, 2);
    assert_eq!(broker.closed().len(), 2);

    let terminated = sink
        .lines()
        .iter()
        .filter(|line| line.starts_with("terminated: "))
        .count();
    assert_eq!(terminated, 2);

    let acks = sink
        .lines()
        .iter()
        .filter(|line| line.as_str() == INTERRUPT_ACK)
        .count();
    assert_eq!(acks, 1);

    let finished = sink
        .lines()
        .iter()
        .filter(|line| line.as_str() == FINISHED_MARKER)
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_no_targets_finishes_immediately() {
    let broker = Arc::new(MockBroker::new());
    let transport = Arc::new(ScriptTransport::new("echo never"));
    let sink = Arc::new(MemorySink::new());

    let summary = coordinator(&broker, &transport, &sink)
        .run(Vec::new(), FilterSpec::pass_through(), CancellationToken::new())
        .await;

    assert_eq!(
        summary,
        RunSummary {
            workers: 0,
            closed: 0
        }
    );
    assert_eq!(sink.lines(), vec![FINISHED_MARKER]);
}
