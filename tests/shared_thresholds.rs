use std::time::Duration;

use pwcore::{SharedThresholds, Thresholds};

const LIMITS: [(u8, u8); 4] = [(50, 120), (60, 100), (40, 180), (70, 90)];

async fn writer(shared: SharedThresholds) {
    for round in 0..50 {
        let (min, max) = LIMITS[round % LIMITS.len()];
        shared.replace(Thresholds::new(min, max).unwrap()).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn reader(shared: SharedThresholds) -> Vec<(u8, u8)> {
    let mut reads = Vec::new();
    for _ in 0..100 {
        let t = shared.snapshot().await;
        reads.push((t.min_bpm(), t.max_bpm()));
        tokio::task::yield_now().await;
    }
    reads
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_never_see_a_torn_pair() {
    let shared = SharedThresholds::default();

    let writer = tokio::spawn(writer(shared.clone()));
    let readers: Vec<_> = (0..3).map(|_| tokio::spawn(reader(shared.clone()))).collect();

    writer.await.unwrap();
    for handle in readers {
        let reads = handle.await.unwrap();
        assert!(!reads.is_empty(), "The reader should have read some values.");
        for pair in reads {
            assert!(LIMITS.contains(&pair), "torn read {:?}", pair);
            assert!(pair.0 < pair.1);
        }
    }

    let last = LIMITS[49 % LIMITS.len()];
    assert_eq!(
        shared.snapshot().await,
        Thresholds::new(last.0, last.1).unwrap()
    );
}

#[tokio::test]
async fn replace_returns_previous_limits() {
    let shared = SharedThresholds::new(Thresholds::new(60, 100).unwrap());
    let previous = shared.replace(Thresholds::new(55, 110).unwrap()).await;
    assert_eq!(previous, Thresholds::new(60, 100).unwrap());
    assert_eq!(shared.snapshot().await.to_payload(), [55, 110]);
}
