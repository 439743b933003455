mod common;

use bondflow::core::{bind, BondError, Closeable, Msg, Node, ReadEndpoint, Writable, WriteEndpoint};
use bondflow::nodes::{MergeN, MergeTwo};
use common::{read_n, within};
use std::sync::Arc;

#[tokio::test]
async fn test_merge_two_keeps_per_source_order() {
    let merge = Arc::new(MergeTwo::new("merge"));
    let wa = WriteEndpoint::new("a", "out");
    let wb = WriteEndpoint::new("b", "out");
    let sink = ReadEndpoint::new("sink", "in");
    bind(&wa, &merge.in_a, 2);
    bind(&wb, &merge.in_b, 2);
    bind(&merge.out, &sink, 2);
    let mut rx = sink.take_receiver().unwrap();

    let runner = tokio::spawn({
        let merge = merge.clone();
        async move { merge.run().await }
    });

    let produce = async {
        for i in 0..50u64 {
            wa.send(Msg::new(i)).await.unwrap();
            wb.send(Msg::new(100 + i)).await.unwrap();
        }
        wa.close();
        wb.close();
    };
    let ((), got) = within(async { tokio::join!(produce, read_n(&mut rx, 100)) }).await;

    // Returns once both inputs are closed
    within(runner).await.unwrap().unwrap();

    let from_a: Vec<u64> = got.iter().copied().filter(|n| *n < 100).collect();
    let from_b: Vec<u64> = got.iter().copied().filter(|n| *n >= 100).collect();
    assert_eq!(from_a, (0..50).collect::<Vec<_>>());
    assert_eq!(from_b, (100..150).collect::<Vec<_>>());

    let metrics = merge.metrics().unwrap();
    assert_eq!(metrics.messages_received(), 100);
    assert_eq!(metrics.messages_forwarded(), 100);

    // The merge never closes its own output
    merge.close();
    assert!(within(rx.recv()).await.is_none());
}

#[tokio::test]
async fn test_merge_two_continues_after_one_input_closes() {
    let merge = Arc::new(MergeTwo::new("merge"));
    let wa = WriteEndpoint::new("a", "out");
    let wb = WriteEndpoint::new("b", "out");
    let sink = ReadEndpoint::new("sink", "in");
    bind(&wa, &merge.in_a, 1);
    bind(&wb, &merge.in_b, 1);
    bind(&merge.out, &sink, 4);
    let mut rx = sink.take_receiver().unwrap();

    let runner = tokio::spawn({
        let merge = merge.clone();
        async move { merge.run().await }
    });

    wa.close();
    for i in 1..=3u64 {
        wb.send(Msg::new(i)).await.unwrap();
    }
    assert_eq!(within(read_n(&mut rx, 3)).await, vec![1, 2, 3]);

    wb.close();
    within(runner).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_merge_two_with_unbound_input_fails() {
    let merge = MergeTwo::new("merge");
    let wa = WriteEndpoint::new("a", "out");
    bind(&wa, &merge.in_a, 1);

    let err = merge.run().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<BondError>(),
        Some(&BondError::Unbound(merge.in_b.port().clone()))
    );
}

#[tokio::test]
async fn test_merge_n_forwards_every_input() {
    let writers: Vec<WriteEndpoint> = (0..3)
        .map(|i| WriteEndpoint::new(format!("src{}", i), "out"))
        .collect();
    let mut merge = MergeN::new("merge");
    for (i, writer) in writers.iter().enumerate() {
        let input = merge.add_input(format!("in{}", i));
        bind(writer, input, 2);
    }
    let sink = ReadEndpoint::new("sink", "in");
    bind(merge.output(), &sink, 2);

    assert_eq!(merge.inputs().len(), 3);
    assert!(merge.get_input("in1").is_some());
    assert!(merge.get_input("in9").is_none());

    let merge = Arc::new(merge);
    let mut rx = sink.take_receiver().unwrap();
    let runner = tokio::spawn({
        let merge = merge.clone();
        async move { merge.run().await }
    });

    let produce = async {
        for round in 0..20u64 {
            for (i, writer) in writers.iter().enumerate() {
                writer.send(Msg::new(i as u64 * 1000 + round)).await.unwrap();
            }
        }
        for writer in &writers {
            writer.close();
        }
    };
    let ((), got) = within(async { tokio::join!(produce, read_n(&mut rx, 60)) }).await;
    within(runner).await.unwrap().unwrap();

    assert_eq!(got.len(), 60);
    for source in 0..3u64 {
        let seen: Vec<u64> = got
            .iter()
            .copied()
            .filter(|n| n / 1000 == source)
            .map(|n| n % 1000)
            .collect();
        assert_eq!(seen, (0..20).collect::<Vec<_>>(), "source {}", source);
    }
}

#[tokio::test]
async fn test_merge_n_without_inputs_finishes() {
    let merge = MergeN::new("merge");
    within(merge.run()).await.unwrap();
}
