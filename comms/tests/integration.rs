use std::borrow::Cow;

use comms::msg::{Command, Msg, Payload, Report};
use tokio::io;

#[tokio::test]
async fn weights_arrive_with_their_iteration() -> io::Result<()> {
    let (one, two) = io::duplex(4096);
    let (one_rx, one_tx) = io::split(one);
    let (two_rx, two_tx) = io::split(two);
    let (_one_rx, mut tx) = comms::channel(one_rx, one_tx);
    let (mut rx, _two_tx) = comms::channel(two_rx, two_tx);

    let weights = [0.5, -0.25, 3.0];
    let msg = Msg::Data(Payload::Weights {
        iteration: 7,
        weights: &weights,
    });
    tx.send(&msg).await?;

    let Msg::Data(Payload::Weights { iteration, weights: got }) = rx.recv().await? else {
        panic!("expected weights");
    };

    assert_eq!(iteration, 7);
    assert_eq!(got, &weights);
    Ok(())
}

#[tokio::test]
async fn report_keeps_scalar_fields_and_gradient() -> io::Result<()> {
    let (one, two) = io::duplex(4096);
    let (one_rx, one_tx) = io::split(one);
    let (two_rx, two_tx) = io::split(two);
    let (_one_rx, mut tx) = comms::channel(one_rx, one_tx);
    let (mut rx, _two_tx) = comms::channel(two_rx, two_tx);

    let gradient = [0.1, -0.1];
    let report = Report {
        iteration: 3,
        train_error: 0.25,
        validation_error: 0.5,
        train_size: 2,
        validation_size: 1,
        gradient: &gradient,
    };
    tx.send(&Msg::Data(Payload::Report(report))).await?;

    let msg: Msg = rx.recv().await?;
    assert_eq!(msg, Msg::Data(Payload::Report(report)));
    Ok(())
}

#[tokio::test]
async fn control_and_error_messages_follow_data() -> io::Result<()> {
    let (one, two) = io::duplex(4096);
    let (one_rx, one_tx) = io::split(one);
    let (two_rx, two_tx) = io::split(two);
    let (_one_rx, mut tx) = comms::channel(one_rx, one_tx);
    let (mut rx, _two_tx) = comms::channel(two_rx, two_tx);

    tx.send(&Msg::Control(Command::Start { iteration: 1 })).await?;
    tx.send(&Msg::Err(Cow::Borrowed("nan in partition 2"))).await?;
    tx.send(&Msg::Control(Command::Disconnect)).await?;

    let msg: Msg = rx.recv().await?;
    assert_eq!(msg, Msg::Control(Command::Start { iteration: 1 }));

    let msg: Msg = rx.recv().await?;
    assert_eq!(msg, Msg::Err(Cow::Borrowed("nan in partition 2")));

    let msg: Msg = rx.recv().await?;
    assert_eq!(msg.kind(), "control/disconnect");
    Ok(())
}

#[tokio::test]
async fn truncated_report_is_invalid_data() -> io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let (mut raw_tx, two) = io::duplex(4096);
    let (two_rx, two_tx) = io::split(two);
    let (mut rx, _two_tx) = comms::channel(two_rx, two_tx);

    // A report header followed by only part of its fixed fields.
    let mut frame = Vec::new();
    frame.extend_from_slice(&12u64.to_be_bytes());
    frame.extend_from_slice(&3u32.to_be_bytes());
    frame.extend_from_slice(&[0; 8]);
    raw_tx.write_all(&frame).await?;

    let err = rx.recv::<Msg>().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    Ok(())
}
