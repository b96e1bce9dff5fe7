//! End-to-end protocol scenarios against a scripted device.

use std::time::Duration;

use ecrlib_core::{Error, Fault};
use ecrlib_dp25::Dp25Builder;
use ecrlib_dp25::decoder::{Event, FrameDecoder};
use ecrlib_dp25::frame::{encode_command, encode_response};
use ecrlib_dp25::status;
use ecrlib_test_harness::MockTransport;

const NAK: u8 = 0x15;

fn decode_all(bytes: &[u8]) -> Vec<Event> {
    let mut decoder = FrameDecoder::new();
    bytes
        .iter()
        .filter_map(|&b| decoder.push(b).expect("well-formed stream"))
        .collect()
}

#[tokio::test]
async fn cash_location_query_goes_out_byte_exact() {
    let mut request = vec![0x01, 0x2D, 0x22, 0x41];
    request.extend_from_slice(b"sCASH_LOC");
    request.extend_from_slice(&[0x05, 0x30, 0x33, 0x36, 0x34, 0x03]);

    let mut mock = MockTransport::new();
    let log = mock.sent_log();
    mock.expect(
        &request,
        &encode_response(0x22, 0x41, b"1", &[0x80; 6]).unwrap(),
    );

    let printer = Dp25Builder::new()
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let response = printer.execute(0x41, b"sCASH_LOC").await.unwrap();
    assert_eq!(response.text(), "1");
    assert_eq!(log.frames(), vec![request]);
}

#[test]
fn decode_reply_without_faults() {
    let mut bytes = vec![0x01, 0x2C, 0x22, 0x30, 0x41, 0x04];
    bytes.extend_from_slice(&[0; 6]);
    bytes.extend_from_slice(&[0x05, b'0', b'0', b'0', b'0', 0x03]);

    let events = decode_all(&bytes);
    assert_eq!(events.len(), 1);
    let Event::Frame(frame) = &events[0] else {
        panic!("expected a frame, got {:?}", events[0]);
    };
    assert_eq!(frame.data, b"A");

    let report = status::decode(&frame.status);
    assert!(!report.is_error());
    assert!(report.faults.is_empty());
    assert!(report.conditions.is_empty());
    assert!(!report.out_of_paper());
}

#[test]
fn decode_reply_with_syntax_error() {
    let bytes = encode_response(0x22, 0x30, b"", &[0x21, 0, 0, 0, 0, 0]).unwrap();
    let events = decode_all(&bytes);
    let Some(Event::Frame(frame)) = events.first() else {
        panic!("expected a frame");
    };

    let report = status::decode(&frame.status);
    assert!(report.is_error());
    assert!(report.faults.contains(&Fault::SyntaxError));
}

#[tokio::test]
async fn device_fault_fails_the_request() {
    let mut mock = MockTransport::new();
    mock.expect(
        &encode_command(0x22, 0x30, b"1;0000,1").unwrap(),
        &encode_response(0x22, 0x30, b"", &[0x21, 0, 0, 0, 0, 0]).unwrap(),
    );

    let printer = Dp25Builder::new()
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let result = printer.execute(0x30, b"1;0000,1").await;
    match result {
        Err(Error::Device(faults)) => {
            assert_eq!(faults.len(), 1);
            assert!(faults.contains(&Fault::SyntaxError));
        }
        other => panic!("expected a device fault, got {other:?}"),
    }
}

#[tokio::test]
async fn out_of_paper_is_a_qualified_success() {
    let mut mock = MockTransport::new();
    mock.expect(
        &encode_command(0x22, 0x2D, b"").unwrap(),
        &encode_response(0x22, 0x2D, b"", &[0x20, 0, 0x01, 0, 0, 0]).unwrap(),
    );

    let printer = Dp25Builder::new()
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let response = printer.test_communication().await.unwrap();
    assert!(response.out_of_paper);
    assert_eq!(response.faults.len(), 1);
    assert!(response.faults.contains(&Fault::OutOfPaper));
}

#[tokio::test]
async fn twelve_naks_exhaust_retries() {
    let frame = encode_command(0x22, 0x2D, b"").unwrap();
    let mut mock = MockTransport::new();
    let log = mock.sent_log();
    for _ in 0..12 {
        mock.expect(&frame, &[NAK]);
    }

    let printer = Dp25Builder::new()
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let result = printer.test_communication().await;
    assert!(matches!(result, Err(Error::RetryExhausted { retries: 12 })));

    let sent = log.frames();
    assert_eq!(sent.len(), 12);
    assert!(sent.iter().all(|f| f[..] == frame[..]));
}

#[tokio::test]
async fn nak_then_reply_settles_normally() {
    let frame = encode_command(0x22, 0x4C, b"T").unwrap();
    let mut mock = MockTransport::new();
    mock.expect(&frame, &[NAK]);
    mock.expect(&frame, &[NAK]);
    mock.expect(
        &frame,
        &encode_response(0x22, 0x4C, b"0,0,0,0", &[0x80; 6]).unwrap(),
    );

    let printer = Dp25Builder::new()
        .verify_checksum(true)
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let status = printer.receipt_status("T").await.unwrap();
    assert_eq!(status.open, "0");
}

#[tokio::test]
async fn concurrent_callers_are_answered_in_order() {
    let mut mock = MockTransport::new();
    for (seq, reply) in [(0x22u8, b"first"), (0x23, b"secnd"), (0x24, b"third")] {
        mock.expect(
            &encode_command(seq, 0x2D, b"").unwrap(),
            &encode_response(seq, 0x2D, reply, &[0x80; 6]).unwrap(),
        );
    }

    let printer = Dp25Builder::new()
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(
        printer.test_communication(),
        printer.test_communication(),
        printer.test_communication(),
    );
    assert_eq!(a.unwrap().text(), "first");
    assert_eq!(b.unwrap().text(), "secnd");
    assert_eq!(c.unwrap().text(), "third");
}
