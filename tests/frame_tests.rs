//! Frame decoder tests over multi-frame wire images and arbitrary
//! chunk boundaries.

use bytes::{Bytes, BytesMut};

use h3stream::frame::{self, FrameDecoder, FrameEvent, FrameKind, FRAME_TYPE_SETTINGS};

fn wire(frames: &[(&[u8], &[u8])]) -> Vec<u8> {
    // (type+length header bytes, payload bytes) pairs
    let mut out = Vec::new();
    for (header, payload) in frames {
        out.extend_from_slice(header);
        out.extend_from_slice(payload);
    }
    out
}

fn collect_events(decoder: &mut FrameDecoder, input: &[u8], chunk_size: usize) -> Vec<FrameEvent> {
    let mut events = Vec::new();
    for chunk in input.chunks(chunk_size) {
        let mut buf = Bytes::copy_from_slice(chunk);
        loop {
            let (consumed, event) = decoder.next_event(&buf).unwrap();
            buf = buf.slice(consumed..);
            match event {
                Some(e) => events.push(e),
                None => break,
            }
        }
        assert!(buf.is_empty(), "decoder left bytes unconsumed");
    }
    events
}

#[test]
fn test_back_to_back_frames() {
    let input = wire(&[(&[0x00, 0x02], b"ab"), (&[0x00, 0x02], b"cd")]);
    let mut decoder = FrameDecoder::new(false);
    let events = collect_events(&mut decoder, &input, input.len());

    let starts = events
        .iter()
        .filter(|e| matches!(e, FrameEvent::FrameStart { .. }))
        .count();
    let ends = events
        .iter()
        .filter(|e| matches!(e, FrameEvent::FrameEnd { .. }))
        .count();
    assert_eq!(starts, 2);
    assert_eq!(ends, 2);
    assert!(decoder.is_at_frame_boundary());
}

#[test]
fn test_events_stable_across_chunk_sizes() {
    let input = wire(&[
        (&[0x01, 0x03], b"hdr"),
        (&[0x00, 0x05], b"hello"),
        (&[0x01, 0x02], b"tr"),
    ]);

    let mut whole = FrameDecoder::new(false);
    let reference = collect_events(&mut whole, &input, input.len());

    let flat = |evs: &[FrameEvent]| {
        let mut out: Vec<(FrameKind, Vec<u8>)> = Vec::new();
        for e in evs {
            match e {
                FrameEvent::FrameStart { kind, .. } => out.push((*kind, Vec::new())),
                FrameEvent::FramePayload { chunk, .. } => {
                    out.last_mut().unwrap().1.extend_from_slice(chunk)
                }
                FrameEvent::FrameEnd { .. } | FrameEvent::TunnelStart { .. } => {}
            }
        }
        out
    };

    for chunk_size in 1..input.len() {
        let mut decoder = FrameDecoder::new(false);
        let events = collect_events(&mut decoder, &input, chunk_size);

        // Payload chunking differs, but reassembled payloads and the
        // start/end structure must match.
        assert_eq!(flat(&events), flat(&reference), "chunk_size {}", chunk_size);
    }
}

#[test]
fn test_header_len_counts_split_bytes() {
    // HEADERS with a 2-byte length varint, delivered byte by byte.
    let mut input = vec![0x01];
    let mut len_buf = BytesMut::new();
    h3stream::varint::encode_buf(64, &mut len_buf).unwrap();
    input.extend_from_slice(&len_buf);
    input.extend_from_slice(&[0u8; 64]);

    let mut decoder = FrameDecoder::new(false);
    let events = collect_events(&mut decoder, &input, 1);
    match &events[0] {
        FrameEvent::FrameStart {
            kind,
            header_len,
            payload_len,
        } => {
            assert_eq!(*kind, FrameKind::Headers);
            assert_eq!(*header_len, 3);
            assert_eq!(*payload_len, 64);
        }
        other => panic!("unexpected first event: {:?}", other),
    }
}

#[test]
fn test_control_frames_are_classified_not_rejected_here() {
    let mut decoder = FrameDecoder::new(false);
    let events = collect_events(&mut decoder, &[0x04, 0x01, 0x00], 3);
    assert!(matches!(
        events[0],
        FrameEvent::FrameStart {
            kind: FrameKind::Control(FRAME_TYPE_SETTINGS),
            ..
        }
    ));
}

#[test]
fn test_serializer_decoder_agreement() {
    let mut buf = BytesMut::new();
    frame::headers_frame_header(3, &mut buf).unwrap();
    buf.extend_from_slice(b"hdr");
    frame::data_frame_header(2, &mut buf).unwrap();
    buf.extend_from_slice(b"ok");

    let mut decoder = FrameDecoder::new(false);
    let events = collect_events(&mut decoder, &buf, buf.len());
    assert_eq!(
        events,
        vec![
            FrameEvent::FrameStart {
                kind: FrameKind::Headers,
                header_len: 2,
                payload_len: 3,
            },
            FrameEvent::FramePayload {
                kind: FrameKind::Headers,
                chunk: Bytes::from_static(b"hdr"),
            },
            FrameEvent::FrameEnd {
                kind: FrameKind::Headers
            },
            FrameEvent::FrameStart {
                kind: FrameKind::Data,
                header_len: 2,
                payload_len: 2,
            },
            FrameEvent::FramePayload {
                kind: FrameKind::Data,
                chunk: Bytes::from_static(b"ok"),
            },
            FrameEvent::FrameEnd {
                kind: FrameKind::Data
            },
        ]
    );
}

#[test]
fn test_tunnel_conversion_leaves_rest_alone() {
    let mut buf = BytesMut::new();
    frame::tunnel_frame_header(2, &mut buf).unwrap();
    buf.extend_from_slice(b"raw tunnel bytes");

    let mut decoder = FrameDecoder::new(true);
    let input = buf.freeze();
    let (consumed, event) = decoder.next_event(&input).unwrap();
    assert_eq!(
        event,
        Some(FrameEvent::TunnelStart {
            header_len: 3,
            session_id: 2,
        })
    );
    // Everything after the conversion header stays for the capsule layer.
    assert_eq!(&input[consumed..], b"raw tunnel bytes");
    let rest = input.slice(consumed..);
    assert_eq!(decoder.next_event(&rest).unwrap(), (0, None));
}
