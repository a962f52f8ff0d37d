mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{connect, response_event, MockTransport};
use openai_realtime::error::RealtimeError;
use openai_realtime::events::{
    ClientEvent, ServerEvent, TextDeltaEvent,
};
use openai_realtime::session::RealtimeSession;
use openai_realtime::transport::ConnectionState;
use openai_realtime::types::{ResponseStatus, SessionOptions};

fn text_delta(delta: &str) -> serde_json::Value {
    json!({
        "type": "response.text.delta",
        "response_id": "resp_1",
        "item_id": "item_1",
        "output_index": 0,
        "content_index": 0,
        "delta": delta
    })
}

mod lifecycle {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn connect_opens_session() {
        let transport = MockTransport::new();
        let session = connect(&transport).await;
        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(session.event_timeout(), Duration::from_secs(30));
        assert!(!session.debug_enabled());
    }

    #[tokio::test]
    async fn connect_fails_when_transport_reports_error() {
        let transport = MockTransport::failing("handshake refused");
        let err = RealtimeSession::connect(transport.clone())
            .await
            .err()
            .expect("connect should fail");
        match err {
            RealtimeError::ConnectionFailed { message, .. } => {
                assert!(message.contains("handshake refused"))
            }
            other => panic!("expected ConnectionFailed, got {other:?}"),
        }
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_closes_transport_once() {
        let transport = MockTransport::new();
        let session = connect(&transport).await;

        session.close().await.expect("first close should succeed");
        session.close().await.expect("second close should be a no-op");

        assert_eq!(transport.close_calls(), 1);
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn send_after_close_is_rejected_without_transmitting() {
        let transport = MockTransport::acking();
        let session = connect(&transport).await;
        session.close().await.unwrap();

        let err = session.send(ClientEvent::audio_commit()).await.unwrap_err();
        assert!(matches!(
            err,
            RealtimeError::ConnectionNotOpen(ConnectionState::Closed)
        ));
        let err = session.emit(ClientEvent::audio_clear()).await.unwrap_err();
        assert!(matches!(err, RealtimeError::ConnectionNotOpen(_)));
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn remote_close_fails_pending_requests() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_commit()).await }
        });
        transport.wait_for_sent(1).await;
        transport.remote_close();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RealtimeError::ConnectionClosed(_)));
        tokio::time::timeout(Duration::from_secs(1), async {
            while session.state() != ConnectionState::Closed {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("session should observe the remote close");
    }

    #[tokio::test]
    async fn close_while_pending_fails_the_request() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::response_create()).await }
        });
        transport.wait_for_sent(1).await;
        session.close().await.unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RealtimeError::ConnectionClosed(ref kind) if kind == "response.create"));
        assert_eq!(session.pending_requests(), 0);
    }
}

mod correlation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn commit_resolves_with_committed_event() {
        let transport = MockTransport::acking();
        let session = connect(&transport).await;

        let completion = session
            .send(ClientEvent::audio_commit())
            .await
            .expect("commit should complete")
            .expect("commit expects a completion");

        assert_eq!(completion.event_type(), "input_audio_buffer.committed");
        let sent = transport.sent();
        assert_eq!(sent[0]["type"], "input_audio_buffer.commit");
        assert!(sent[0]["event_id"].as_str().unwrap().starts_with("evt_"));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn caller_supplied_event_id_is_kept() {
        let transport = MockTransport::acking();
        let session = connect(&transport).await;

        session
            .send(ClientEvent::audio_clear().with_event_id("evt_mine"))
            .await
            .unwrap();
        assert_eq!(transport.sent()[0]["event_id"], "evt_mine");
    }

    #[tokio::test]
    async fn session_update_refreshes_options() {
        let transport = MockTransport::acking();
        let session = connect(&transport).await;

        let completion = session
            .send(ClientEvent::session_update(
                SessionOptions::builder().model("x").build(),
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(completion.event_type(), "session.updated");
        assert_eq!(session.options().model.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn audio_append_is_fire_and_forget() {
        let transport = MockTransport::new();
        let session = connect(&transport).await;

        let result = session
            .send(ClientEvent::audio_append_bytes(&[0, 1, 2, 3]))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(session.pending_requests(), 0);
        assert_eq!(transport.sent()[0]["type"], "input_audio_buffer.append");
        assert_eq!(transport.sent()[0]["audio"], "AAECAw==");
    }

    #[tokio::test]
    async fn emit_never_registers() {
        let transport = MockTransport::new();
        let session = connect(&transport).await;

        session.emit(ClientEvent::response_cancel()).await.unwrap();
        assert_eq!(session.pending_requests(), 0);
        assert_eq!(transport.sent()[0]["type"], "response.cancel");
    }

    #[tokio::test]
    async fn concurrent_requests_of_different_kinds_complete_independently() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let commit = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_commit()).await }
        });
        let clear = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_clear()).await }
        });
        transport.wait_for_sent(2).await;

        transport.push(json!({"type": "input_audio_buffer.cleared"}));
        let cleared = clear.await.unwrap().unwrap().unwrap();
        assert_eq!(cleared.event_type(), "input_audio_buffer.cleared");
        assert_eq!(session.pending_requests(), 1);
        assert!(!commit.is_finished());

        transport.push(json!({"type": "input_audio_buffer.committed", "item_id": "item_1"}));
        let committed = commit.await.unwrap().unwrap().unwrap();
        assert_eq!(committed.event_type(), "input_audio_buffer.committed");
    }

    #[tokio::test]
    async fn unrelated_and_malformed_frames_do_not_resolve() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let commit = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_commit()).await }
        });
        transport.wait_for_sent(1).await;

        transport.push_raw("{not json");
        transport.push(json!({"type": "response.teleported"}));
        transport.push(json!({"type": "input_audio_buffer.cleared"}));
        transport.push(json!({"type": "input_audio_buffer.committed", "item_id": "item_7"}));

        let completion = commit.await.unwrap().unwrap().unwrap();
        match completion {
            ServerEvent::InputAudioBufferCommitted(event) => assert_eq!(event.item_id, "item_7"),
            other => panic!("unexpected completion {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_completion_frame_fails_its_request() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let commit = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_commit()).await }
        });
        transport.wait_for_sent(1).await;

        transport.push(json!({"type": "input_audio_buffer.committed", "event_id": "event_5"}));

        let err = commit.await.unwrap().unwrap_err();
        assert!(matches!(err, RealtimeError::Deserialization { .. }));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn response_create_keeps_waiting_while_in_progress() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let response = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::response_create()).await }
        });
        transport.wait_for_sent(1).await;

        transport.push(response_event("response.created", "resp_1", "in_progress"));
        transport.push(text_delta("Hi"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!response.is_finished());
        assert_eq!(session.pending_requests(), 1);

        transport.push(response_event("response.done", "resp_1", "completed"));
        let done = response.await.unwrap().unwrap().unwrap();
        assert_eq!(done.response().map(|r| r.status), Some(ResponseStatus::Completed));
    }

    #[tokio::test]
    async fn failed_response_surfaces_status_and_reason() {
        let transport = MockTransport::with_responder(|frame| {
            if frame["type"] == "response.create" {
                vec![json!({
                    "type": "response.done",
                    "response": {
                        "id": "resp_9",
                        "status": "failed",
                        "status_details": {
                            "type": "failed",
                            "error": {"type": "server_error", "message": "model overloaded"}
                        }
                    }
                })]
            } else {
                vec![]
            }
        });
        let session = connect(&transport).await;

        let err = session.send(ClientEvent::response_create()).await.unwrap_err();
        match err {
            RealtimeError::ResponseFailed {
                response_id,
                status,
                reason,
            } => {
                assert_eq!(response_id, "resp_9");
                assert_eq!(status, ResponseStatus::Failed);
                assert!(reason.contains("model overloaded"));
            }
            other => panic!("expected ResponseFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn targeted_error_fails_only_its_request() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let commit = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_commit()).await }
        });
        transport.wait_for_sent(1).await;
        let delete = tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                session
                    .send(ClientEvent::item_delete("item_missing").with_event_id("evt_delete"))
                    .await
            }
        });
        transport.wait_for_sent(2).await;

        transport.push(json!({
            "type": "error",
            "event_id": "event_err",
            "error": {
                "type": "invalid_request_error",
                "code": "item_not_found",
                "message": "no such item",
                "event_id": "evt_delete"
            }
        }));

        let err = delete.await.unwrap().unwrap_err();
        let server_error = err.server_error().expect("protocol error expected");
        assert_eq!(server_error.code.as_deref(), Some("item_not_found"));
        assert!(!commit.is_finished());

        transport.push(json!({
            "type": "error",
            "error": {"type": "server_error", "message": "internal"}
        }));
        let err = commit.await.unwrap().unwrap_err();
        assert!(matches!(err, RealtimeError::Protocol(_)));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn error_about_an_emitted_event_leaves_other_requests_pending() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let commit = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(ClientEvent::audio_commit()).await }
        });
        transport.wait_for_sent(1).await;
        session
            .emit(ClientEvent::audio_append("AAAA").with_event_id("evt_append"))
            .await
            .unwrap();

        transport.push(json!({
            "type": "error",
            "error": {
                "type": "invalid_request_error",
                "message": "bad audio",
                "event_id": "evt_append"
            }
        }));
        transport.push(json!({"type": "input_audio_buffer.committed", "item_id": "item_1"}));

        let committed = commit.await.unwrap().unwrap().unwrap();
        assert_eq!(committed.event_type(), "input_audio_buffer.committed");
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn observer_sees_events_while_pending() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let response = tokio::spawn({
            let session = Arc::clone(&session);
            let seen = Arc::clone(&seen);
            async move {
                session
                    .send_with_observer(ClientEvent::response_create(), move |event| {
                        seen.lock().unwrap().push(event.event_type());
                    })
                    .await
            }
        });
        transport.wait_for_sent(1).await;
        transport.push(response_event("response.created", "resp_1", "in_progress"));
        transport.push(text_delta("Hel"));
        transport.push(response_event("response.done", "resp_1", "completed"));
        response.await.unwrap().unwrap();

        transport.push(text_delta("late"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["response.created", "response.text.delta", "response.done"]
        );
    }

    #[tokio::test]
    async fn usage_accumulates_across_responses() {
        let transport = MockTransport::with_responder(|frame| {
            if frame["type"] != "response.create" {
                return vec![];
            }
            vec![json!({
                "type": "response.done",
                "response": {
                    "id": "resp_1",
                    "status": "completed",
                    "usage": {"total_tokens": 10, "input_tokens": 4, "output_tokens": 6}
                }
            })]
        });
        let session = connect(&transport).await;

        session.send(ClientEvent::response_create()).await.unwrap();
        session.send(ClientEvent::response_create()).await.unwrap();

        let usage = session.usage();
        assert_eq!(usage.total_tokens, 20);
        assert_eq!(usage.output_tokens, 12);
    }
}

mod timeouts {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn unanswered_commit_times_out_after_configured_deadline() {
        let transport = MockTransport::new();
        let session = connect(&transport).await;
        session.set_event_timeout(Duration::from_secs(1));

        let started = tokio::time::Instant::now();
        let err = session.send(ClientEvent::audio_commit()).await.unwrap_err();

        assert!(err.is_retryable());
        match err {
            RealtimeError::Timeout {
                event_type,
                after_ms,
            } => {
                assert_eq!(event_type, "input_audio_buffer.commit");
                assert_eq!(after_ms, 1000);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(session.pending_requests(), 0);

        // A late completion finds nothing to resolve.
        transport.push(json!({"type": "input_audio_buffer.committed", "item_id": "item_1"}));
        tokio::task::yield_now().await;
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn cancellation_fails_the_request() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);
        let cancel = CancellationToken::new();

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            async move {
                session
                    .send_with_cancel(ClientEvent::audio_commit(), &cancel)
                    .await
            }
        });
        transport.wait_for_sent(1).await;
        cancel.cancel();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RealtimeError::Cancelled(_)));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn dropping_the_send_future_withdraws_the_request() {
        let transport = MockTransport::new();
        let session = connect(&transport).await;

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            session.send(ClientEvent::audio_clear()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(session.pending_requests(), 0);
    }
}

mod streaming {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn reader_receives_matching_events_in_order() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            async move {
                session
                    .receive_updates::<TextDeltaEvent, _>(
                        move |delta| {
                            let _ = tx.send(delta.delta);
                        },
                        &cancel,
                    )
                    .await
            }
        });

        // Keep pushing until the reader is collecting.
        let first = loop {
            transport.push(text_delta("A"));
            if let Ok(Some(first)) =
                tokio::time::timeout(Duration::from_millis(10), rx.recv()).await
            {
                break first;
            }
        };
        assert_eq!(first, "A");
        while let Ok(extra) = rx.try_recv() {
            assert_eq!(extra, "A");
        }

        transport.push(text_delta("B"));
        transport.push(json!({"type": "input_audio_buffer.cleared"}));
        transport.push(text_delta("C"));
        assert_eq!(rx.recv().await.as_deref(), Some("B"));
        assert_eq!(rx.recv().await.as_deref(), Some("C"));

        cancel.cancel();
        reader.await.unwrap().expect("reader should end cleanly");
    }

    #[tokio::test]
    async fn second_reader_is_rejected_without_disturbing_the_first() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            async move {
                session
                    .receive_updates::<ServerEvent, _>(
                        move |event| {
                            let _ = tx.send(event.event_type());
                        },
                        &cancel,
                    )
                    .await
            }
        });
        loop {
            transport.push(json!({"type": "input_audio_buffer.cleared"}));
            if let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await {
                break;
            }
        }

        let err = session
            .receive_updates::<ServerEvent, _>(|_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidState(_)));

        while rx.try_recv().is_ok() {}
        transport.push(text_delta("still here"));
        assert_eq!(rx.recv().await, Some("response.text.delta"));

        cancel.cancel();
        reader.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn non_matching_events_are_not_replayed_to_a_later_reader() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            async move {
                session
                    .receive_updates::<TextDeltaEvent, _>(
                        move |delta| {
                            let _ = tx.send(delta.delta);
                        },
                        &cancel,
                    )
                    .await
            }
        });
        loop {
            transport.push(text_delta("D"));
            if let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await {
                break;
            }
        }

        for index in 0..500 {
            transport.push(json!({
                "type": "response.audio.delta",
                "response_id": "resp_1",
                "item_id": "item_1",
                "output_index": 0,
                "content_index": 0,
                "delta": format!("chunk{index}")
            }));
        }
        transport.push(text_delta("E"));
        while let Some(delta) = rx.recv().await {
            if delta == "E" {
                break;
            }
        }
        cancel.cancel();
        reader.await.unwrap().unwrap();

        let later_cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let later = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = later_cancel.clone();
            async move {
                session
                    .receive_updates::<ServerEvent, _>(
                        move |event| {
                            let _ = tx.send(event.event_type());
                        },
                        &cancel,
                    )
                    .await
            }
        });
        let first = loop {
            transport.push(json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 0, "item_id": "item_2"}));
            if let Ok(Some(event_type)) =
                tokio::time::timeout(Duration::from_millis(10), rx.recv()).await
            {
                break event_type;
            }
        };
        assert_eq!(first, "input_audio_buffer.speech_started");

        later_cancel.cancel();
        later.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reader_sees_outgoing_client_events() {
        let transport = MockTransport::acking();
        let session = Arc::new(connect(&transport).await);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn({
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            async move {
                session
                    .receive_updates::<ClientEvent, _>(
                        move |event| {
                            let _ = tx.send(event.event_type());
                        },
                        &cancel,
                    )
                    .await
            }
        });
        loop {
            session.emit(ClientEvent::audio_append("AAAA")).await.unwrap();
            if let Ok(Some(event_type)) =
                tokio::time::timeout(Duration::from_millis(10), rx.recv()).await
            {
                assert_eq!(event_type, "input_audio_buffer.append");
                break;
            }
        }

        session.send(ClientEvent::audio_commit()).await.unwrap();
        while let Some(event_type) = rx.recv().await {
            if event_type == "input_audio_buffer.commit" {
                break;
            }
            assert_eq!(event_type, "input_audio_buffer.append");
        }

        cancel.cancel();
        reader.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reader_ends_when_session_closes() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);

        let reader = tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                session
                    .receive_updates::<ServerEvent, _>(|_| {}, &CancellationToken::new())
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.close().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should stop after close")
            .unwrap()
            .unwrap();

        let err = session
            .receive_updates::<ServerEvent, _>(|_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RealtimeError::ConnectionNotOpen(_)));
    }

    #[tokio::test]
    async fn updates_stream_yields_matching_events_until_close() {
        let transport = MockTransport::new();
        let session = Arc::new(connect(&transport).await);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut deltas = session.updates::<TextDeltaEvent>(CancellationToken::new());
        let reader = tokio::spawn(async move {
            while let Some(delta) = deltas.next().await {
                let _ = tx.send(delta.map(|delta| delta.delta));
            }
        });
        loop {
            transport.push(text_delta("hello"));
            if let Ok(Some(first)) = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await {
                assert_eq!(first.unwrap(), "hello");
                break;
            }
        }

        session.close().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("stream should end after close")
            .unwrap();
    }
}
