//! Scan session tests on a paused Tokio clock

use std::time::Duration;

use async_channel::Receiver;
use common::scanner::{FramerTiming, Key, ScanEvent, ScanSession, SessionInput, Symbology};
use common::test_utils::{DEFAULT_TEST_TIMEOUT, with_timeout};

async fn type_str(session: &ScanSession, text: &str) {
    for c in text.chars() {
        session.key(Key::from_char(c)).await.unwrap();
    }
}

async fn next_scan(scans: &Receiver<ScanEvent>) -> ScanEvent {
    with_timeout(DEFAULT_TEST_TIMEOUT, scans.recv())
        .await
        .expect("no scan within timeout")
        .expect("session ended")
}

mod framing {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_enter_terminates_scan() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        session.start().await.unwrap();

        type_str(&session, "4006381333931").await;
        session.key(Key::Enter).await.unwrap();

        let scan = next_scan(&scans).await;
        assert_eq!(scan.content, "4006381333931");
        assert_eq!(scan.length, 13);
        assert_eq!(scan.symbology, Symbology::Ean13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_splits_scans() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        session.start().await.unwrap();

        type_str(&session, "123").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        type_str(&session, "456").await;

        let first = next_scan(&scans).await;
        let second = next_scan(&scans).await;
        assert_eq!(first.content, "123");
        assert_eq!(first.symbology, Symbology::Numeric);
        assert_eq!(second.content, "456");
        assert_eq!(second.symbology, Symbology::Numeric);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_flush_without_terminator() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        session.start().await.unwrap();

        type_str(&session, "lot-2024.07/b").await;

        let scan = next_scan(&scans).await;
        assert_eq!(scan.content, "lot-2024.07/b");
        assert_eq!(scan.symbology, Symbology::Code128);
        assert!(scans.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_timing() {
        let timing = FramerTiming {
            gap: Duration::from_millis(30),
            auto_flush: Duration::from_millis(50),
        };
        let (session, scans) = ScanSession::spawn(timing);
        session.start().await.unwrap();

        type_str(&session, "AB").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        type_str(&session, "CD").await;

        // keystroke characters arrive lowercased
        assert_eq!(next_scan(&scans).await.content, "ab");
        assert_eq!(next_scan(&scans).await.content, "cd");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_flush_shorter_than_gap() {
        let timing = FramerTiming {
            gap: Duration::from_millis(100),
            auto_flush: Duration::from_millis(40),
        };
        let (session, scans) = ScanSession::spawn(timing);
        session.start().await.unwrap();

        type_str(&session, "12").await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        type_str(&session, "34").await;

        assert_eq!(next_scan(&scans).await.content, "12");
        assert_eq!(next_scan(&scans).await.content, "34");
        assert!(scans.is_empty());
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_keys_dropped_while_not_listening() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());

        type_str(&session, "999").await;
        session.start().await.unwrap();
        type_str(&session, "42").await;
        session.key(Key::Enter).await.unwrap();

        assert_eq!(next_scan(&scans).await.content, "42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_partial_scan() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        session.start().await.unwrap();

        type_str(&session, "12").await;
        session.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(scans.is_empty());

        session.start().await.unwrap();
        type_str(&session, "34").await;
        session.key(Key::Enter).await.unwrap();
        assert_eq!(next_scan(&scans).await.content, "34");
    }

    #[tokio::test]
    async fn test_blocking_sender_from_thread() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        session.start().await.unwrap();

        let sender = session.clone();
        let handle = std::thread::spawn(move || {
            for c in "ABC-123".chars() {
                sender.send_blocking(SessionInput::Key(Key::from_char(c))).unwrap();
            }
            sender.send_blocking(SessionInput::Key(Key::Enter)).unwrap();
        });

        let scan = next_scan(&scans).await;
        handle.join().unwrap();
        assert_eq!(scan.content, "abc-123");
        assert_eq!(scan.symbology, Symbology::Code128);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ends_when_handles_dropped() {
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        drop(session);

        let result = with_timeout(DEFAULT_TEST_TIMEOUT, scans.recv()).await.unwrap();
        assert!(result.is_err());
    }
}
