#![cfg(feature = "stress")]

use super::helpers::*;
use crate::speech::cache::derive_key;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

// ── Supersession Storm ──────────────────────────────────────

#[tokio::test]
async fn test_supersession_storm_settles_on_last() {
    let tmp = TempDir::new().unwrap();
    let synth = MockSynthesizer::slow("google", Duration::from_millis(20));
    let backend = MockAudioBackend::with_mode(PlayMode::Finish(Duration::from_millis(20)));
    let service = setup_service(&tmp, vec![synth.clone()], Arc::clone(&backend));

    let mut handles = Vec::new();
    for i in 0..50 {
        let s = service.clone();
        handles.push(tokio::spawn(async move {
            s.speak(&format!("Câu số {}", i)).await
        }));
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut failures = 0;
    for handle in handles {
        if handle.await.unwrap().is_err() {
            failures += 1;
        }
    }
    assert_eq!(failures, 0, "superseded invocations must resolve cleanly");

    // With the storm drained, a final invocation owns the pipeline.
    tokio_test::assert_ok!(service.speak("Câu cuối cùng").await);
    let last = backend.plays().last().cloned().expect("final text played");
    assert!(last
        .to_string_lossy()
        .contains(&derive_key("Câu cuối cùng", "vi")));
    assert!(!service.is_speech_active());
    assert!(!service.playback().is_loaded());
}

// ── Concurrent Unrelated Triggers ───────────────────────────

#[tokio::test]
async fn test_concurrent_speaks_never_wedge_the_service() {
    let tmp = TempDir::new().unwrap();
    let synth = MockSynthesizer::slow("google", Duration::from_millis(10));
    let backend = MockAudioBackend::with_mode(PlayMode::Finish(Duration::from_millis(10)));
    let service = setup_service(&tmp, vec![synth.clone()], Arc::clone(&backend));

    let mut handles = Vec::new();
    for i in 0..20 {
        let s = service.clone();
        handles.push(tokio::spawn(async move {
            s.speak(&format!("Bài học {}", i)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert!(!service.is_speech_active());
    assert!(!service.playback().is_loaded());

    // Every cached entry still points at a real file.
    for path in backend.plays() {
        if path.exists() {
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    // The service is still fully functional afterwards.
    tokio_test::assert_ok!(service.speak("Kiểm tra cuối").await);
    assert!(backend.play_count() >= 1);
}
