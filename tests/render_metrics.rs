mod support;

use std::collections::HashSet;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use markpress::domain::request::ConversionDraft;

use support::{FAIL_CAPTURE_MARKER, FakeEngine, Faults, service};

#[tokio::test(start_paused = true)]
async fn conversions_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let engine = FakeEngine::new();
    let conversions = service(&engine);

    conversions
        .convert(ConversionDraft::new("# Ok", "ok.pdf"))
        .await
        .expect("conversion succeeds");
    conversions
        .convert(ConversionDraft::new("", "empty.pdf"))
        .await
        .expect_err("blank markdown");
    conversions
        .convert(ConversionDraft::new(FAIL_CAPTURE_MARKER, "broken.pdf"))
        .await
        .expect_err("capture fails");

    engine.set_faults(Faults {
        hang_fonts: true,
        ..Faults::default()
    });
    conversions
        .convert(ConversionDraft::new("# Fonts", "fonts.pdf"))
        .await
        .expect("degraded conversion succeeds");

    engine.set_faults(Faults {
        fail_fonts: true,
        ..Faults::default()
    });
    conversions
        .convert(ConversionDraft::new("# Script", "script.pdf"))
        .await
        .expect("font script error degrades the conversion");

    let snapshot = snapshotter.snapshot().into_vec();

    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in [
        "markpress_conversions_total",
        "markpress_render_ms",
        "markpress_render_sessions_active",
        "markpress_font_wait_timeouts_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let results: HashSet<String> = snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| {
            composite_key.key().name() == "markpress_conversions_total"
        })
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .filter(|label| label.key() == "result")
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    for result in ["ok", "invalid", "failed"] {
        assert!(results.contains(result), "missing result label: {result}");
    }

    let font_timeouts = snapshot
        .iter()
        .find(|(composite_key, _, _, _)| {
            composite_key.key().name() == "markpress_font_wait_timeouts_total"
        })
        .map(|(_, _, _, value)| value);
    assert!(matches!(font_timeouts, Some(DebugValue::Counter(2))));

    assert_eq!(engine.live(), 0);
}
