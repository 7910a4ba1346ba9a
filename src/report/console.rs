use crate::replay::scenario_model::Expectation;
use crate::report::report_model::ReplaySuiteReport;

// ============================================================================
// Console reporter
// ============================================================================

/// Format a replay report for terminal output.
///
/// ```text
/// === Replay: scenarios ===
///
/// ✓ PASS  assist beats discovery (4 steps, 2 expectations)
/// ✗ FAIL  delay cancelled (6 steps, 3 expectations)
///     [FAIL] Step 5: Shown, 'Tip' shown 1 time(s) but expected 0
///
/// === Results: 1 passed, 1 failed (2 total) ===
/// ```
pub fn format_console_report(report: &ReplaySuiteReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Replay: {} ===\n", report.suite_name));
    if let Some(fingerprint) = &report.fingerprint {
        out.push_str(&format!("configuration {}\n", fingerprint));
    }
    out.push('\n');

    for result in &report.scenario_results {
        let marker = if result.passed {
            "\u{2713} PASS"
        } else {
            "\u{2717} FAIL"
        };

        out.push_str(&format!(
            "{}  {} ({} steps, {} expectations)\n",
            marker,
            result.scenario_name,
            result.steps_run,
            result.expectation_results.len()
        ));

        if let Some(error) = &result.error {
            out.push_str(&format!("    [ERROR] {}\n", error));
        }

        for er in result.expectation_results.iter().filter(|r| !r.passed) {
            let detail = er.message.as_deref().unwrap_or("expectation failed");
            let actual = er
                .actual
                .as_deref()
                .map(|a| format!(" (actual: {})", a))
                .unwrap_or_default();
            out.push_str(&format!(
                "    [FAIL] Step {}: {}, {}{}\n",
                er.step_index,
                expectation_name(&er.expectation),
                detail,
                actual
            ));
        }
    }

    out.push_str(&format!(
        "\n=== Results: {} passed, {} failed ({} total)",
        report.passed, report.failed, report.total
    ));

    if let Some(ms) = report.duration_ms {
        out.push_str(&format!(" in {:.1}s", ms as f64 / 1000.0));
    }

    out.push_str(" ===\n");
    out
}

fn expectation_name(expectation: &Expectation) -> &'static str {
    match expectation {
        Expectation::Target { .. } => "Target",
        Expectation::NoTarget => "NoTarget",
        Expectation::Armed { .. } => "Armed",
        Expectation::Mode { .. } => "Mode",
        Expectation::EntryAffordance { .. } => "EntryAffordance",
        Expectation::FlowDepth { .. } => "FlowDepth",
        Expectation::Page { .. } => "Page",
        Expectation::Event { .. } => "Event",
        Expectation::Shown { .. } => "Shown",
        Expectation::DismissRequested { .. } => "DismissRequested",
        Expectation::Listeners { .. } => "Listeners",
    }
}
