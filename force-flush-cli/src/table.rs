//! Decision table rendering
//!
//! Runs every known lifecycle reason through the hook against a flush that
//! succeeds and one that fails, and prints what the loader would see.

use force_flush_hook::{on_load, HookConfig, HookOutcome, LoadReason, StreamFlusher};

/// Flusher that always returns the same status
struct FixedStatus(i32);

impl StreamFlusher for FixedStatus {
    fn flush(&mut self) -> i32 {
        self.0
    }
}

/// Status `fflush` returns on failure
const EOF_STATUS: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub reason: LoadReason,
    pub flush_ok: HookOutcome,
    pub flush_failed: HookOutcome,
}

pub fn decision_table(config: &HookConfig) -> Vec<TableRow> {
    LoadReason::ALL
        .iter()
        .map(|&reason| TableRow {
            reason,
            flush_ok: on_load(reason, &mut FixedStatus(0), config),
            flush_failed: on_load(reason, &mut FixedStatus(EOF_STATUS), config),
        })
        .collect()
}

fn verdict(outcome: &HookOutcome) -> &'static str {
    if outcome.is_success() {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn cell(outcome: &HookOutcome) -> String {
    format!("{} ({})", verdict(outcome), outcome)
}

pub fn render_table(config: &HookConfig) -> String {
    let rows: Vec<[String; 4]> = decision_table(config)
        .iter()
        .map(|row| {
            [
                row.reason.to_string(),
                row.reason.as_raw().to_string(),
                cell(&row.flush_ok),
                cell(&row.flush_failed),
            ]
        })
        .collect();

    let header = ["reason", "code", "flush ok", "flush failed"].map(String::from);
    let mut widths = header.clone().map(|h| h.len());
    for row in &rows {
        for (width, text) in widths.iter_mut().zip(row) {
            *width = (*width).max(text.len());
        }
    }

    let line = |cols: &[String; 4]| {
        format!(
            "{:<w0$}  {:>w1$}  {:<w2$}  {}\n",
            cols[0],
            cols[1],
            cols[2],
            cols[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        )
    };

    let mut out = format!("Detach policy: {}\n\n", config.detach_policy);
    out.push_str(&line(&header));
    out.push_str(&format!("{}\n", "-".repeat(widths.iter().sum::<usize>() + 6)));
    for row in &rows {
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use force_flush_hook::DetachPolicy;

    #[test]
    fn test_literal_table() {
        let rows = decision_table(&HookConfig::new());
        assert_eq!(rows.len(), 4);

        let attach = &rows[0];
        assert_eq!(attach.reason, LoadReason::ProcessAttach);
        assert!(attach.flush_ok.is_success());
        assert!(!attach.flush_failed.is_success());

        for row in &rows[1..] {
            assert!(!row.flush_ok.is_success());
            assert_eq!(row.flush_ok, row.flush_failed);
        }
    }

    #[test]
    fn test_conventional_table() {
        let config = HookConfig::new().with_detach_policy(DetachPolicy::Accept);
        for row in &decision_table(&config)[1..] {
            assert!(row.flush_ok.is_success());
            assert!(row.flush_failed.is_success());
        }
    }

    #[test]
    fn test_render() {
        let text = render_table(&HookConfig::new());
        assert!(text.starts_with("Detach policy: reject"));
        assert!(text.contains("process-attach"));
        assert!(text.contains("FALSE (declined process-detach)"));
    }

    #[test]
    fn test_columns_align() {
        let text = render_table(&HookConfig::new());
        let lines: Vec<&str> = text.lines().skip(2).filter(|l| !l.starts_with('-')).collect();
        assert_eq!(lines.len(), 5);

        // The last column starts at the same offset on every line
        let header_offset = lines[0].find("flush failed").unwrap();
        for line in &lines[1..] {
            let last = line.rfind("FALSE").or_else(|| line.rfind("TRUE")).unwrap();
            assert_eq!(last, header_offset, "misaligned row: {:?}", line);
        }
    }
}
