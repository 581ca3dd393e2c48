#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub target: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn format_line(event: &WarnEvent<'_>) -> String {
    format!(
        "DAYLOG_WARN code={} stage={} action={} target={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.action),
        sanitize_value(event.target),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: WarnEvent<'_>) {
    eprintln!("{}", format_line(&event));
}

#[cfg(test)]
mod tests {
    use super::{WarnEvent, format_line, sanitize_value};

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn format_line_keeps_field_order() {
        let line = format_line(&WarnEvent {
            code: "REPORT_OVERWRITE",
            stage: "report",
            action: "write",
            target: "/tmp/daily 2024.md",
            reason: "exists",
            err: "",
        });
        assert_eq!(
            line,
            "DAYLOG_WARN code=REPORT_OVERWRITE stage=report action=write target=/tmp/daily_2024.md reason=exists err=na"
        );
    }
}
