use super::types::Breakpoint;

/// Compose condition + hit-count predicate + log template into the single
/// CDP condition expression the inspector understands (§4.4). Returns
/// `None` when none of the three are present — the breakpoint pauses
/// unconditionally.
pub fn compose(bp: &Breakpoint) -> Option<String> {
    if bp.condition.is_none() && bp.hit_count.is_none() && bp.log_message.is_none() {
        return None;
    }

    let mut prefix = String::new();
    let mut clauses = Vec::new();

    if let Some(hit_count) = &bp.hit_count {
        let key = js_string_literal(&bp.id);
        prefix = format!(
            "(globalThis.__dbgHits = globalThis.__dbgHits || {{}}), \
             (globalThis.__dbgHits[{key}] = (globalThis.__dbgHits[{key}] || 0) + 1)"
        );
        let counter = format!("globalThis.__dbgHits[{key}]");
        clauses.push(hit_count.to_expression(&counter));
    }

    if let Some(condition) = &bp.condition {
        clauses.push(format!("({condition})"));
    }

    let base = if clauses.is_empty() {
        "true".to_string()
    } else {
        clauses.join(" && ")
    };

    let body = match &bp.log_message {
        Some(template) => {
            let log_call = interpolate_log_template(template);
            format!("(({base}) ? ({log_call}, false) : false)")
        }
        None => base,
    };

    Some(if prefix.is_empty() {
        body
    } else {
        format!("{prefix}, {body}")
    })
}

/// Turn a log-message template containing `{expr}` tokens into a
/// `console.log` call over a JS template literal, interpolating each
/// token as `${expr}`.
fn interpolate_log_template(template: &str) -> String {
    let mut out = String::from("console.log(`");
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                out.push_str("${");
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    out.push(inner);
                }
                out.push('}');
            }
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            _ => out.push(c),
        }
    }

    out.push_str("`)");
    out
}

fn js_string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::types::{BreakpointKind, HitCountOperator, HitCountPredicate};

    fn base_bp(id: &str) -> Breakpoint {
        Breakpoint {
            id: id.to_string(),
            kind: BreakpointKind::Line {
                file: "/app/index.ts".to_string(),
                line: 10,
                column: None,
            },
            condition: None,
            hit_count: None,
            log_message: None,
            enabled: true,
            hits: 0,
            inspector_id: None,
            locations: Vec::new(),
        }
    }

    #[test]
    fn no_predicate_composes_to_none() {
        assert_eq!(compose(&base_bp("bp-1")), None);
    }

    #[test]
    fn plain_condition_is_wrapped_in_parens() {
        let mut bp = base_bp("bp-1");
        bp.condition = Some("x > 1".to_string());
        assert_eq!(compose(&bp), Some("(x > 1)".to_string()));
    }

    #[test]
    fn hit_count_uses_a_per_breakpoint_global_counter() {
        let mut bp = base_bp("bp-2");
        bp.hit_count = Some(HitCountPredicate {
            operator: HitCountOperator::Gt,
            value: 3,
        });
        let composed = compose(&bp).unwrap();
        assert!(composed.contains("globalThis.__dbgHits['bp-2']"));
        assert!(composed.contains("> 3"));
    }

    #[test]
    fn logpoint_never_pauses() {
        let mut bp = base_bp("bp-3");
        bp.log_message = Some("x is {x}".to_string());
        let composed = compose(&bp).unwrap();
        assert!(composed.contains("console.log(`x is ${x}`)"));
        assert!(composed.ends_with("false) : false)"));
    }

    #[test]
    fn logpoint_with_condition_only_logs_when_condition_holds() {
        let mut bp = base_bp("bp-4");
        bp.condition = Some("x > 1".to_string());
        bp.log_message = Some("hit".to_string());
        let composed = compose(&bp).unwrap();
        assert!(composed.starts_with("((x > 1)) ?"));
    }
}
