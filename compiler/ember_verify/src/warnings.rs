use ember_diagnostic::{Diagnostic, ErrorCode};
use ember_mir::{Function, MatchKind};

/// Pattern-match warnings from the function's match-site metadata.
pub(crate) fn collect(func: &Function, label: &str) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for site in &func.match_sites {
        for (index, clause) in site.unreachable_clauses() {
            out.push(
                Diagnostic::warning(ErrorCode::E2001)
                    .with_function(label)
                    .with_span(clause.span)
                    .with_message(format!(
                        "{} clause {} can never match",
                        site.kind.as_str(),
                        index + 1
                    ))
                    .with_note("earlier clauses match every value it does"),
            );
        }
        if site.fail_reachable && site.kind.warns_when_inexhaustive() {
            let raises = match site.kind {
                MatchKind::FunctionHead => "function_clause",
                _ => "case_clause",
            };
            out.push(
                Diagnostic::warning(ErrorCode::E2002)
                    .with_function(label)
                    .with_span(site.span)
                    .with_message(format!("{} has no catch-all clause", site.kind.as_str()))
                    .with_note(format!("a value no clause matches raises {raises}")),
            );
        }
    }
    out
}
