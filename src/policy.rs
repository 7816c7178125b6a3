//! Policy engine for SQL validation and safety enforcement.
//!
//! The engine is a pure lexical gate: the statement is normalized
//! (whitespace collapsed, uppercased) and checked against an ordered table
//! of named rules in fixed precedence. First match wins. There is no SQL
//! parsing here by design.
//!
//! Known limitation, documented rather than fixed: the check is lexical,
//! not syntactic. A banned keyword inside a comment or a string literal is
//! indistinguishable from an executable keyword, and encoded or obfuscated
//! tokens pass through. This layer alone is not an injection-proof barrier;
//! it exists to stop an automated client from casually issuing unsafe SQL.

use crate::config::QueryMode;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Write/DDL verbs denied in read-only mode.
pub const READ_ONLY_BANNED_VERBS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "TRUNCATE", "INSERT", "UPDATE", "DELETE", "EXEC", "EXECUTE",
    "GRANT", "DENY", "REVOKE",
];

/// Server-control verbs denied regardless of mode.
const ALWAYS_BANNED_VERBS: &[&str] = &["KILL", "SHUTDOWN"];

/// Identifier prefixes for extended/system administrative procedures,
/// denied regardless of mode.
const BANNED_PROCEDURE_PREFIXES: &[&str] = &["XP_", "SP_"];

/// The allow/deny verdict produced before any execution is attempted.
///
/// `reason` is present iff the statement was denied; a decision is never
/// both allowed and carrying a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    allowed: bool,
    reason: Option<String>,
    rule: Option<RuleKind>,
}

impl PolicyDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            rule: None,
        }
    }

    fn deny(rule: RuleKind, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            rule: Some(rule),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Category tag of the denying rule, for metrics labels.
    pub fn rule_category(&self) -> Option<&'static str> {
        self.rule.map(RuleKind::category)
    }
}

/// Named rule checks, evaluated in the order listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Empty or whitespace-only SQL.
    Empty,
    /// Statement exceeds the configured character limit.
    Length,
    /// Always-banned token regardless of mode (admin procedures, KILL, SHUTDOWN).
    AlwaysBanned,
    /// More than one statement submitted.
    MultiStatement,
    /// Read-only mode: statement contains a write/DDL verb.
    WriteVerb,
    /// Read-only mode: statement does not begin with SELECT.
    NotSelect,
}

impl RuleKind {
    /// Fixed evaluation order. First denying rule wins.
    pub const ORDER: [RuleKind; 6] = [
        RuleKind::Empty,
        RuleKind::Length,
        RuleKind::AlwaysBanned,
        RuleKind::MultiStatement,
        RuleKind::WriteVerb,
        RuleKind::NotSelect,
    ];

    pub fn category(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Length => "length",
            Self::AlwaysBanned => "banned_pattern",
            Self::MultiStatement => "multi_statement",
            Self::WriteVerb => "write_verb",
            Self::NotSelect => "not_select",
        }
    }
}

/// Normalize SQL for lexical analysis: collapse whitespace runs to single
/// spaces and uppercase. Idempotent.
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Truncated SHA-256 fingerprint of SQL text, for audit correlation
/// without exposing the text itself.
pub fn sql_digest(sql: &str) -> String {
    let hash = Sha256::digest(sql.as_bytes());
    let hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

/// Split normalized SQL into identifier-like tokens. Word boundaries are
/// any character outside `[A-Z0-9_]`, so `xp_cmdshell('x')` yields the
/// whole procedure name as one token.
fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
}

/// Pure lexical policy engine. Deterministic, no side effects, safe to
/// call concurrently.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    mode: QueryMode,
    max_query_length: usize,
}

impl PolicyEngine {
    pub fn new(mode: QueryMode, max_query_length: usize) -> Self {
        Self {
            mode,
            max_query_length,
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Evaluate a statement against the rule table in fixed precedence.
    pub fn evaluate(&self, sql: &str) -> PolicyDecision {
        let normalized = normalize_sql(sql);
        for rule in RuleKind::ORDER {
            if let Some(reason) = self.check(rule, sql, &normalized) {
                return PolicyDecision::deny(rule, reason);
            }
        }
        PolicyDecision::allow()
    }

    fn check(&self, rule: RuleKind, raw: &str, normalized: &str) -> Option<String> {
        match rule {
            RuleKind::Empty => {
                if raw.trim().is_empty() {
                    Some("Empty SQL query".to_string())
                } else {
                    None
                }
            }
            RuleKind::Length => {
                if raw.chars().count() > self.max_query_length {
                    Some(format!(
                        "Query exceeds maximum length of {} characters",
                        self.max_query_length
                    ))
                } else {
                    None
                }
            }
            RuleKind::AlwaysBanned => check_always_banned(normalized),
            RuleKind::MultiStatement => {
                // A single trailing terminator is tolerated; any other
                // semicolon means a multi-statement submission.
                let trimmed = raw.trim();
                let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
                if body.contains(';') {
                    Some("Multi-statement queries are not allowed".to_string())
                } else {
                    None
                }
            }
            RuleKind::WriteVerb => {
                if self.mode != QueryMode::ReadOnly {
                    return None;
                }
                for token in tokens(normalized) {
                    if READ_ONLY_BANNED_VERBS.contains(&token) {
                        return Some(format!("Query contains write operation: {}", token));
                    }
                }
                None
            }
            RuleKind::NotSelect => {
                if self.mode != QueryMode::ReadOnly {
                    return None;
                }
                if tokens(normalized).next() == Some("SELECT") {
                    None
                } else {
                    Some("Only SELECT queries are allowed in read-only mode".to_string())
                }
            }
        }
    }

    /// Human-readable explanation of the policy currently in force.
    pub fn explain(&self, max_rows: usize, query_timeout_secs: u64) -> serde_json::Value {
        json!({
            "query_mode": self.mode.as_str(),
            "max_rows_per_query": max_rows,
            "query_timeout_seconds": query_timeout_secs,
            "max_query_length_chars": self.max_query_length,
            "always_banned": {
                "procedure_prefixes": BANNED_PROCEDURE_PREFIXES,
                "verbs": ALWAYS_BANNED_VERBS,
            },
            "banned_verbs": if self.mode == QueryMode::ReadOnly {
                READ_ONLY_BANNED_VERBS.to_vec()
            } else {
                Vec::new()
            },
            "allowed_tools": [
                "execute_sql",
                "list_schemas",
                "list_tables",
                "schema_discovery",
                "get_database_info",
                "get_policy_info",
                "check_db_connection",
            ],
        })
    }
}

fn check_always_banned(normalized: &str) -> Option<String> {
    for token in tokens(normalized) {
        for prefix in BANNED_PROCEDURE_PREFIXES {
            // Require at least one character after the prefix so a bare
            // "SP_" quoted fragment does not trip the rule.
            if token.starts_with(prefix) && token.len() > prefix.len() {
                return Some(format!(
                    "Query invokes a restricted system procedure: {}",
                    token
                ));
            }
        }
        if ALWAYS_BANNED_VERBS.contains(&token) {
            return Some(format!("Query contains banned statement: {}", token));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_only() -> PolicyEngine {
        PolicyEngine::new(QueryMode::ReadOnly, 50_000)
    }

    fn write_mode() -> PolicyEngine {
        PolicyEngine::new(QueryMode::Write, 50_000)
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    #[test]
    fn test_normalize_collapses_whitespace_and_uppercases() {
        assert_eq!(normalize_sql("  select\t *\n from  t "), "SELECT * FROM T");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let s = "select  a,\n b FROM t";
        assert_eq!(normalize_sql(&normalize_sql(s)), normalize_sql(s));
    }

    #[test]
    fn test_normalize_is_case_insensitive() {
        assert_eq!(normalize_sql("select"), normalize_sql("SELECT"));
    }

    // =========================================================================
    // Rule precedence
    // =========================================================================

    #[test]
    fn test_empty_query_denied() {
        let decision = read_only().evaluate("   \n\t ");
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("Empty"));
        assert_eq!(decision.rule_category(), Some("empty"));
    }

    #[test]
    fn test_length_limit_denied_with_limit_in_reason() {
        let engine = PolicyEngine::new(QueryMode::ReadOnly, 50_000);
        let sql = format!("SELECT '{}'", "x".repeat(50_001));
        let decision = engine.evaluate(&sql);
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("50000"));
        assert_eq!(decision.rule_category(), Some("length"));
    }

    #[test]
    fn test_length_exactly_at_limit_passes_rule() {
        let engine = PolicyEngine::new(QueryMode::ReadOnly, 10);
        // 10 chars exactly
        let decision = engine.evaluate("SELECT 123");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_empty_checked_before_length() {
        let engine = PolicyEngine::new(QueryMode::ReadOnly, 1);
        let decision = engine.evaluate("   ");
        assert_eq!(decision.rule_category(), Some("empty"));
    }

    // =========================================================================
    // Always-banned patterns (independent of mode)
    // =========================================================================

    #[test]
    fn test_xp_procedure_denied_in_any_mode() {
        for engine in [read_only(), write_mode()] {
            let decision = engine.evaluate("EXEC xp_cmdshell 'dir'");
            assert!(!decision.is_allowed());
            assert!(decision.reason().unwrap().contains("XP_CMDSHELL"));
            assert_eq!(decision.rule_category(), Some("banned_pattern"));
        }
    }

    #[test]
    fn test_sp_procedure_denied() {
        let decision = write_mode().evaluate("sp_configure 'show advanced options', 1");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_kill_denied_in_write_mode() {
        let decision = write_mode().evaluate("KILL 53");
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("KILL"));
    }

    #[test]
    fn test_shutdown_denied_any_case_any_whitespace() {
        let decision = write_mode().evaluate("  shutdown\n  ");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_kill_as_substring_not_matched() {
        // Whole-token matching: KILLED is a different identifier.
        let decision = read_only().evaluate("SELECT killed FROM incidents");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_column_named_like_prefix_in_middle_not_matched() {
        // "expired" contains neither token XP_ nor SP_ at a token start.
        let decision = read_only().evaluate("SELECT expired, spend FROM budgets");
        assert!(decision.is_allowed());
    }

    // =========================================================================
    // Multi-statement
    // =========================================================================

    #[test]
    fn test_multi_statement_denied() {
        let decision = read_only().evaluate("SELECT * FROM a; SELECT * FROM b");
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("Multi-statement"));
        assert_eq!(decision.rule_category(), Some("multi_statement"));
    }

    #[test]
    fn test_single_trailing_terminator_tolerated() {
        let decision = read_only().evaluate("SELECT 1;");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_two_trailing_terminators_denied() {
        // Exactly one trailing terminator is stripped; the second counts.
        let decision = read_only().evaluate("SELECT 1;;");
        assert!(!decision.is_allowed());
        assert_eq!(decision.rule_category(), Some("multi_statement"));
    }

    // =========================================================================
    // Read-only mode
    // =========================================================================

    #[test]
    fn test_select_allowed_in_read_only() {
        let decision = read_only().evaluate("SELECT 1");
        assert!(decision.is_allowed());
        assert_eq!(decision.reason(), None);
    }

    #[test]
    fn test_drop_denied_with_verb_in_reason() {
        let decision = read_only().evaluate("DROP TABLE T");
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("DROP"));
        assert_eq!(decision.rule_category(), Some("write_verb"));
    }

    #[test]
    fn test_each_write_verb_denied_in_read_only() {
        let engine = read_only();
        for verb in READ_ONLY_BANNED_VERBS {
            let sql = format!("SELECT 1 WHERE x = '{0}' OR {0} something", verb);
            let decision = engine.evaluate(&sql);
            assert!(!decision.is_allowed(), "verb {} should be denied", verb);
            assert!(decision.reason().unwrap().contains(verb));
        }
    }

    #[test]
    fn test_write_verb_case_insensitive() {
        let decision = read_only().evaluate("delete from t where id = 1");
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("DELETE"));
    }

    #[test]
    fn test_non_select_denied_even_without_banned_verb() {
        let decision = read_only().evaluate("EXPLAIN SELECT 1");
        assert!(!decision.is_allowed());
        assert_eq!(decision.rule_category(), Some("not_select"));
    }

    #[test]
    fn test_with_cte_denied_in_read_only() {
        // Lexical rule: the statement must begin with SELECT, so CTEs are
        // rejected even though they are reads.
        let decision = read_only().evaluate("WITH x AS (SELECT 1) SELECT * FROM x");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_insert_allowed_in_write_mode() {
        let decision = write_mode().evaluate("INSERT INTO t (a) VALUES (1)");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_ddl_mode_applies_only_base_rules() {
        let engine = PolicyEngine::new(QueryMode::Ddl, 50_000);
        assert!(engine.evaluate("CREATE TABLE t (id INT)").is_allowed());
        assert!(!engine.evaluate("KILL 10").is_allowed());
        assert!(!engine.evaluate("CREATE TABLE a (x INT); DROP TABLE b").is_allowed());
    }

    // =========================================================================
    // Documented lexical blind spots — pinned, not fixed
    // =========================================================================

    #[test]
    fn test_banned_keyword_in_string_literal_still_denied() {
        let decision = read_only().evaluate("SELECT * FROM logs WHERE msg = 'DROP TABLE users'");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_banned_keyword_in_comment_still_denied() {
        let decision = read_only().evaluate("SELECT 1 -- drop later");
        assert!(!decision.is_allowed());
    }

    // =========================================================================
    // Digest
    // =========================================================================

    #[test]
    fn test_digest_is_fixed_length_hex() {
        let digest = sql_digest("SELECT 1");
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_differs_for_different_sql() {
        assert_ne!(sql_digest("SELECT 1"), sql_digest("SELECT 2"));
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(sql_digest("SELECT 1"), sql_digest("SELECT 1"));
    }

    // =========================================================================
    // Policy explanation
    // =========================================================================

    #[test]
    fn test_explain_reports_mode_and_limits() {
        let info = read_only().explain(1000, 30);
        assert_eq!(info["query_mode"], "read_only");
        assert_eq!(info["max_rows_per_query"], 1000);
        assert!(info["banned_verbs"].as_array().unwrap().len() > 0);
    }

    #[test]
    fn test_explain_write_mode_has_no_banned_verbs() {
        let info = write_mode().explain(1000, 30);
        assert_eq!(info["banned_verbs"].as_array().unwrap().len(), 0);
    }
}
