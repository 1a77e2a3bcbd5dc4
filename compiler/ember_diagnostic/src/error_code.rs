use std::fmt;

/// Error codes for all compiler diagnostics.
///
/// Format: E#### where the first digit is the phase:
/// - E1xxx: source errors found while lowering
/// - E2xxx: pattern-match warnings
/// - E3xxx: IR verification failures
/// - E9xxx: internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Source errors (E1xxx)
    /// Clauses disagree on the number of patterns
    E1001,
    /// Variable used before it is bound
    E1002,
    /// Expression not allowed in a guard
    E1003,
    /// Binary segment size refers to an unbound variable
    E1004,
    /// Call to an undefined local function
    E1005,
    /// Construct the lowering does not support
    E1006,
    /// Duplicate function definition
    E1007,

    // Pattern warnings (E2xxx)
    /// Clause can never match
    E2001,
    /// Match site has no catch-all and can fail at runtime
    E2002,

    // Verification (E3xxx)
    /// Value defined more than once or out of range
    E3001,
    /// Use not dominated by its definition
    E3002,
    /// Block not terminated, or bad successor
    E3003,
    /// Operand class does not match the signature
    E3004,
    /// Exception handler edge malformed or missing
    E3005,
    /// Try-region nesting broken
    E3006,
    /// Scoped resource live across a suspension point
    E3007,
    /// Entry block has predecessors, or a block is unreachable
    E3008,
    /// Block arguments do not match block parameters
    E3009,

    // Internal (E9xxx)
    /// Internal compiler error
    E9001,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E1007 => "E1007",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            ErrorCode::E3006 => "E3006",
            ErrorCode::E3007 => "E3007",
            ErrorCode::E3008 => "E3008",
            ErrorCode::E3009 => "E3009",
            ErrorCode::E9001 => "E9001",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::E1001 => "clauses have different numbers of patterns",
            ErrorCode::E1002 => "unbound variable",
            ErrorCode::E1003 => "illegal guard expression",
            ErrorCode::E1004 => "unbound binary segment size",
            ErrorCode::E1005 => "undefined function",
            ErrorCode::E1006 => "unsupported construct",
            ErrorCode::E1007 => "function defined more than once",
            ErrorCode::E2001 => "unreachable clause",
            ErrorCode::E2002 => "no catch-all clause",
            ErrorCode::E3001 => "single assignment violated",
            ErrorCode::E3002 => "use not dominated by definition",
            ErrorCode::E3003 => "malformed terminator",
            ErrorCode::E3004 => "operand class mismatch",
            ErrorCode::E3005 => "malformed exception edge",
            ErrorCode::E3006 => "unbalanced try region",
            ErrorCode::E3007 => "resource live across suspension",
            ErrorCode::E3008 => "unreachable block",
            ErrorCode::E3009 => "block argument mismatch",
            ErrorCode::E9001 => "internal compiler error",
        }
    }

    pub fn is_source_error(self) -> bool {
        self.as_str().starts_with("E1")
    }

    pub fn is_pattern_warning(self) -> bool {
        self.as_str().starts_with("E2")
    }

    pub fn is_verification_error(self) -> bool {
        self.as_str().starts_with("E3")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_classification() {
        assert!(ErrorCode::E1004.is_source_error());
        assert!(ErrorCode::E2001.is_pattern_warning());
        assert!(ErrorCode::E3007.is_verification_error());
        assert!(!ErrorCode::E9001.is_verification_error());
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ErrorCode::E3002.to_string(), "E3002");
    }
}
