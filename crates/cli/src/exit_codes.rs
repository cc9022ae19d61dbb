//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | Unmatched items remain (`run --strict` only)         |
//! | 2    | CLI usage error (bad args, no input source)          |
//! | 3    | Config cannot be parsed or fails validation          |
//! | 4    | Input records rejected (columns, fields, invariants) |
//! | 5    | Matching failure inside the solver                   |
//! | 6    | File read/write error                                |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `exit_code_for` or the command's error handling

use clearmatch_recon::MatchError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// `run --strict` finished but left authorizations or presentments unmatched.
pub const EXIT_UNMATCHED: u8 = 1;

/// Usage error - bad arguments, missing input source.
/// Also what clap uses for argument errors.
pub const EXIT_USAGE: u8 = 2;

/// Config file could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input data rejected: missing column, unparseable field, broken record
/// invariant, duplicate id, unknown record in `explain`.
pub const EXIT_INVALID_INPUT: u8 = 4;

/// The assignment solver reported an internal inconsistency.
pub const EXIT_MATCHING_FAILURE: u8 = 5;

/// Cannot read or write a file.
pub const EXIT_IO: u8 = 6;

/// Map an engine error to its exit code.
pub fn exit_code_for(err: &MatchError) -> u8 {
    match err {
        MatchError::ConfigParse(_) | MatchError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        MatchError::InvalidInput(_)
        | MatchError::MissingColumn { .. }
        | MatchError::FieldParse { .. } => EXIT_INVALID_INPUT,
        MatchError::MatchingFailure(_) => EXIT_MATCHING_FAILURE,
        MatchError::Io(_) => EXIT_IO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_UNMATCHED,
            EXIT_USAGE,
            EXIT_INVALID_CONFIG,
            EXIT_INVALID_INPUT,
            EXIT_MATCHING_FAILURE,
            EXIT_IO,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn engine_errors_map_to_codes() {
        assert_eq!(
            exit_code_for(&MatchError::ConfigValidation("x".into())),
            EXIT_INVALID_CONFIG
        );
        assert_eq!(
            exit_code_for(&MatchError::MissingColumn {
                source_name: "a".into(),
                column: "id".into()
            }),
            EXIT_INVALID_INPUT
        );
        assert_eq!(exit_code_for(&MatchError::Io("x".into())), EXIT_IO);
    }
}
