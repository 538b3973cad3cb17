//! CLI Exit Code Registry
//!
//! Every exit status the `runpad` binary can return is defined here.
//! Scripts and CI jobs branch on these, so treat them as stable.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error, or at least one fixture failed (`test`)   |
//! | 2    | Usage error (bad arguments, too many values)             |
//! | 3    | Not found (unknown function, function without fixture)  |
//! | 4    | User script failed to load                               |
//! | 5    | Fixture file failed to load                              |
//! | 6    | Function invocation returned an error (`run`)            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Add a `CliError` constructor and wire it into the command

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error. Also returned by `test` when any fixture fails, so a
/// failing suite looks like a failing command to CI.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Lookup (3)
// =============================================================================

/// Named function is not registered, or has no fixture to test.
pub const EXIT_NOT_FOUND: u8 = 3;

// =============================================================================
// Loading (4-5)
// =============================================================================

/// The Lua script exists but could not be read, compiled, or run, or its
/// `fixtures` table is malformed.
pub const EXIT_SCRIPT: u8 = 4;

/// The JSON fixture file could not be read or parsed.
pub const EXIT_FIXTURES: u8 = 5;

// =============================================================================
// Invocation (6)
// =============================================================================

/// The function raised an error, or its arguments did not match the
/// declared parameters.
pub const EXIT_INVOKE: u8 = 6;
