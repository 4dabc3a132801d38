/// Version of the compiled program format embedded in every [`SparkProgram`].
///
/// [`SparkProgram`]: crate::program::SparkProgram
pub const SPARK_PROGRAM_VERSION: u32 = 1;

/// Words that cannot be used as variable or entity names.
pub const RESERVED_KEYWORDS: [&str; 16] = [
    "if", "elseif", "else", "end", "var", "entity", "wait", "log", "warn", "error", "true",
    "false", "null", "and", "or", "not",
];

pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED_KEYWORDS.contains(&word)
}
