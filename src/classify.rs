//! # Line classifier for child process diagnostics.
//!
//! ffmpeg invoked with `-loglevel error` emits one diagnostic line per
//! problem. [`Classifier::classify`] decides, per trimmed line, whether the
//! condition is survivable ([`Verdict::Benign`]) or means the current process
//! must be replaced ([`Verdict::Fatal`]).
//!
//! Matching is case-insensitive substring containment over an explicit
//! pattern list — no parsing. False positives and negatives are an accepted
//! tuning trade-off of the pattern set, not a correctness bug.

/// Outcome of classifying one line of child diagnostic output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The line is informational or a recoverable hiccup; keep the process.
    Benign,
    /// The line indicates an unrecoverable demux/decode/connection failure;
    /// the process must be restarted.
    Fatal,
}

/// Substring-based stderr classifier.
///
/// The default pattern set covers the ffmpeg failures that leave the process
/// wedged or producing garbage: demuxer errors, packet-retrieval errors,
/// connection timeouts, I/O errors, decoder errors, and trailer-write errors.
#[derive(Clone, Debug)]
pub struct Classifier {
    /// Lowercased fatal substrings.
    patterns: Vec<String>,
}

impl Classifier {
    /// Fatal substrings matched by [`Classifier::default`].
    pub const DEFAULT_FATAL_PATTERNS: &'static [&'static str] = &[
        "error during demuxing",
        "error retrieving a packet",
        "connection timed out",
        "input/output error",
        "error while decoding",
        "error writing trailer",
    ];

    /// Creates a classifier with a custom fatal pattern set.
    ///
    /// Patterns are matched case-insensitively; they are lowercased once here
    /// so `classify` only lowercases the line.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Classifies one trimmed line of child diagnostic output.
    pub fn classify(&self, line: &str) -> Verdict {
        let lower = line.to_ascii_lowercase();
        if self.patterns.iter().any(|p| lower.contains(p.as_str())) {
            Verdict::Fatal
        } else {
            Verdict::Benign
        }
    }

    /// True if the line mentions the literal token "error" (any case).
    ///
    /// Used by the errors-only forwarding mode to keep error lines visible
    /// even when they do not match a fatal pattern.
    pub fn mentions_error(line: &str) -> bool {
        line.to_ascii_lowercase().contains("error")
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_patterns(Self::DEFAULT_FATAL_PATTERNS)
    }
}
