use std::collections::HashSet;
use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

/// Length of a platform content identifier.
pub const IDENTIFIER_LENGTH: usize = 26;

static NATIVE_ID: OnceLock<Option<Regex>> = OnceLock::new();

/// Base32 alphabet used by native identifiers.
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Generates fresh content identifiers in the platform's native format.
///
/// Identifiers are drawn from the thread-local CSPRNG. The generator also
/// remembers everything it has issued so a session never hands out the same
/// value twice.
#[derive(Debug, Default)]
pub struct IdentifierGenerator {
    issued: HashSet<String>,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a new identifier never returned before by this generator.
    pub fn generate(&mut self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let candidate: String = (0..IDENTIFIER_LENGTH)
                .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
                .collect();
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Generate an identifier that differs from `avoid` (the source id being replaced).
    pub fn generate_distinct(&mut self, avoid: &str) -> String {
        loop {
            let candidate = self.generate();
            if candidate != avoid {
                return candidate;
            }
        }
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}

/// Check that `id` looks like a native identifier.
pub fn is_native_identifier(id: &str) -> bool {
    NATIVE_ID
        .get_or_init(|| Regex::new(r"^[A-Z2-7]{26}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}
