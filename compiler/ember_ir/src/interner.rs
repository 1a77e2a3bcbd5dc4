//! The session atom table.
//!
//! Atoms, function names and module names all live here. Parallel module
//! compilations intern into the same table, and after the first few
//! functions almost every call is a hit served under a bucket read lock.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};

use super::Name;

/// Atoms the lowering passes and the runtime refer to by spelling.
///
/// Pre-interning them keeps their `Name`s stable across sessions created in
/// the same order, which keeps emitted output byte-identical between runs.
const WELL_KNOWN_ATOMS: &[&str] = &[
    "true",
    "false",
    "ok",
    "error",
    "throw",
    "exit",
    "undefined",
    "infinity",
    "normal",
    "badarg",
    "badarith",
    "badmatch",
    "badfun",
    "badarity",
    "badkey",
    "function_clause",
    "case_clause",
    "if_clause",
    "try_clause",
    "timeout_value",
    "system_limit",
    "nocatch",
    "erlang",
];

/// One lock's worth of the table: slot `i` holds the text of
/// `Name::pack(bucket, i)`.
#[derive(Default)]
struct Bucket {
    slots: Vec<&'static str>,
    index: FxHashMap<&'static str, u32>,
}

impl Bucket {
    fn find(&self, text: &str) -> Option<u32> {
        self.index.get(text).copied()
    }

    fn push(&mut self, text: &str) -> Option<u32> {
        let slot = u32::try_from(self.slots.len())
            .ok()
            .filter(|&slot| slot <= Name::MAX_SLOT)?;
        // Atoms live for the whole process; the runtime never collects them.
        let text: &'static str = Box::leak(text.into());
        self.slots.push(text);
        self.index.insert(text, slot);
        Some(slot)
    }
}

/// Interning failed because a bucket ran out of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    BucketFull { bucket: usize, atoms: usize },
}

impl std::fmt::Display for InternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let InternError::BucketFull { bucket, atoms } = self;
        write!(f, "atom table bucket {bucket} is full ({atoms} atoms)")
    }
}

impl std::error::Error for InternError {}

/// Concurrent atom table.
///
/// Text is spread over [`Name::BUCKETS`] buckets, each behind its own lock.
/// Share it between threads through [`SharedInterner`].
pub struct StringInterner {
    buckets: [RwLock<Bucket>; Name::BUCKETS],
    atoms: AtomicUsize,
}

impl StringInterner {
    pub fn new() -> Self {
        let interner = StringInterner {
            buckets: std::array::from_fn(|_| RwLock::new(Bucket::default())),
            atoms: AtomicUsize::new(0),
        };
        for atom in std::iter::once(&"").chain(WELL_KNOWN_ATOMS) {
            interner.intern(atom);
        }
        interner
    }

    fn bucket_of(text: &str) -> u32 {
        // Pinned so that interning it first yields `Name::EMPTY`.
        if text.is_empty() {
            return 0;
        }
        let mut hasher = FxHasher::default();
        text.hash(&mut hasher);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "the modulus keeps the value below Name::BUCKETS"
        )]
        let bucket = (hasher.finish() % Name::BUCKETS as u64) as u32;
        bucket
    }

    /// Intern `text`, reporting a full bucket instead of panicking.
    pub fn try_intern(&self, text: &str) -> Result<Name, InternError> {
        let bucket = Self::bucket_of(text);
        let lock = &self.buckets[bucket as usize];
        if let Some(slot) = lock.read().find(text) {
            return Ok(Name::pack(bucket, slot));
        }

        let mut guard = lock.write();
        // Re-check: a writer may have raced us between the two locks.
        let slot = match guard.find(text) {
            Some(slot) => slot,
            None => {
                let slot = guard.push(text).ok_or(InternError::BucketFull {
                    bucket: bucket as usize,
                    atoms: guard.slots.len(),
                })?;
                self.atoms.fetch_add(1, Ordering::Relaxed);
                slot
            }
        };
        Ok(Name::pack(bucket, slot))
    }

    /// Intern `text`.
    ///
    /// # Panics
    /// Panics when a bucket already holds `Name::MAX_SLOT` atoms.
    #[inline]
    pub fn intern(&self, text: &str) -> Name {
        self.try_intern(text).unwrap_or_else(|e| panic!("{e}"))
    }

    /// The name of `text` if it has been interned already.
    pub fn get(&self, text: &str) -> Option<Name> {
        let bucket = Self::bucket_of(text);
        self.buckets[bucket as usize]
            .read()
            .find(text)
            .map(|slot| Name::pack(bucket, slot))
    }

    /// Text of `name`, or `""` for a name this table never handed out.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.buckets[name.bucket()]
            .read()
            .slots
            .get(name.slot())
            .copied()
            .unwrap_or("")
    }

    /// Number of interned atoms, counting the empty string.
    pub fn len(&self) -> usize {
        self.atoms.load(Ordering::Relaxed)
    }

    /// True while nothing but the empty string has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for looking up interned names.
///
/// Lets printers and diagnostics accept either interner handle.
pub trait StringLookup {
    /// Look up the string for an interned name.
    fn lookup(&self, name: Name) -> &str;
}

impl StringLookup for StringInterner {
    fn lookup(&self, name: Name) -> &str {
        StringInterner::lookup(self, name)
    }
}

/// Session-owned atom table shared across parallel module compilations.
#[derive(Clone)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    /// Create a new shared interner.
    pub fn new() -> Self {
        SharedInterner(Arc::new(StringInterner::new()))
    }
}

impl Default for SharedInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl StringLookup for SharedInterner {
    fn lookup(&self, name: Name) -> &str {
        self.0.lookup(name)
    }
}
