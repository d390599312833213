//! Cache Key Construction
//!
//! Turns the arguments of a call into a [`CacheKey`]. The key is kept as
//! flat as possible:
//!
//! 1. positional arguments, in order;
//! 2. if keyword arguments are present, a keyword marker followed by each
//!    name and value in the order the caller gave them;
//! 3. with `typed`, the [`ArgKind`] of every positional and keyword value;
//! 4. otherwise a lone integer or text argument is used directly as the key
//!    (with geo-partitioning: its text joined to the zone identifiers);
//! 5. with geo-partitioning, the current zone identifiers;
//! 6. everything else is wrapped in a [`HashedSeq`], which hashes once.
//!
//! Keyword order matters: `f(x=1, y=2)` and `f(y=2, x=1)` are cached
//! separately.
//!
//! # Loose equality
//!
//! Integers and floats compare by numeric value, so `Int(3) == Float(3.0)`
//! and both hash alike. Pass `typed = true` to keep them apart. A NaN float
//! is not equal to itself and is rejected with
//! [`CacheError::UnhashableKey`].

use crate::error::{CacheError, Result};
use crate::zone::ZoneSource;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::sync::Arc;

/// A single call argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// The unit value.
    Unit,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number. NaN cannot be used in a key.
    Float(f64),
    /// Text.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An ordered group of arguments.
    Tuple(Vec<Arg>),
}

/// The runtime kind of an [`Arg`], used by typed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// [`Arg::Unit`]
    Unit,
    /// [`Arg::Bool`]
    Bool,
    /// [`Arg::Int`]
    Int,
    /// [`Arg::Float`]
    Float,
    /// [`Arg::Str`]
    Str,
    /// [`Arg::Bytes`]
    Bytes,
    /// [`Arg::Tuple`]
    Tuple,
}

/// Returns the integer a float is exactly equal to, if any.
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl Arg {
    /// Returns the kind of this argument.
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Unit => ArgKind::Unit,
            Arg::Bool(_) => ArgKind::Bool,
            Arg::Int(_) => ArgKind::Int,
            Arg::Float(_) => ArgKind::Float,
            Arg::Str(_) => ArgKind::Str,
            Arg::Bytes(_) => ArgKind::Bytes,
            Arg::Tuple(_) => ArgKind::Tuple,
        }
    }

    /// Returns the value as an integer, accepting floats with no fractional part.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(i) => Some(*i),
            Arg::Float(f) => integral(*f),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Int(i) => Some(*i as f64),
            Arg::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text of a [`Arg::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Fails if this argument, or anything nested in it, cannot be hashed.
    fn check_hashable(&self) -> Result<()> {
        match self {
            Arg::Float(f) if f.is_nan() => Err(CacheError::UnhashableKey(String::from(
                "NaN is not equal to itself",
            ))),
            Arg::Tuple(items) => items.iter().try_for_each(Arg::check_hashable),
            _ => Ok(()),
        }
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Unit, Arg::Unit) => true,
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Float(a), Arg::Float(b)) => a == b,
            (Arg::Int(i), Arg::Float(f)) | (Arg::Float(f), Arg::Int(i)) => integral(*f) == Some(*i),
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::Bytes(a), Arg::Bytes(b)) => a == b,
            (Arg::Tuple(a), Arg::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

// Reflexive for everything `build_key` accepts; NaN is rejected there.
impl Eq for Arg {}

impl Hash for Arg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Arg::Unit => state.write_u8(0),
            Arg::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Arg::Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Arg::Float(f) => match integral(*f) {
                Some(i) => {
                    state.write_u8(2);
                    i.hash(state);
                }
                None => {
                    state.write_u8(3);
                    f.to_bits().hash(state);
                }
            },
            Arg::Str(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Arg::Bytes(b) => {
                state.write_u8(5);
                b.hash(state);
            }
            Arg::Tuple(items) => {
                state.write_u8(6);
                items.hash(state);
            }
        }
    }
}

impl From<()> for Arg {
    fn from(_: ()) -> Self {
        Arg::Unit
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<u32> for Arg {
    fn from(i: u32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Arg::Float(f)
    }
}

impl From<f32> for Arg {
    fn from(f: f32) -> Self {
        Arg::Float(f64::from(f))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(b)
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::Tuple(items)
    }
}

/// The arguments of one call: positional values plus ordered keyword values.
///
/// ```
/// use memo_cache::key::{Arg, Args};
///
/// let args = Args::new().arg(2).arg("x").kwarg("scale", 1.5);
/// assert_eq!(args.get(0), Some(&Arg::Int(2)));
/// assert_eq!(args.kwarg_value("scale"), Some(&Arg::Float(1.5)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Arg>,
    keywords: Vec<(String, Arg)>,
}

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Arg>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Appends a keyword argument. Order is significant for keying.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    /// Keyword arguments in call order.
    pub fn keywords(&self) -> &[(String, Arg)] {
        &self.keywords
    }

    /// Returns the positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.positional.get(index)
    }

    /// Returns the first keyword argument called `name`.
    pub fn kwarg_value(&self, name: &str) -> Option<&Arg> {
        self.keywords
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Args {
            positional: iter.into_iter().collect(),
            keywords: Vec::new(),
        }
    }
}

/// One element of composite key material.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Arg(Arg),
    /// Separates positional from keyword material. Not an `Arg`, so no
    /// argument can ever equal it.
    KwMark,
    Name(String),
    Kind(ArgKind),
    Zone(String),
}

/// Composite key material whose hash is computed once, at construction.
///
/// Hashing a `HashedSeq` only feeds the stored hash to the hasher, so the
/// index can hash a key many times without re-walking its parts. Equality
/// is element-wise.
#[derive(Debug, Clone)]
pub struct HashedSeq {
    parts: Arc<[KeyPart]>,
    hash: u64,
}

impl HashedSeq {
    fn new(parts: Vec<KeyPart>) -> Self {
        let mut hasher = DefaultHasher::new();
        parts.hash(&mut hasher);
        HashedSeq {
            parts: parts.into(),
            hash: hasher.finish(),
        }
    }

    /// Number of elements in the key material.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the key material is empty (a call with no arguments).
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl PartialEq for HashedSeq {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.parts == other.parts
    }
}

impl Eq for HashedSeq {}

impl Hash for HashedSeq {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// A key derived from call arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Fast path for a lone integer argument.
    Int(i64),
    /// Fast path for a lone text argument, or its geo-partitioned form.
    Str(String),
    /// Everything else.
    Hashed(HashedSeq),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Int(i) => write!(f, "{i}"),
            CacheKey::Str(s) => f.write_str(s),
            CacheKey::Hashed(seq) => write!(f, "<{} parts, hash {:016x}>", seq.len(), seq.hash),
        }
    }
}

/// Separator between a fast-path value and the zone identifiers.
const ZONE_SEPARATOR: char = '_';

/// Builds the cache key for one call.
///
/// Geo-partitioning is enabled by passing a zone source.
///
/// # Errors
///
/// [`CacheError::UnhashableKey`] if any argument, positional or keyword,
/// is or contains a NaN float.
///
/// # Examples
///
/// ```
/// use memo_cache::key::{build_key, Arg, CacheKey};
///
/// // a lone integer is its own key
/// let key = build_key(&[Arg::Int(3)], &[], false, None).unwrap();
/// assert_eq!(key, CacheKey::Int(3));
///
/// // 3.0 collapses to the same key unless typed
/// assert_eq!(build_key(&[Arg::Float(3.0)], &[], false, None).unwrap(), key);
/// assert_ne!(build_key(&[Arg::Float(3.0)], &[], true, None).unwrap(),
///            build_key(&[Arg::Int(3)], &[], true, None).unwrap());
/// ```
pub fn build_key(
    args: &[Arg],
    kwargs: &[(String, Arg)],
    typed: bool,
    zones: Option<&dyn ZoneSource>,
) -> Result<CacheKey> {
    args.iter()
        .chain(kwargs.iter().map(|(_, v)| v))
        .try_for_each(Arg::check_hashable)?;

    if !typed && kwargs.is_empty() {
        if let [only] = args {
            if let Some(fast) = fast_key(only) {
                return Ok(match zones {
                    Some(zones) => CacheKey::Str(zone_suffixed(&fast, zones)),
                    None => fast,
                });
            }
        }
    }

    let mut parts = Vec::with_capacity(args.len() + 2 * kwargs.len() + 3);
    parts.extend(args.iter().cloned().map(KeyPart::Arg));
    if !kwargs.is_empty() {
        parts.push(KeyPart::KwMark);
        for (name, value) in kwargs {
            parts.push(KeyPart::Name(name.clone()));
            parts.push(KeyPart::Arg(value.clone()));
        }
    }
    if typed {
        parts.extend(args.iter().map(|a| KeyPart::Kind(a.kind())));
        parts.extend(kwargs.iter().map(|(_, v)| KeyPart::Kind(v.kind())));
    }
    if let Some(zones) = zones {
        parts.extend(zones.zone_names().into_iter().map(KeyPart::Zone));
    }
    Ok(CacheKey::Hashed(HashedSeq::new(parts)))
}

/// The fast-path key for a lone scalar, if it is one.
fn fast_key(arg: &Arg) -> Option<CacheKey> {
    match arg {
        Arg::Int(_) | Arg::Float(_) => arg.as_int().map(CacheKey::Int),
        Arg::Str(s) => Some(CacheKey::Str(s.clone())),
        _ => None,
    }
}

fn zone_suffixed(fast: &CacheKey, zones: &dyn ZoneSource) -> String {
    let mut text = fast.to_string();
    for zone in zones.zone_names() {
        text.push(ZONE_SEPARATOR);
        text.push_str(&zone);
    }
    text
}

/// Builds keys with a fixed typing and partitioning policy.
#[derive(Clone, Default)]
pub struct KeyBuilder {
    typed: bool,
    zones: Option<Arc<dyn ZoneSource>>,
}

impl KeyBuilder {
    /// Creates a builder; `typed` keeps arguments of different kinds apart.
    pub fn new(typed: bool) -> Self {
        KeyBuilder { typed, zones: None }
    }

    /// Enables geo-partitioning with the given zone source.
    pub fn geo_partitioned(mut self, zones: Arc<dyn ZoneSource>) -> Self {
        self.zones = Some(zones);
        self
    }

    /// Builds the key for `args`.
    pub fn build(&self, args: &Args) -> Result<CacheKey> {
        build_key(
            args.positional(),
            args.keywords(),
            self.typed,
            self.zones.as_deref(),
        )
    }
}

impl fmt::Debug for KeyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBuilder")
            .field("typed", &self.typed)
            .field("geo_partitioned", &self.zones.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::FixedZone;

    fn key(args: &Args, typed: bool) -> CacheKey {
        build_key(args.positional(), args.keywords(), typed, None).unwrap()
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_fast_path_scalars() {
        assert_eq!(key(&Args::new().arg(7), false), CacheKey::Int(7));
        assert_eq!(
            key(&Args::new().arg("abc"), false),
            CacheKey::Str(String::from("abc"))
        );
        assert_eq!(key(&Args::new().arg(7.0), false), CacheKey::Int(7));
        assert!(matches!(
            key(&Args::new().arg(7.5), false),
            CacheKey::Hashed(_)
        ));
        assert!(matches!(
            key(&Args::new().arg(true), false),
            CacheKey::Hashed(_)
        ));
    }

    #[test]
    fn test_typed_keeps_int_and_float_apart() {
        let int = key(&Args::new().arg(3), true);
        let float = key(&Args::new().arg(3.0), true);
        assert_ne!(int, float);
        assert_eq!(int, key(&Args::new().arg(3), true));
    }

    #[test]
    fn test_untyped_multi_arg_loose_equality() {
        let a = key(&Args::new().arg(1).arg(2.0), false);
        let b = key(&Args::new().arg(1.0).arg(2), false);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_keywords_cannot_collide_with_positionals() {
        let positional = key(&Args::new().arg("x").arg(1), false);
        let keyword = key(&Args::new().kwarg("x", 1), false);
        assert_ne!(positional, keyword);

        let CacheKey::Hashed(seq) = keyword else {
            panic!("keyword calls never take the fast path");
        };
        // marker, name, value
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn test_keyword_order_is_significant() {
        let xy = key(&Args::new().kwarg("x", 1).kwarg("y", 2), false);
        let yx = key(&Args::new().kwarg("y", 2).kwarg("x", 1), false);
        assert_ne!(xy, yx);
    }

    #[test]
    fn test_typed_appends_kinds() {
        let args = Args::new().arg(1).arg("a").kwarg("k", 2.5);
        let CacheKey::Hashed(seq) = key(&args, true) else {
            panic!("typed keys are always composite");
        };
        // 2 positional + marker + name + value + 3 kinds
        assert_eq!(seq.len(), 8);
    }

    #[test]
    fn test_geo_fast_path_is_suffixed_text() {
        let zone = FixedZone::new(["GMT", "BST"]);
        let key = build_key(&[Arg::Int(1)], &[], false, Some(&zone)).unwrap();
        assert_eq!(key, CacheKey::Str(String::from("1_GMT_BST")));
    }

    #[test]
    fn test_geo_composite_includes_zones() {
        let london = FixedZone::new(["GMT", "BST"]);
        let toronto = FixedZone::new(["EST", "EDT"]);
        let args = [Arg::Int(1), Arg::Int(2)];
        let a = build_key(&args, &[], false, Some(&london)).unwrap();
        let b = build_key(&args, &[], false, Some(&toronto)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, build_key(&args, &[], false, Some(&london)).unwrap());
    }

    #[test]
    fn test_nan_is_unhashable() {
        let err = build_key(&[Arg::Float(f64::NAN)], &[], false, None).unwrap_err();
        assert!(matches!(err, CacheError::UnhashableKey(_)));

        let nested = Arg::Tuple(vec![Arg::Int(1), Arg::Float(f64::NAN)]);
        let kwargs = [(String::from("t"), nested)];
        assert!(build_key(&[], &kwargs, true, None).is_err());
    }

    #[test]
    fn test_no_arguments() {
        let CacheKey::Hashed(seq) = key(&Args::new(), false) else {
            panic!("an empty call is composite");
        };
        assert!(seq.is_empty());
        assert_eq!(key(&Args::new(), false), key(&Args::new(), false));
    }

    #[test]
    fn test_hashed_seq_hash_is_cached() {
        let a = HashedSeq::new(vec![KeyPart::Arg(Arg::Int(1)), KeyPart::KwMark]);
        let b = HashedSeq::new(vec![KeyPart::Arg(Arg::Int(1)), KeyPart::KwMark]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(a.hash);
        assert_eq!(hash_of(&a), hasher.finish());
    }

    #[test]
    fn test_arg_accessors() {
        assert_eq!(Arg::Float(4.0).as_int(), Some(4));
        assert_eq!(Arg::Float(4.5).as_int(), None);
        assert_eq!(Arg::Int(2).as_float(), Some(2.0));
        assert_eq!(Arg::from("s").as_str(), Some("s"));
        assert_eq!(Arg::Float(1e300).as_int(), None);
        assert_eq!(Arg::Float(-0.0), Arg::Int(0));
        assert_eq!(Arg::from(()).kind(), ArgKind::Unit);
        assert_eq!(Arg::from(vec![1u8, 2]).kind(), ArgKind::Bytes);
    }

    #[test]
    fn test_key_builder_policy() {
        let builder = KeyBuilder::new(true);
        let a = builder.build(&Args::new().arg(3)).unwrap();
        let b = builder.build(&Args::new().arg(3.0)).unwrap();
        assert_ne!(a, b);

        let geo = KeyBuilder::new(false).geo_partitioned(Arc::new(FixedZone::new(["UTC"])));
        assert_eq!(
            geo.build(&Args::new().arg("q")).unwrap(),
            CacheKey::Str(String::from("q_UTC"))
        );
        assert_eq!(
            format!("{geo:?}"),
            "KeyBuilder { typed: false, geo_partitioned: true }"
        );
    }
}
