//! The matcher model: a tagged union of value acceptors over the seven
//! [`ValueKind`]s, plus the two framing-specific matcher families
//! (`CrcTail`, `RuntimeDeviceAddress`) that are not ordinary value
//! acceptors but still flow through the same state-graph machinery.

use core::fmt;

use crate::value::{Signedness, ValueKind};

/// Either an ordinary typed value acceptor, or one of the two framing
/// matchers baked in for CRC tails and runtime-configured device
/// addresses. A tagged union over classes, per the "replace class
/// hierarchies with tagged variants" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherFamily {
    /// An ordinary 8/16/32-bit integral or float value.
    Value(ValueKind),
    /// The trailing two-byte Modbus CRC. Always 16-bit unsigned; its
    /// predicate is checked post-hoc against a running CRC, not at the
    /// byte level.
    CrcTail,
    /// An 8-bit unsigned matcher whose predicate is satisfied only by a
    /// runtime-configured device address.
    RuntimeDeviceAddress,
}

impl MatcherFamily {
    /// Width in bytes (1, 2 or 4).
    #[must_use]
    pub fn size(self) -> u8 {
        match self {
            MatcherFamily::Value(v) => v.size(),
            MatcherFamily::CrcTail => 2,
            MatcherFamily::RuntimeDeviceAddress => 1,
        }
    }

    /// `true` for the two framing families that are not `ValueKind`s.
    #[must_use]
    pub fn is_framing(self) -> bool {
        !matches!(self, MatcherFamily::Value(_))
    }
}

/// The accepted-value shape of a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Wildcard — matches any value of the matcher's width.
    Any,
    /// Matches exactly one value.
    Exact(i64),
    /// Half-open range: `from` inclusive, `to` exclusive.
    Range {
        /// Inclusive lower bound.
        from: i64,
        /// Exclusive upper bound.
        to: i64,
    },
    /// Matches any of a fixed set of values.
    OneOf(Vec<i64>),
}

/// A malformed matcher declaration — raised at construction time, before
/// the value ever reaches the builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatcherError {
    /// A literal (in `Exact` or `OneOf`) is not representable in the
    /// declared width/signedness.
    #[error("value {value} is not representable in {kind}")]
    NotRepresentable {
        /// The value kind the literal was declared against.
        kind: ValueKind,
        /// The offending literal.
        value: i64,
    },
    /// A `Range` with `from >= to`, or with either bound out of range.
    #[error("invalid range [{from}, {to}) for {kind}")]
    InvalidRange {
        /// The value kind the range was declared against.
        kind: ValueKind,
        /// The inclusive lower bound supplied.
        from: i64,
        /// The exclusive upper bound supplied.
        to: i64,
    },
    /// Float matchers only support `Any` at the predicate level.
    #[error("float matchers only support the `Any` predicate")]
    FloatPredicateNotSupported,
}

/// A single typed value acceptor: a family, a predicate, and an optional
/// alias used to suggest state names.
///
/// Two matchers are equal iff their family and predicate are structurally
/// equal — the alias is deliberately excluded from equality so that two
/// commands sharing a byte-level prefix merge into one state even if
/// authored with different aliases.
#[derive(Debug, Clone)]
pub struct Matcher {
    family: MatcherFamily,
    predicate: Predicate,
    alias: Option<String>,
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.predicate == other.predicate
    }
}

impl Eq for Matcher {}

impl Matcher {
    /// A wildcard matcher over `kind` — accepts any value of that width.
    #[must_use]
    pub fn any(kind: ValueKind) -> Self {
        Matcher {
            family: MatcherFamily::Value(kind),
            predicate: Predicate::Any,
            alias: None,
        }
    }

    /// A matcher accepting exactly `value`.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError::NotRepresentable`] if `value` doesn't fit
    /// `kind`, or [`MatcherError::FloatPredicateNotSupported`] for a
    /// float kind (floats only support `Any`).
    pub fn exact(kind: ValueKind, value: i64) -> Result<Self, MatcherError> {
        if kind.signedness() == Signedness::Float {
            return Err(MatcherError::FloatPredicateNotSupported);
        }
        if !kind.represents(value) {
            return Err(MatcherError::NotRepresentable { kind, value });
        }
        Ok(Matcher {
            family: MatcherFamily::Value(kind),
            predicate: Predicate::Exact(value),
            alias: None,
        })
    }

    /// A matcher accepting `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError::InvalidRange`] if `from >= to` or either
    /// bound is out of range for `kind`, or
    /// [`MatcherError::FloatPredicateNotSupported`] for a float kind.
    pub fn range(kind: ValueKind, from: i64, to: i64) -> Result<Self, MatcherError> {
        if kind.signedness() == Signedness::Float {
            return Err(MatcherError::FloatPredicateNotSupported);
        }
        if from >= to || !kind.represents(from) || !kind.represents(to) {
            return Err(MatcherError::InvalidRange { kind, from, to });
        }
        Ok(Matcher {
            family: MatcherFamily::Value(kind),
            predicate: Predicate::Range { from, to },
            alias: None,
        })
    }

    /// A matcher accepting any of `values`.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError::NotRepresentable`] for the first value
    /// that doesn't fit `kind`, or
    /// [`MatcherError::FloatPredicateNotSupported`] for a float kind.
    pub fn one_of(kind: ValueKind, values: Vec<i64>) -> Result<Self, MatcherError> {
        if kind.signedness() == Signedness::Float {
            return Err(MatcherError::FloatPredicateNotSupported);
        }
        for &value in &values {
            if !kind.represents(value) {
                return Err(MatcherError::NotRepresentable { kind, value });
            }
        }
        Ok(Matcher {
            family: MatcherFamily::Value(kind),
            predicate: Predicate::OneOf(values),
            alias: None,
        })
    }

    /// The two-byte CRC tail matcher. Its predicate is vacuously true at
    /// the byte level; validity is checked against the running CRC.
    #[must_use]
    pub fn crc_tail() -> Self {
        Matcher {
            family: MatcherFamily::CrcTail,
            predicate: Predicate::Any,
            alias: None,
        }
    }

    /// The runtime device address matcher.
    #[must_use]
    pub fn runtime_device_address() -> Self {
        Matcher {
            family: MatcherFamily::RuntimeDeviceAddress,
            predicate: Predicate::Any,
            alias: None,
        }
    }

    /// Attaches a textual alias, used to suggest a state name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The matcher's family.
    #[must_use]
    pub fn family(&self) -> MatcherFamily {
        self.family
    }

    /// The matcher's predicate.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// The suggested alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Width in bytes (1, 2 or 4).
    #[must_use]
    pub fn size(&self) -> u8 {
        self.family.size()
    }

    /// Whether this matcher fits a callback parameter of value kind
    /// `param`.
    ///
    /// An unsigned matcher fits a parameter of width >= its own width.
    /// A narrower parameter is accepted only when the predicate
    /// demonstrably constrains the value into the parameter's
    /// representable range. `Any` never fits a parameter strictly
    /// narrower than the matcher itself.
    #[must_use]
    pub fn fits(&self, param: ValueKind) -> bool {
        let Some(kind) = self.value_kind() else {
            // CrcTail / RuntimeDeviceAddress never feed a callback parameter.
            return false;
        };

        if param.size() >= kind.size() {
            return true;
        }

        match &self.predicate {
            Predicate::Any => false,
            Predicate::Exact(v) => param.represents(*v),
            Predicate::Range { from, to } => {
                param.represents(*from) && param.represents(*to - 1)
            }
            Predicate::OneOf(values) => values.iter().all(|v| param.represents(*v)),
        }
    }

    /// Renders the byte-level test expression for this matcher against
    /// variable `var`, or `None` for a wildcard (`Any`), which has no
    /// test to render.
    #[must_use]
    pub fn render_predicate(&self, var: &str) -> Option<String> {
        match self.family {
            MatcherFamily::CrcTail => None,
            MatcherFamily::RuntimeDeviceAddress => Some(format!("{var} == device_address")),
            MatcherFamily::Value(kind) => match &self.predicate {
                Predicate::Any => None,
                Predicate::Exact(v) => Some(format!("{var} == {}", render_literal(kind, *v))),
                Predicate::Range { from, to } => {
                    if *from == 0 && kind.signedness() == Signedness::Unsigned {
                        Some(format!("{var} <= {}", render_literal(kind, *to)))
                    } else {
                        Some(format!(
                            "{var} >= {} && {var} <= {}",
                            render_literal(kind, *from),
                            render_literal(kind, *to)
                        ))
                    }
                }
                Predicate::OneOf(values) => Some(
                    values
                        .iter()
                        .map(|v| format!("{var} == {}", render_literal(kind, *v)))
                        .collect::<Vec<_>>()
                        .join(" || "),
                ),
            },
        }
    }

    /// The underlying [`ValueKind`], or `None` for the two framing
    /// families.
    #[must_use]
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self.family {
            MatcherFamily::Value(kind) => Some(kind),
            _ => None,
        }
    }
}

fn render_literal(kind: ValueKind, value: i64) -> String {
    if kind.bits() == 8 {
        format!("0x{:02x}", value as u8 as i64)
    } else {
        value.to_string()
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            MatcherFamily::CrcTail => write!(f, "CrcTail"),
            MatcherFamily::RuntimeDeviceAddress => write!(f, "RuntimeDeviceAddress"),
            MatcherFamily::Value(kind) => write!(f, "{kind}({:?})", self.predicate),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_alias() {
        let a = Matcher::exact(ValueKind::U8, 5).unwrap().with_alias("a");
        let b = Matcher::exact(ValueKind::U8, 5).unwrap().with_alias("b");
        assert_eq!(a, b);
    }

    #[test]
    fn exact_out_of_range_is_rejected() {
        assert!(Matcher::exact(ValueKind::U8, 256).is_err());
        assert!(Matcher::exact(ValueKind::U8, 255).is_ok());
    }

    #[test]
    fn range_from_must_be_less_than_to() {
        assert!(Matcher::range(ValueKind::U16, 0x100, 0x100).is_err());
        assert!(Matcher::range(ValueKind::U16, 0, 0x100).is_ok());
    }

    #[test]
    fn fits_size_conflict() {
        let narrow = Matcher::range(ValueKind::U16, 0, 0x200).unwrap();
        assert!(!narrow.fits(ValueKind::U8));
        let fits = Matcher::range(ValueKind::U16, 0, 0x100).unwrap();
        assert!(fits.fits(ValueKind::U8));
    }

    #[test]
    fn render_unsigned_range_from_zero_simplifies() {
        let m = Matcher::range(ValueKind::U16, 0, 0x100).unwrap();
        assert_eq!(m.render_predicate("c").as_deref(), Some("c <= 256"));
    }

    #[test]
    fn render_one_of_is_disjunction() {
        let m = Matcher::one_of(ValueKind::U8, vec![5, 6]).unwrap();
        assert_eq!(
            m.render_predicate("c").as_deref(),
            Some("c == 0x05 || c == 0x06")
        );
    }

    #[test]
    fn any_renders_nothing() {
        assert_eq!(Matcher::any(ValueKind::U8).render_predicate("c"), None);
    }

    #[test]
    fn float_rejects_exact() {
        assert!(Matcher::exact(ValueKind::F32, 1).is_err());
        assert_eq!(Matcher::any(ValueKind::F32).size(), 4);
    }
}
