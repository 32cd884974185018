//! The operation descriptor: a callback name, its parameter prototype,
//! and the byte offsets/decoders needed to extract each parameter from
//! the accumulated frame buffer once a terminal state is reached.

use rtu_ir::{Matcher, ValueKind};

use crate::error::BuildError;

/// One extracted callback argument: where it lives in the frame buffer
/// and how wide the decode is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    offset: usize,
    kind: ValueKind,
}

impl Extraction {
    /// The byte offset into the frame buffer this argument starts at.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The argument's value kind, which selects the decoder
    /// (`buffer[o]` for 1 byte, `ntoh(o)` for 2, `ntohl(o)` for 4).
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The decoder expression for this extraction.
    #[must_use]
    pub fn render(&self) -> String {
        match self.kind.size() {
            1 => format!("buffer[{}]", self.offset),
            2 => format!("ntoh({})", self.offset),
            4 => format!("ntohl({})", self.offset),
            other => unreachable!("value kinds are always 1, 2 or 4 bytes wide, got {other}"),
        }
    }
}

/// A named callback together with the byte extractions that feed its
/// call site, once the capture chain leading to it is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    callback: String,
    extractions: Vec<Extraction>,
}

impl Operation {
    /// Builds the operation for `callback`, validating that each
    /// prototype parameter fits the matcher feeding it and computing
    /// its byte offset into the frame buffer.
    ///
    /// `capture_chain` is the full ordered list of matchers leading to
    /// this terminal (device address first, then each command
    /// matcher). Parameters are aligned against its *tail*, right to
    /// left.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::SizeMismatch`] if a parameter does not fit
    /// the matcher aligned against it, or if `prototype` has more
    /// entries than `capture_chain` has matchers to align against.
    pub fn new(
        callback: impl Into<String>,
        prototype: &[ValueKind],
        capture_chain: &[Matcher],
    ) -> Result<Self, BuildError> {
        let callback = callback.into();
        let mut remaining: Vec<&Matcher> = capture_chain.iter().collect();
        let mut extractions = vec![None; prototype.len()];

        for (rev_index, &param) in prototype.iter().rev().enumerate() {
            let position = prototype.len() - 1 - rev_index;
            let matcher = remaining.pop().ok_or_else(|| BuildError::SizeMismatch {
                callback: callback.clone(),
                position,
                matcher: "<no matching byte>".to_string(),
                parameter: param,
            })?;

            if !matcher.fits(param) {
                return Err(BuildError::SizeMismatch {
                    callback: callback.clone(),
                    position,
                    matcher: matcher.to_string(),
                    parameter: param,
                });
            }

            let preceding: u32 = remaining.iter().map(|m| u32::from(m.size())).sum();
            let offset = preceding + u32::from(matcher.size()) - u32::from(param.size());

            extractions[position] = Some(Extraction {
                offset: offset as usize,
                kind: param,
            });
        }

        Ok(Operation {
            callback,
            extractions: extractions.into_iter().flatten().collect(),
        })
    }

    /// The callback's name.
    #[must_use]
    pub fn callback(&self) -> &str {
        &self.callback
    }

    /// The ordered, fully-resolved argument extractions.
    #[must_use]
    pub fn extractions(&self) -> &[Extraction] {
        &self.extractions
    }

    /// Renders the full call expression, e.g. `on_read(ntoh(2));`.
    #[must_use]
    pub fn render_call(&self) -> String {
        let args = self
            .extractions
            .iter()
            .map(Extraction::render)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({args});", self.callback)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rtu_ir::Matcher;

    #[test]
    fn single_u16_argument_offset() {
        // device@0x01, function 0x03, data u16(0, 0x100) -> on_read(u16)
        let chain = vec![
            Matcher::exact(ValueKind::U8, 0x01).unwrap(),
            Matcher::exact(ValueKind::U8, 0x03).unwrap(),
            Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
        ];
        let op = Operation::new("on_read", &[ValueKind::U16], &chain).unwrap();
        assert_eq!(op.render_call(), "on_read(ntoh(2));");
    }

    #[test]
    fn narrow_parameter_reads_low_bytes() {
        let chain = vec![Matcher::range(ValueKind::U16, 0, 0x100).unwrap()];
        let op = Operation::new("on_byte", &[ValueKind::U8], &chain).unwrap();
        assert_eq!(op.render_call(), "on_byte(buffer[1]);");
    }

    #[test]
    fn size_mismatch_is_reported() {
        let chain = vec![Matcher::range(ValueKind::U16, 0, 0x200).unwrap()];
        let err = Operation::new("on_x", &[ValueKind::U8], &chain).unwrap_err();
        assert!(matches!(err, BuildError::SizeMismatch { .. }));
    }
}
