//! Member selection: `I,J,...,START-STOP[:STEP]` (0-based, STOP inclusive),
//! the same grammar schedulers use for array ranges.

use crate::errors::{EnsembleError, Result};
use std::fmt;

/// One member of an ensemble batch: a table row, or the run that uses every
/// parameter's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberIndex {
    Member(usize),
    Default,
}

impl MemberIndex {
    pub fn member(&self) -> Option<usize> {
        match self {
            Self::Member(i) => Some(*i),
            Self::Default => None,
        }
    }
}

impl fmt::Display for MemberIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(i) => write!(f, "{i}"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Parse a selection such as `0,2,4`, `0-4:2` or `0-4:2,5`.
pub fn parse_indices(s: &str) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(EnsembleError::Parse(format!("empty index in selection: {s:?}")));
        }
        match token.split_once('-') {
            Some((start, rest)) => {
                let (stop, step) = match rest.split_once(':') {
                    Some((stop, step)) => (stop, parse_index(step, s)?),
                    None => (rest, 1),
                };
                let (start, stop) = (parse_index(start, s)?, parse_index(stop, s)?);
                if step == 0 {
                    return Err(EnsembleError::Parse(format!("zero step in selection: {s:?}")));
                }
                if stop < start {
                    return Err(EnsembleError::Parse(format!(
                        "reversed range {token} in selection: {s:?}"
                    )));
                }
                indices.extend((start..=stop).step_by(step));
            }
            None => indices.push(parse_index(token, s)?),
        }
    }
    Ok(indices)
}

fn parse_index(tok: &str, selection: &str) -> Result<usize> {
    tok.trim().parse().map_err(|_| {
        EnsembleError::Parse(format!("invalid index {tok:?} in selection: {selection:?}"))
    })
}

/// `0-(size-1)`, the array range covering every member.
pub fn full_range(size: usize) -> Option<String> {
    size.checked_sub(1).map(|last| format!("0-{last}"))
}

/// Batch order: the explicit selection (or every row), then the default
/// sentinel when requested.
pub fn batch(selection: Option<&[usize]>, size: usize, include_default: bool) -> Vec<MemberIndex> {
    let mut out: Vec<MemberIndex> = match selection {
        Some(sel) => sel.iter().copied().map(MemberIndex::Member).collect(),
        None => (0..size).map(MemberIndex::Member).collect(),
    };
    if include_default {
        out.push(MemberIndex::Default);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn grammar_examples() {
        assert_eq!(parse_indices("0,2,4").unwrap(), vec![0, 2, 4]);
        assert_eq!(parse_indices("0-4:2").unwrap(), vec![0, 2, 4]);
        assert_eq!(parse_indices("0-4:2,5").unwrap(), vec![0, 2, 4, 5]);
        assert_eq!(parse_indices("3-3").unwrap(), vec![3]);
        assert_eq!(parse_indices(" 1 , 7-9 ").unwrap(), vec![1, 7, 8, 9]);
    }

    #[test]
    fn grammar_rejects_garbage() {
        for bad in ["", "1,,2", "a", "-1", "4-2", "0-4:0", "0-4:x", "1:2", "0-"] {
            assert!(parse_indices(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn full_range_collapses() {
        assert_eq!(full_range(6).as_deref(), Some("0-5"));
        assert_eq!(full_range(1).as_deref(), Some("0-0"));
        assert_eq!(full_range(0), None);
    }

    #[test]
    fn default_goes_last() {
        let b = batch(Some(&[3, 1][..]), 5, true);
        assert_eq!(
            b,
            vec![MemberIndex::Member(3), MemberIndex::Member(1), MemberIndex::Default]
        );
        assert_eq!(batch(None, 0, true), vec![MemberIndex::Default]);
    }

    proptest! {
        #[test]
        fn range_matches_explicit_list(start in 0usize..50, len in 0usize..50, step in 1usize..7) {
            let stop = start + len;
            let explicit: Vec<usize> = (start..=stop).step_by(step).collect();
            let listed = explicit.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",");
            prop_assert_eq!(parse_indices(&format!("{start}-{stop}:{step}")).unwrap(), explicit.clone());
            prop_assert_eq!(parse_indices(&listed).unwrap(), explicit);
        }
    }
}
