//! How a run treats elements already marked as placed.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::element::FabricationElement;
use crate::error::FabError;

/// Operator's choice before fabrication starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditSequence {
    /// Place everything regardless of markers
    PlaceAll,
    /// Place only what comes after the highest placed index
    RespectPlaced,
    /// Start at this index; everything before counts as placed
    StartAt(usize),
    /// Place exactly these indices; everything else counts as placed
    Selection(BTreeSet<usize>),
}

impl EditSequence {
    /// Whether the element at `index` is to be treated as already placed.
    fn keeps_placed(&self, index: usize, highest_placed: Option<usize>) -> bool {
        match self {
            EditSequence::PlaceAll => false,
            EditSequence::RespectPlaced => highest_placed.is_some_and(|max| index <= max),
            EditSequence::StartAt(start) => index < *start,
            EditSequence::Selection(selected) => !selected.contains(&index),
        }
    }

    /// Rewrite `placed` flags in place. Newly placed elements are stamped
    /// with `now`; unplaced ones lose their timestamps and cycle times.
    pub fn apply(&self, elements: &mut [FabricationElement], now: DateTime<Utc>) {
        let highest_placed = elements.iter().rposition(|e| e.placed);
        for (index, elem) in elements.iter_mut().enumerate() {
            if self.keeps_placed(index, highest_placed) {
                if elem.time_placed.is_none() {
                    elem.mark_placed(now);
                } else {
                    elem.placed = true;
                }
            } else {
                elem.mark_unplaced();
            }
        }
    }
}

/// Source of the edit-sequence decision, usually a human at a terminal.
pub trait Operator {
    fn choose_sequence(&mut self, elements: &[FabricationElement]) -> Result<EditSequence, FabError>;
}

/// A fixed answer, for unattended runs and tests.
impl Operator for EditSequence {
    fn choose_sequence(&mut self, _elements: &[FabricationElement]) -> Result<EditSequence, FabError> {
        Ok(self.clone())
    }
}

/// Parse `"0-3,7,9-10"` into indices, checking each is below `len`.
pub fn parse_selection(input: &str, len: usize) -> Result<BTreeSet<usize>, FabError> {
    let invalid = |part: &str| FabError::Validation(format!("invalid selection '{}'", part.trim()));
    let mut selected = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (
                a.trim().parse::<usize>().map_err(|_| invalid(part))?,
                b.trim().parse::<usize>().map_err(|_| invalid(part))?,
            ),
            None => {
                let n = part.parse::<usize>().map_err(|_| invalid(part))?;
                (n, n)
            }
        };
        if start > end || end >= len {
            return Err(FabError::Validation(format!(
                "selection '{}' is outside 0..{}",
                part, len
            )));
        }
        selected.extend(start..=end);
    }
    if selected.is_empty() {
        return Err(FabError::Validation("empty selection".to_string()));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::FabricationElement;
    use clayfab_robotics::Frame;

    fn elements(placed: &[usize], n: usize) -> Vec<FabricationElement> {
        (0..n)
            .map(|i| {
                let mut e = FabricationElement::new(i as i64, Frame::worldxy(), 45.0, 100.0, 0.5, 50.0).unwrap();
                e.placed = placed.contains(&i);
                e
            })
            .collect()
    }

    fn flags(elements: &[FabricationElement]) -> Vec<bool> {
        elements.iter().map(|e| e.placed).collect()
    }

    #[test]
    fn test_respect_placed_fills_gaps() {
        let mut elems = elements(&[1, 3], 6);
        EditSequence::RespectPlaced.apply(&mut elems, Utc::now());
        assert_eq!(flags(&elems), vec![true, true, true, true, false, false]);
        assert!(elems.iter().filter(|e| e.placed).all(|e| e.time_placed.is_some()));
    }

    #[test]
    fn test_respect_placed_with_nothing_placed() {
        let mut elems = elements(&[], 3);
        EditSequence::RespectPlaced.apply(&mut elems, Utc::now());
        assert_eq!(flags(&elems), vec![false; 3]);
    }

    #[test]
    fn test_place_all_clears_state() {
        let mut elems = elements(&[0, 1], 3);
        elems[0].cycle_time = Some(12.0);
        EditSequence::PlaceAll.apply(&mut elems, Utc::now());
        assert_eq!(flags(&elems), vec![false; 3]);
        assert_eq!(elems[0].cycle_time, None);
        assert_eq!(elems[0].time_placed, None);
    }

    #[test]
    fn test_start_at_and_selection() {
        let mut elems = elements(&[], 5);
        EditSequence::StartAt(2).apply(&mut elems, Utc::now());
        assert_eq!(flags(&elems), vec![true, true, false, false, false]);

        let selection = parse_selection("0, 3-4", 5).unwrap();
        EditSequence::Selection(selection).apply(&mut elems, Utc::now());
        assert_eq!(flags(&elems), vec![false, true, true, false, false]);
    }

    #[test]
    fn test_existing_timestamps_kept() {
        let mut elems = elements(&[0], 2);
        let earlier = Utc::now() - chrono::Duration::hours(1);
        elems[0].time_placed = Some(earlier);
        EditSequence::RespectPlaced.apply(&mut elems, Utc::now());
        assert_eq!(elems[0].time_placed, Some(earlier));
    }

    #[test]
    fn test_parse_selection() {
        let set = parse_selection("0-3,7,9-10", 11).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 7, 9, 10]);
        assert!(parse_selection("5-2", 10).is_err());
        assert!(parse_selection("12", 10).is_err());
        assert!(parse_selection("a-b", 10).is_err());
        assert!(parse_selection(" , ", 10).is_err());
    }
}
