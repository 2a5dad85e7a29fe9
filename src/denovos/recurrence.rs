//! Resolution of calls that would count one biological event twice.

use std::{borrow::Borrow, collections::HashSet};

use indexmap::IndexMap;

use super::schema::{CandidateCall, Consequence};
use crate::err::DenovoError;

/// Mark every call after the first of a (family, chrom, pos, ref, alt) group.
pub fn family_recurrence<C: Borrow<CandidateCall>>(calls: &[C]) -> Vec<bool> {
    let mut seen = HashSet::new();
    calls
        .iter()
        .map(|call| {
            let call: &CandidateCall = call.borrow();
            !seen.insert((
                call.family_id.as_str(),
                call.chrom.as_str(),
                call.pos,
                call.reference.as_str(),
                call.alternative.as_str(),
            ))
        })
        .collect()
}

/// Mark all but one call of each (person, gene) group.
///
/// The retained call is the first one with the most severe consequence of
/// the group.  Consequences are only looked up for groups with more than
/// one call; an unknown term there is an error.
pub fn person_recurrence<C: Borrow<CandidateCall>>(calls: &[C]) -> Result<Vec<bool>, DenovoError> {
    let mut groups: IndexMap<(&str, &str), Vec<usize>> = IndexMap::new();
    for (idx, call) in calls.iter().enumerate() {
        let call: &CandidateCall = call.borrow();
        groups
            .entry((call.person_id.as_str(), call.symbol.as_str()))
            .or_default()
            .push(idx);
    }

    let mut result = vec![false; calls.len()];
    for members in groups.values().filter(|members| members.len() > 1) {
        let ranks = members
            .iter()
            .map(|idx| {
                let call: &CandidateCall = calls[*idx].borrow();
                Consequence::parse(&call.consequence)
                    .map(|csq| csq.rank())
                    .map_err(|e| e.in_row(idx + 1, "consequence"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        // `min_by_key` returns the first of equal minima
        let retained = members
            .iter()
            .zip(&ranks)
            .min_by_key(|(_, rank)| **rank)
            .map(|(idx, _)| *idx);
        for idx in members {
            result[*idx] = Some(*idx) != retained;
        }
    }
    Ok(result)
}

/// A call is independent iff it is neither a family nor a person/gene
/// duplicate.
pub fn check_independence<C: Borrow<CandidateCall>>(
    calls: &[C],
) -> Result<Vec<bool>, DenovoError> {
    let family_dups = family_recurrence(calls);
    let person_dups = person_recurrence(calls)?;
    tracing::debug!(
        "{} family duplicates, {} person/gene duplicates among {} calls",
        family_dups.iter().filter(|d| **d).count(),
        person_dups.iter().filter(|d| **d).count(),
        calls.len()
    );
    Ok(family_dups
        .iter()
        .zip(&person_dups)
        .map(|(family_dup, person_dup)| !family_dup && !person_dup)
        .collect())
}

/// What to do with non-independent calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceMode {
    /// Remove them from the output.
    Drop,
    /// Keep all rows and clear their pass flag.
    AnnotateOnly,
}

/// Resolve recurrence among the passing calls.
///
/// Independence is computed over the rows whose `pass` flag is set and
/// AND-ed into `pass`.  Returns the indices of the rows to write: every row
/// for [`RecurrenceMode::AnnotateOnly`], the passing independent rows for
/// [`RecurrenceMode::Drop`].
pub fn resolve_recurrence(
    calls: &[CandidateCall],
    pass: &mut [bool],
    mode: RecurrenceMode,
) -> Result<Vec<usize>, DenovoError> {
    let selected = (0..calls.len()).filter(|idx| pass[*idx]).collect::<Vec<_>>();
    let subset = selected.iter().map(|idx| &calls[*idx]).collect::<Vec<_>>();
    let independent = check_independence(&subset).map_err(|e| match e {
        // report rows of the full table
        DenovoError::InRow {
            row,
            column,
            source,
        } => DenovoError::InRow {
            row: selected[row - 1] + 1,
            column,
            source,
        },
        e => e,
    })?;

    for (idx, independent) in selected.iter().zip(independent) {
        pass[*idx] &= independent;
    }

    Ok(match mode {
        RecurrenceMode::AnnotateOnly => (0..calls.len()).collect(),
        RecurrenceMode::Drop => (0..calls.len()).filter(|idx| pass[*idx]).collect(),
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[rstest::fixture]
    fn calls() -> Vec<CandidateCall> {
        vec![
            CandidateCall {
                person_id: String::from("a"),
                family_id: String::from("fam1"),
                chrom: String::from("1"),
                pos: 1,
                reference: String::from("A"),
                alternative: String::from("C"),
                symbol: String::from("TEST1"),
                consequence: String::from("missense_variant"),
                ..Default::default()
            },
            CandidateCall {
                person_id: String::from("b"),
                family_id: String::from("fam2"),
                chrom: String::from("1"),
                pos: 2,
                reference: String::from("G"),
                alternative: String::from("T"),
                symbol: String::from("TEST2"),
                consequence: String::from("splice_donor_variant"),
                ..Default::default()
            },
        ]
    }

    fn same_person_and_gene(mut calls: Vec<CandidateCall>) -> Vec<CandidateCall> {
        calls[1].person_id = String::from("a");
        calls[1].family_id = String::from("fam1");
        calls[1].symbol = String::from("TEST1");
        calls
    }

    #[rstest::rstest]
    fn person_recurrence_distinct(calls: Vec<CandidateCall>) -> Result<(), anyhow::Error> {
        assert_eq!(person_recurrence(&calls)?, vec![false, false]);
        Ok(())
    }

    #[rstest::rstest]
    fn person_recurrence_keeps_most_severe(
        calls: Vec<CandidateCall>,
    ) -> Result<(), anyhow::Error> {
        let calls = same_person_and_gene(calls);

        assert_eq!(person_recurrence(&calls)?, vec![true, false]);

        Ok(())
    }

    #[rstest::rstest]
    fn person_recurrence_first_of_equal_severity(
        calls: Vec<CandidateCall>,
    ) -> Result<(), anyhow::Error> {
        let mut calls = same_person_and_gene(calls);
        calls.push(calls[1].clone());
        calls[2].pos = 3;
        calls.push(calls[0].clone());

        assert_eq!(person_recurrence(&calls)?, vec![true, false, true, true]);

        Ok(())
    }

    #[rstest::rstest]
    fn person_recurrence_undefined_consequence(
        calls: Vec<CandidateCall>,
    ) {
        let mut calls = same_person_and_gene(calls);
        calls[1].consequence = String::from("not_a_consequence");

        assert_eq!(
            person_recurrence(&calls),
            Err(DenovoError::UndefinedConsequence {
                value: String::from("not_a_consequence")
            }
            .in_row(2, "consequence"))
        );
    }

    #[rstest::rstest]
    fn person_recurrence_singletons_not_looked_up(mut calls: Vec<CandidateCall>) {
        calls[0].consequence = String::from("not_a_consequence");

        assert_eq!(person_recurrence(&calls), Ok(vec![false, false]));
    }

    #[rstest::rstest]
    fn family_recurrence(mut calls: Vec<CandidateCall>) {
        calls[1].family_id = String::from("fam1");
        assert_eq!(super::family_recurrence(&calls), vec![false, false]);

        calls[1].pos = 1;
        calls[1].reference = String::from("A");
        calls[1].alternative = String::from("C");
        assert_eq!(super::family_recurrence(&calls), vec![false, true]);

        calls[1].family_id = String::from("fam2");
        assert_eq!(super::family_recurrence(&calls), vec![false, false]);
    }

    #[rstest::rstest]
    fn check_independence(calls: Vec<CandidateCall>) -> Result<(), anyhow::Error> {
        assert_eq!(super::check_independence(&calls)?, vec![true, true]);

        let calls = same_person_and_gene(calls);
        assert_eq!(super::check_independence(&calls)?, vec![false, true]);

        Ok(())
    }

    #[rstest::rstest]
    fn resolve_recurrence_annotate_only(calls: Vec<CandidateCall>) -> Result<(), anyhow::Error> {
        let calls = same_person_and_gene(calls);
        let mut pass = vec![true, true];

        let rows = resolve_recurrence(&calls, &mut pass, RecurrenceMode::AnnotateOnly)?;

        assert_eq!(rows, vec![0, 1]);
        assert_eq!(pass, vec![false, true]);

        Ok(())
    }

    #[rstest::rstest]
    fn resolve_recurrence_ignores_failed_rows(
        calls: Vec<CandidateCall>,
    ) -> Result<(), anyhow::Error> {
        let calls = same_person_and_gene(calls);
        // the more severe call already failed, so the other one is independent
        let mut pass = vec![true, false];

        let rows = resolve_recurrence(&calls, &mut pass, RecurrenceMode::Drop)?;

        assert_eq!(rows, vec![0]);
        assert_eq!(pass, vec![true, false]);

        Ok(())
    }

    #[rstest::rstest]
    fn resolve_recurrence_reports_full_table_row(mut calls: Vec<CandidateCall>) {
        calls.insert(0, calls[0].clone());
        calls[0].consequence = String::from("not_a_consequence");
        calls[2].consequence = String::from("not_a_consequence");
        calls[2].person_id = String::from("a");
        calls[2].symbol = String::from("TEST1");
        let mut pass = vec![false, true, true];

        let result = resolve_recurrence(&calls, &mut pass, RecurrenceMode::Drop);

        assert_eq!(
            result,
            Err(DenovoError::UndefinedConsequence {
                value: String::from("not_a_consequence")
            }
            .in_row(3, "consequence"))
        );
    }

    #[rstest::rstest]
    fn resolve_recurrence_idempotent(calls: Vec<CandidateCall>) -> Result<(), anyhow::Error> {
        let mut calls = same_person_and_gene(calls);
        calls.push(calls[0].clone());
        calls[2].person_id = String::from("c");
        let mut pass = vec![true; calls.len()];

        let rows = resolve_recurrence(&calls, &mut pass, RecurrenceMode::Drop)?;
        assert_eq!(rows, vec![1]);

        let kept = rows.iter().map(|idx| calls[*idx].clone()).collect::<Vec<_>>();
        let mut pass = vec![true; kept.len()];
        let rows = resolve_recurrence(&kept, &mut pass, RecurrenceMode::Drop)?;

        assert_eq!(rows, vec![0]);
        assert_eq!(pass, vec![true]);

        Ok(())
    }
}
