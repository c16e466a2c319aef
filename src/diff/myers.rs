//! Token-level diff engine.
//!
//! Alignment is computed with the linear-space Myers algorithm from `similar`
//! (no deadline, so the result always has the minimal number of inserted and
//! deleted tokens). The raw hunks are then normalised: between two copies
//! every divergence becomes at most one `Delete` followed by at most one
//! `Add`. Where several placements of a hunk are equally short, the one
//! that joins neighbouring copies into a single run wins.

use std::collections::VecDeque;

use similar::{Algorithm, capture_diff_slices};

use super::{
    DiffOp, EditScript, Granularity,
    op::push_coalesced,
    token::tokenize,
};
use crate::err::{Error, Result};

/// Diffs two texts at the given granularity.
pub fn compare(before: &str, after: &str, granularity: Granularity) -> Result<EditScript> {
    let old = tokenize(before, granularity);
    let new = tokenize(after, granularity);
    log::trace!(
        "comparing {} -> {} tokens ({})",
        old.len(),
        new.len(),
        granularity
    );
    diff_tokens(&old, &new)
}

/// Diffs two token sequences. The result is checked against both inputs
/// before it is returned.
pub fn diff_tokens<'a>(old: &[&'a str], new: &[&'a str]) -> Result<EditScript> {
    let (mut copies, mut hunks) = align(old, new);
    join_copies(&mut copies, &mut hunks);

    let mut ops = Vec::new();
    for (i, copy) in copies.iter().enumerate() {
        push_coalesced(&mut ops, DiffOp::Copy(copy.iter().copied().collect()));
        if let Some(hunk) = hunks.get(i) {
            push_coalesced(&mut ops, DiffOp::Delete(hunk.delete.iter().copied().collect()));
            push_coalesced(&mut ops, DiffOp::Add(hunk.add.iter().copied().collect()));
        }
    }

    let script = EditScript::from(ops);
    check_round_trip(&script, &old.concat(), &new.concat())?;
    Ok(script)
}

/// Tokens between two copy runs: those only in the old sequence, then
/// those only in the new one.
#[derive(Debug, Default)]
struct Hunk<'a> {
    delete: VecDeque<&'a str>,
    add: VecDeque<&'a str>,
}

impl<'a> Hunk<'a> {
    fn starts_with(&self, token: &str) -> bool {
        self.delete.front().is_none_or(|t| *t == token)
            && self.add.front().is_none_or(|t| *t == token)
    }

    fn ends_with(&self, token: &str) -> bool {
        self.delete.back().is_none_or(|t| *t == token)
            && self.add.back().is_none_or(|t| *t == token)
    }

    fn absorb(&mut self, next: Hunk<'a>) {
        self.delete.extend(next.delete);
        self.add.extend(next.add);
    }
}

/// Myers alignment as alternating copy runs and hunks:
/// `copies[0] hunks[0] copies[1] ... hunks[n-1] copies[n]`.
fn align<'a>(old: &[&'a str], new: &[&'a str]) -> (Vec<VecDeque<&'a str>>, Vec<Hunk<'a>>) {
    let mut copies = vec![VecDeque::new()];
    let mut hunks: Vec<Hunk<'a>> = Vec::new();
    let mut in_hunk = false;

    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (old_range, new_range) = (op.old_range(), op.new_range());
        if matches!(op, similar::DiffOp::Equal { .. }) {
            if in_hunk {
                copies.push(VecDeque::new());
                in_hunk = false;
            }
            if let Some(copy) = copies.last_mut() {
                copy.extend(&old[old_range]);
            }
            continue;
        }
        if !in_hunk {
            hunks.push(Hunk::default());
            in_hunk = true;
        }
        if let Some(hunk) = hunks.last_mut() {
            hunk.delete.extend(&old[old_range]);
            hunk.add.extend(&new[new_range]);
        }
    }
    if in_hunk {
        copies.push(VecDeque::new());
    }
    (copies, hunks)
}

/// Moves hunk `k` one token towards the start. The last token of the copy
/// before it must also end every non-empty side of the hunk.
fn slide_left<'a>(copies: &mut [VecDeque<&'a str>], hunks: &mut [Hunk<'a>], k: usize) -> bool {
    let Some(&token) = copies[k].back() else {
        return false;
    };
    if !hunks[k].ends_with(token) {
        return false;
    }
    copies[k].pop_back();
    let hunk = &mut hunks[k];
    for side in [&mut hunk.delete, &mut hunk.add] {
        if side.pop_back().is_some() {
            side.push_front(token);
        }
    }
    copies[k + 1].push_front(token);
    true
}

/// Mirror of [`slide_left`].
fn slide_right<'a>(copies: &mut [VecDeque<&'a str>], hunks: &mut [Hunk<'a>], k: usize) -> bool {
    let Some(&token) = copies[k + 1].front() else {
        return false;
    };
    if !hunks[k].starts_with(token) {
        return false;
    }
    copies[k + 1].pop_front();
    let hunk = &mut hunks[k];
    for side in [&mut hunk.delete, &mut hunk.add] {
        if side.pop_front().is_some() {
            side.push_back(token);
        }
    }
    copies[k].push_back(token);
    true
}

/// Among equally short alignments, shifts each hunk to where it empties a
/// neighbouring copy run, so the copies on either side join into one. The
/// trailing side is tried first; a hunk that can empty neither stays where
/// Myers put it.
fn join_copies<'a>(copies: &mut Vec<VecDeque<&'a str>>, hunks: &mut Vec<Hunk<'a>>) {
    let mut k = 0;
    while k < hunks.len() {
        let mut moved = 0;
        while slide_right(copies, hunks, k) {
            moved += 1;
        }
        if !copies[k + 1].is_empty() {
            for _ in 0..moved {
                slide_left(copies, hunks, k);
            }
            moved = 0;
            while slide_left(copies, hunks, k) {
                moved += 1;
            }
            if !copies[k].is_empty() {
                for _ in 0..moved {
                    slide_right(copies, hunks, k);
                }
            }
        }

        if copies[k + 1].is_empty() && k + 1 < hunks.len() {
            copies.remove(k + 1);
            let next = hunks.remove(k + 1);
            hunks[k].absorb(next);
        } else if copies[k].is_empty() && k > 0 {
            copies.remove(k);
            let this = hunks.remove(k);
            hunks[k - 1].absorb(this);
            k -= 1;
        } else {
            k += 1;
        }
    }
}

fn check_round_trip(script: &EditScript, before: &str, after: &str) -> Result<()> {
    let rebuilt_before = script.before_text();
    let rebuilt_after = script.after_text();
    if rebuilt_before != before || rebuilt_after != after {
        log::error!(
            "diff engine produced an inconsistent script ({} ops)",
            script.len()
        );
        return Err(Error::InternalInconsistency(format!(
            "script rebuilds {} / {} bytes, expected {} / {}",
            rebuilt_before.len(),
            rebuilt_after.len(),
            before.len(),
            after.len()
        )));
    }
    Ok(())
}
