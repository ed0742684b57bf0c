//! Character diff with semantic cleanup
//!
//! The raw edit script comes from `similar`'s Myers implementation over
//! `char`s. Raw Myers output is minimal but noisy (`"500"` vs `"600 due"`
//! keeps the shared `"00"`), so three cleanup passes run on top of it:
//!
//! 1. merge: coalesce runs, factor common prefixes and suffixes out of edit
//!    blocks, slide single edits across equalities
//! 2. semantic: drop equalities dominated by the edits around them, shift
//!    edit boundaries to natural breaks, extract overlaps between adjacent
//!    deletions and insertions
//! 3. word boundaries: no edit block starts or ends in the middle of a word
//!
//! Every pass preserves the partition: the Equal and Delete texts in order
//! rebuild the master, the Equal and Insert texts rebuild the edited text.

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag};

/// One run of an edit script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "lowercase")]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Equal(t) | DiffOp::Insert(t) | DiffOp::Delete(t) => t,
        }
    }

    pub fn is_equal(&self) -> bool {
        matches!(self, DiffOp::Equal(_))
    }
}

/// Edit script turning `master` into `edited`
pub fn diff_text(master: &str, edited: &str) -> Vec<DiffOp> {
    let old: Vec<char> = master.chars().collect();
    let new: Vec<char> = edited.chars().collect();

    let mut chunks = myers(&old, &new);
    cleanup_merge(&mut chunks);
    cleanup_semantic(&mut chunks);
    cleanup_word_boundaries(&mut chunks);

    chunks
        .into_iter()
        .map(|c| {
            let text: String = c.text.into_iter().collect();
            match c.tag {
                Tag::Equal => DiffOp::Equal(text),
                Tag::Insert => DiffOp::Insert(text),
                Tag::Delete => DiffOp::Delete(text),
            }
        })
        .collect()
}

/// Master text rebuilt from an edit script
pub fn master_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Insert(_)))
        .map(DiffOp::text)
        .collect()
}

/// Edited text rebuilt from an edit script
pub fn edited_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Delete(_)))
        .map(DiffOp::text)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone)]
struct Chunk {
    tag: Tag,
    text: Vec<char>,
}

impl Chunk {
    fn new(tag: Tag, text: Vec<char>) -> Self {
        Self { tag, text }
    }
}

fn myers(old: &[char], new: &[char]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => chunks.push(Chunk::new(Tag::Equal, old[old_range].to_vec())),
            DiffTag::Delete => chunks.push(Chunk::new(Tag::Delete, old[old_range].to_vec())),
            DiffTag::Insert => chunks.push(Chunk::new(Tag::Insert, new[new_range].to_vec())),
            DiffTag::Replace => {
                chunks.push(Chunk::new(Tag::Delete, old[old_range].to_vec()));
                chunks.push(Chunk::new(Tag::Insert, new[new_range].to_vec()));
            }
        }
    }
    chunks.retain(|c| !c.text.is_empty());
    chunks
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Length of the longest suffix of `a` that is a prefix of `b`
fn common_overlap(a: &[char], b: &[char]) -> usize {
    let max = a.len().min(b.len());
    (1..=max)
        .rev()
        .find(|&k| a[a.len() - k..] == b[..k])
        .unwrap_or(0)
}

/// Coalesce runs, factor shared prefixes/suffixes out of edit blocks and slide
/// single edits sandwiched between equalities where that merges equalities.
fn cleanup_merge(diffs: &mut Vec<Chunk>) {
    loop {
        diffs.retain(|c| !c.text.is_empty());
        // Sentinel so the last edit block is flushed
        diffs.push(Chunk::new(Tag::Equal, Vec::new()));

        let mut pointer = 0;
        let mut count_delete = 0;
        let mut count_insert = 0;
        let mut text_delete: Vec<char> = Vec::new();
        let mut text_insert: Vec<char> = Vec::new();

        while pointer < diffs.len() {
            match diffs[pointer].tag {
                Tag::Insert => {
                    count_insert += 1;
                    text_insert.extend_from_slice(&diffs[pointer].text);
                    pointer += 1;
                }
                Tag::Delete => {
                    count_delete += 1;
                    text_delete.extend_from_slice(&diffs[pointer].text);
                    pointer += 1;
                }
                Tag::Equal => {
                    if count_delete + count_insert > 1 {
                        let start = pointer - count_delete - count_insert;
                        if count_delete != 0 && count_insert != 0 {
                            let common = common_prefix(&text_insert, &text_delete);
                            if common != 0 {
                                if start > 0 && diffs[start - 1].tag == Tag::Equal {
                                    diffs[start - 1]
                                        .text
                                        .extend_from_slice(&text_insert[..common]);
                                } else {
                                    diffs.insert(
                                        start,
                                        Chunk::new(Tag::Equal, text_insert[..common].to_vec()),
                                    );
                                    pointer += 1;
                                }
                                text_insert.drain(..common);
                                text_delete.drain(..common);
                            }
                            let common = common_suffix(&text_insert, &text_delete);
                            if common != 0 {
                                let mut moved = text_insert[text_insert.len() - common..].to_vec();
                                moved.append(&mut diffs[pointer].text);
                                diffs[pointer].text = moved;
                                text_insert.truncate(text_insert.len() - common);
                                text_delete.truncate(text_delete.len() - common);
                            }
                        }

                        pointer -= count_delete + count_insert;
                        diffs.drain(pointer..pointer + count_delete + count_insert);
                        if !text_delete.is_empty() {
                            diffs.insert(
                                pointer,
                                Chunk::new(Tag::Delete, std::mem::take(&mut text_delete)),
                            );
                            pointer += 1;
                        }
                        if !text_insert.is_empty() {
                            diffs.insert(
                                pointer,
                                Chunk::new(Tag::Insert, std::mem::take(&mut text_insert)),
                            );
                            pointer += 1;
                        }
                        pointer += 1;
                    } else if pointer != 0 && diffs[pointer - 1].tag == Tag::Equal {
                        let text = diffs.remove(pointer).text;
                        diffs[pointer - 1].text.extend(text);
                    } else {
                        pointer += 1;
                    }
                    count_insert = 0;
                    count_delete = 0;
                    text_delete.clear();
                    text_insert.clear();
                }
            }
        }
        if diffs.last().is_some_and(|c| c.text.is_empty()) {
            diffs.pop();
        }

        // Slide single edits: A<ins>BA</ins>C -> <ins>AB</ins>AC
        let mut changes = false;
        let mut pointer = 1;
        while pointer + 1 < diffs.len() {
            if diffs[pointer - 1].tag == Tag::Equal && diffs[pointer + 1].tag == Tag::Equal {
                let prev = diffs[pointer - 1].text.clone();
                let next = diffs[pointer + 1].text.clone();
                let edit = diffs[pointer].text.clone();
                if !prev.is_empty() && edit.ends_with(&prev) {
                    let keep = edit.len() - prev.len();
                    let mut shifted = prev.clone();
                    shifted.extend_from_slice(&edit[..keep]);
                    diffs[pointer].text = shifted;
                    let mut merged = prev;
                    merged.extend(next);
                    diffs[pointer + 1].text = merged;
                    diffs.remove(pointer - 1);
                    changes = true;
                } else if !next.is_empty() && edit.starts_with(&next) {
                    diffs[pointer - 1].text.extend_from_slice(&next);
                    let mut shifted = edit[next.len()..].to_vec();
                    shifted.extend_from_slice(&next);
                    diffs[pointer].text = shifted;
                    diffs.remove(pointer + 1);
                    changes = true;
                }
            }
            pointer += 1;
        }
        if !changes {
            break;
        }
    }
}

/// Remove equalities that are no longer than the edits on either side of
/// them, then align boundaries and extract overlaps.
fn cleanup_semantic(diffs: &mut Vec<Chunk>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<Vec<char>> = None;
    let mut pointer: isize = 0;
    // Edit lengths before and after the last equality
    let (mut ins_before, mut del_before) = (0usize, 0usize);
    let (mut ins_after, mut del_after) = (0usize, 0usize);

    while (pointer as usize) < diffs.len() {
        let p = pointer as usize;
        if diffs[p].tag == Tag::Equal {
            equalities.push(p);
            ins_before = ins_after;
            del_before = del_after;
            ins_after = 0;
            del_after = 0;
            last_equality = Some(diffs[p].text.clone());
        } else {
            if diffs[p].tag == Tag::Insert {
                ins_after += diffs[p].text.len();
            } else {
                del_after += diffs[p].text.len();
            }
            let dominated = last_equality.as_ref().is_some_and(|eq| {
                eq.len() <= ins_before.max(del_before) && eq.len() <= ins_after.max(del_after)
            });
            let target = equalities.last().copied();
            if let (true, Some(at)) = (dominated, target) {
                let eq = last_equality.take().unwrap_or_default();
                diffs.insert(at, Chunk::new(Tag::Delete, eq));
                diffs[at + 1].tag = Tag::Insert;
                // Drop this equality and re-evaluate the one before it
                equalities.pop();
                equalities.pop();
                pointer = equalities.last().map_or(-1, |&i| i as isize);
                ins_before = 0;
                del_before = 0;
                ins_after = 0;
                del_after = 0;
                changes = true;
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(diffs);
    }
    cleanup_semantic_lossless(diffs);
    extract_overlaps(diffs);
}

/// `abc<del>xyz</del>` + `<ins>xyzdef</ins>` style overlaps become equalities
/// when the overlap covers at least half of either side.
fn extract_overlaps(diffs: &mut Vec<Chunk>) {
    let mut pointer = 1;
    while pointer < diffs.len() {
        if diffs[pointer - 1].tag == Tag::Delete && diffs[pointer].tag == Tag::Insert {
            let deletion = diffs[pointer - 1].text.clone();
            let insertion = diffs[pointer].text.clone();
            let forward = common_overlap(&deletion, &insertion);
            let backward = common_overlap(&insertion, &deletion);
            let half = |n: usize, of: &[char]| 2 * n >= of.len();

            if forward >= backward {
                if forward > 0 && (half(forward, &deletion) || half(forward, &insertion)) {
                    diffs.insert(pointer, Chunk::new(Tag::Equal, insertion[..forward].to_vec()));
                    diffs[pointer - 1].text = deletion[..deletion.len() - forward].to_vec();
                    diffs[pointer + 1].text = insertion[forward..].to_vec();
                    pointer += 1;
                }
            } else if half(backward, &deletion) || half(backward, &insertion) {
                // Insertion tail overlaps deletion head: swap sides
                diffs.insert(pointer, Chunk::new(Tag::Equal, deletion[..backward].to_vec()));
                diffs[pointer - 1] = Chunk::new(
                    Tag::Insert,
                    insertion[..insertion.len() - backward].to_vec(),
                );
                diffs[pointer + 1] = Chunk::new(Tag::Delete, deletion[backward..].to_vec());
                pointer += 1;
            }
            pointer += 1;
        }
        pointer += 1;
    }
    if diffs.iter().any(|c| c.text.is_empty()) {
        cleanup_merge(diffs);
    }
}

/// Shift single edits surrounded by equalities so their edges fall on the
/// most natural boundary, e.g. `The c<ins>at c</ins>ame.` -> `The <ins>cat </ins>came.`
fn cleanup_semantic_lossless(diffs: &mut Vec<Chunk>) {
    let mut pointer = 1;
    while pointer + 1 < diffs.len() {
        if diffs[pointer - 1].tag != Tag::Equal || diffs[pointer + 1].tag != Tag::Equal {
            pointer += 1;
            continue;
        }

        let mut before = diffs[pointer - 1].text.clone();
        let mut edit = diffs[pointer].text.clone();
        let mut after = diffs[pointer + 1].text.clone();

        // Shift the edit as far left as possible
        let offset = common_suffix(&before, &edit);
        if offset > 0 {
            let common = edit[edit.len() - offset..].to_vec();
            before.truncate(before.len() - offset);
            let mut shifted = common.clone();
            shifted.extend_from_slice(&edit[..edit.len() - offset]);
            edit = shifted;
            let mut grown = common;
            grown.extend(after);
            after = grown;
        }

        // Then step right one char at a time, keeping the best scoring split
        let mut best = (before.clone(), edit.clone(), after.clone());
        let mut best_score = semantic_score(&before, &edit) + semantic_score(&edit, &after);
        while !edit.is_empty() && !after.is_empty() && edit[0] == after[0] {
            before.push(edit.remove(0));
            edit.push(after.remove(0));
            let score = semantic_score(&before, &edit) + semantic_score(&edit, &after);
            // >= prefers the rightmost of equally good splits
            if score >= best_score {
                best_score = score;
                best = (before.clone(), edit.clone(), after.clone());
            }
        }

        let (best_before, best_edit, best_after) = best;
        if diffs[pointer - 1].text != best_before {
            let mut at = pointer;
            let mut removed = 0;
            if best_before.is_empty() {
                diffs.remove(at - 1);
                at -= 1;
                removed += 1;
            } else {
                diffs[at - 1].text = best_before;
            }
            diffs[at].text = best_edit;
            if best_after.is_empty() {
                diffs.remove(at + 1);
                removed += 1;
            } else {
                diffs[at + 1].text = best_after;
            }
            pointer = (pointer + 1 - removed).max(1);
            continue;
        }
        pointer += 1;
    }
}

/// How natural a boundary between `one` and `two` is, 6 best, 0 worst
fn semantic_score(one: &[char], two: &[char]) -> u8 {
    let (Some(&c1), Some(&c2)) = (one.last(), two.first()) else {
        // Edges of the text are the best boundaries
        return 6;
    };

    let non_alnum1 = !c1.is_alphanumeric();
    let non_alnum2 = !c2.is_alphanumeric();
    let space1 = non_alnum1 && c1.is_whitespace();
    let space2 = non_alnum2 && c2.is_whitespace();
    let break1 = space1 && (c1 == '\n' || c1 == '\r');
    let break2 = space2 && (c2 == '\n' || c2 == '\r');
    let blank1 = break1 && ends_with_blank_line(one);
    let blank2 = break2 && starts_with_blank_line(two);

    if blank1 || blank2 {
        5
    } else if break1 || break2 {
        4
    } else if non_alnum1 && !space1 && space2 {
        // End of sentence
        3
    } else if space1 || space2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

fn ends_with_blank_line(text: &[char]) -> bool {
    text.ends_with(&['\n', '\n']) || text.ends_with(&['\n', '\r', '\n'])
}

fn starts_with_blank_line(text: &[char]) -> bool {
    let rest = text.strip_prefix(&['\r']).unwrap_or(text);
    let Some(rest) = rest.strip_prefix(&['\n']) else {
        return false;
    };
    let rest = rest.strip_prefix(&['\r']).unwrap_or(rest);
    rest.first() == Some(&'\n')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Grow edit blocks to whole words.
///
/// Each step moves at least one char out of an equality, so this terminates.
fn cleanup_word_boundaries(diffs: &mut Vec<Chunk>) {
    coalesce(diffs);
    while absorb_partial_word(diffs) {
        coalesce(diffs);
    }
}

/// Find the first edit block cut inside a word and pull the rest of that word
/// into both of its sides. Returns whether anything moved.
fn absorb_partial_word(diffs: &mut Vec<Chunk>) -> bool {
    let mut i = 0;
    while i < diffs.len() {
        if diffs[i].tag == Tag::Equal {
            i += 1;
            continue;
        }
        let start = i;
        let end = start
            + diffs[start..]
                .iter()
                .take_while(|c| c.tag != Tag::Equal)
                .count();

        let starts_in_word = diffs[start..end]
            .iter()
            .any(|c| c.text.first().is_some_and(|&ch| is_word_char(ch)));
        let ends_in_word = diffs[start..end]
            .iter()
            .any(|c| c.text.last().is_some_and(|&ch| is_word_char(ch)));

        if start > 0
            && starts_in_word
            && diffs[start - 1].text.last().is_some_and(|&ch| is_word_char(ch))
        {
            let equality = &mut diffs[start - 1].text;
            let cut = equality
                .iter()
                .rposition(|&ch| !is_word_char(ch))
                .map_or(0, |p| p + 1);
            let tail = equality.split_off(cut);
            diffs.insert(start, Chunk::new(Tag::Insert, tail.clone()));
            diffs.insert(start, Chunk::new(Tag::Delete, tail));
            return true;
        }

        if end < diffs.len()
            && ends_in_word
            && diffs[end].text.first().is_some_and(|&ch| is_word_char(ch))
        {
            let equality = &mut diffs[end].text;
            let cut = equality
                .iter()
                .position(|&ch| !is_word_char(ch))
                .unwrap_or(equality.len());
            let head: Vec<char> = equality.drain(..cut).collect();
            diffs.insert(end, Chunk::new(Tag::Insert, head.clone()));
            diffs.insert(end, Chunk::new(Tag::Delete, head));
            return true;
        }

        i = end;
    }
    false
}

/// Join adjacent runs without moving text across equalities: every edit block
/// becomes at most one Delete followed by one Insert.
fn coalesce(diffs: &mut Vec<Chunk>) {
    fn flush(out: &mut Vec<Chunk>, delete: &mut Vec<char>, insert: &mut Vec<char>) {
        if !delete.is_empty() {
            out.push(Chunk::new(Tag::Delete, std::mem::take(delete)));
        }
        if !insert.is_empty() {
            out.push(Chunk::new(Tag::Insert, std::mem::take(insert)));
        }
    }

    let mut out: Vec<Chunk> = Vec::with_capacity(diffs.len());
    let mut delete = Vec::new();
    let mut insert = Vec::new();
    for chunk in diffs.drain(..) {
        match chunk.tag {
            Tag::Delete => delete.extend(chunk.text),
            Tag::Insert => insert.extend(chunk.text),
            Tag::Equal => {
                if chunk.text.is_empty() {
                    continue;
                }
                flush(&mut out, &mut delete, &mut insert);
                match out.last_mut() {
                    Some(last) if last.tag == Tag::Equal => last.text.extend(chunk.text),
                    _ => out.push(chunk),
                }
            }
        }
    }
    flush(&mut out, &mut delete, &mut insert);
    *diffs = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn chunks(spec: &[(Tag, &str)]) -> Vec<Chunk> {
        spec.iter().map(|(t, s)| Chunk::new(*t, chars(s))).collect()
    }

    fn render(diffs: &[Chunk]) -> Vec<(Tag, String)> {
        diffs
            .iter()
            .map(|c| (c.tag, c.text.iter().collect()))
            .collect()
    }

    #[test]
    fn test_identical_text_is_single_equal() {
        let ops = diff_text("same text", "same text");
        assert_eq!(ops, vec![DiffOp::Equal("same text".into())]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff_text("", "").is_empty());
        assert_eq!(diff_text("", "new"), vec![DiffOp::Insert("new".into())]);
        assert_eq!(diff_text("old", ""), vec![DiffOp::Delete("old".into())]);
    }

    #[test]
    fn test_rent_example_whole_words() {
        let ops = diff_text("The rent is $500.", "The rent is $600 due monthly.");
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal("The rent is $".into()),
                DiffOp::Delete("500".into()),
                DiffOp::Insert("600 due monthly".into()),
                DiffOp::Equal(".".into()),
            ]
        );
    }

    #[test]
    fn test_appended_word() {
        let ops = diff_text("Pay the rent.", "Pay the rent today.");
        assert_eq!(master_text(&ops), "Pay the rent.");
        assert_eq!(edited_text(&ops), "Pay the rent today.");
        assert!(ops.contains(&DiffOp::Insert(" today".into())));
        assert!(!ops.iter().any(|op| matches!(op, DiffOp::Delete(_))));
    }

    #[test]
    fn test_plural_absorbs_word() {
        let ops = diff_text("one cat here", "one cats here");
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal("one ".into()),
                DiffOp::Delete("cat".into()),
                DiffOp::Insert("cats".into()),
                DiffOp::Equal(" here".into()),
            ]
        );
    }

    #[test]
    fn test_partition_holds_on_multiline_text() {
        let master = "Clause 1\n\nThe tenant pays.\nClause 2";
        let edited = "Clause 1\n\nThe landlord pays monthly.\nClause 3";
        let ops = diff_text(master, edited);
        assert_eq!(master_text(&ops), master);
        assert_eq!(edited_text(&ops), edited);
    }

    #[test]
    fn test_merge_factors_prefix_and_suffix() {
        let mut diffs = chunks(&[(Tag::Delete, "abc"), (Tag::Insert, "abxc")]);
        cleanup_merge(&mut diffs);
        assert_eq!(
            render(&diffs),
            vec![
                (Tag::Equal, "ab".to_string()),
                (Tag::Insert, "x".to_string()),
                (Tag::Equal, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_slides_edit_left() {
        let mut diffs = chunks(&[(Tag::Equal, "a"), (Tag::Insert, "ba"), (Tag::Equal, "c")]);
        cleanup_merge(&mut diffs);
        assert_eq!(
            render(&diffs),
            vec![(Tag::Insert, "ab".to_string()), (Tag::Equal, "ac".to_string())]
        );
    }

    #[test]
    fn test_semantic_removes_dominated_equality() {
        let mut diffs = chunks(&[
            (Tag::Delete, "ab"),
            (Tag::Equal, "c"),
            (Tag::Delete, "d"),
        ]);
        cleanup_semantic(&mut diffs);
        assert_eq!(
            render(&diffs),
            vec![(Tag::Delete, "abcd".to_string()), (Tag::Insert, "c".to_string())]
        );
    }

    #[test]
    fn test_lossless_aligns_to_word() {
        let mut diffs = chunks(&[
            (Tag::Equal, "The c"),
            (Tag::Insert, "ow and the c"),
            (Tag::Equal, "at."),
        ]);
        cleanup_semantic_lossless(&mut diffs);
        assert_eq!(
            render(&diffs),
            vec![
                (Tag::Equal, "The ".to_string()),
                (Tag::Insert, "cow and the ".to_string()),
                (Tag::Equal, "cat.".to_string()),
            ]
        );
    }

    #[test]
    fn test_overlap_extraction() {
        let mut diffs = chunks(&[(Tag::Delete, "abcxxx"), (Tag::Insert, "xxxdef")]);
        extract_overlaps(&mut diffs);
        assert_eq!(
            render(&diffs),
            vec![
                (Tag::Delete, "abc".to_string()),
                (Tag::Equal, "xxx".to_string()),
                (Tag::Insert, "def".to_string()),
            ]
        );
    }

    #[test]
    fn test_semantic_score_order() {
        assert_eq!(semantic_score(&[], &chars("a")), 6);
        assert_eq!(semantic_score(&chars("a\n\n"), &chars("b")), 5);
        assert_eq!(semantic_score(&chars("a\n"), &chars("b")), 4);
        assert_eq!(semantic_score(&chars("a."), &chars(" b")), 3);
        assert_eq!(semantic_score(&chars("a "), &chars("b")), 2);
        assert_eq!(semantic_score(&chars("a,"), &chars("b")), 1);
        assert_eq!(semantic_score(&chars("a"), &chars("b")), 0);
    }

    #[test]
    fn test_blank_line_detection() {
        assert!(starts_with_blank_line(&chars("\n\nx")));
        assert!(starts_with_blank_line(&chars("\r\n\r\nx")));
        assert!(!starts_with_blank_line(&chars("\nx\n")));
        assert!(ends_with_blank_line(&chars("x\n\r\n")));
    }

    #[test]
    fn test_common_overlap() {
        assert_eq!(common_overlap(&chars("abc"), &chars("bcd")), 2);
        assert_eq!(common_overlap(&chars("abc"), &chars("xyz")), 0);
        assert_eq!(common_overlap(&chars(""), &chars("abc")), 0);
    }

    #[test]
    fn test_coalesce_orders_delete_before_insert() {
        let mut diffs = chunks(&[
            (Tag::Insert, "x"),
            (Tag::Delete, "a"),
            (Tag::Equal, ""),
            (Tag::Insert, "y"),
        ]);
        coalesce(&mut diffs);
        assert_eq!(
            render(&diffs),
            vec![(Tag::Delete, "a".to_string()), (Tag::Insert, "xy".to_string())]
        );
    }

    #[test]
    fn test_diff_op_serializes_tagged() {
        let json = serde_json::to_string(&DiffOp::Insert("x".into())).unwrap();
        assert_eq!(json, r#"{"op":"insert","text":"x"}"#);
    }
}
