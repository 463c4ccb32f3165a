//! Placement — turns committed fragments into document order.
//!
//! Selection order (budget priority) and document order are independent.
//! Placement only looks at each fragment's `Insertion`: fragments are inserted
//! one by one in descending `order` (ties broken by declaration order), each
//! at a boundary counted from the start or end of the document built so far.
//! Inserting inside an earlier fragment splits its segment in two.

use weave_core::{FieldKind, Insertion, InsertionUnit, Segment};

/// A committed fragment awaiting placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub identifier: String,
    pub kind: FieldKind,
    /// Composed text: prefix, (possibly trimmed) body, suffix.
    pub text: String,
    pub insertion: Insertion,
    /// Index of the field in the caller's declaration order.
    pub declaration: usize,
}

/// Lay out fragments in document order.
pub fn place(fragments: &[Fragment]) -> Vec<Segment> {
    let mut ordered: Vec<&Fragment> = fragments.iter().filter(|f| !f.text.is_empty()).collect();
    ordered.sort_by(|a, b| {
        b.insertion
            .order
            .cmp(&a.insertion.order)
            .then(a.declaration.cmp(&b.declaration))
    });

    let mut doc: Vec<Segment> = Vec::with_capacity(ordered.len());
    let mut text = String::new();
    for fragment in ordered {
        let offset = resolve_offset(&text, &fragment.insertion);
        insert_at(
            &mut doc,
            offset,
            Segment {
                identifier: fragment.identifier.clone(),
                kind: fragment.kind,
                text: fragment.text.clone(),
            },
        );
        text.insert_str(offset, &fragment.text);
    }
    doc
}

/// Byte offsets at which a fragment may be inserted, ascending, always
/// including the start and the end of the text.
pub fn boundaries(text: &str, unit: InsertionUnit) -> Vec<usize> {
    let mut bounds = vec![0];
    match unit {
        InsertionUnit::Newline => {
            bounds.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        }
        InsertionUnit::Sentence => {
            let mut chars = text.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if !matches!(c, '.' | '!' | '?') {
                    continue;
                }
                if chars.peek().is_none_or(|(_, next)| next.is_whitespace()) {
                    let end = i + c.len_utf8();
                    let rest = &text[end..];
                    bounds.push(end + (rest.len() - rest.trim_start().len()));
                }
            }
        }
    }
    bounds.push(text.len());
    bounds.dedup();
    bounds
}

/// Offset for an insertion into `text`, clamped to the document.
pub fn resolve_offset(text: &str, insertion: &Insertion) -> usize {
    let bounds = boundaries(text, insertion.unit);
    let n = bounds.len() as i64;
    let position = i64::from(insertion.position);
    let index = if position >= 0 {
        position.min(n - 1)
    } else {
        (n + position).max(0)
    };
    bounds[index as usize]
}

fn insert_at(doc: &mut Vec<Segment>, offset: usize, segment: Segment) {
    let mut pos = 0;
    for i in 0..doc.len() {
        if offset == pos {
            doc.insert(i, segment);
            return;
        }
        let len = doc[i].text.len();
        if offset < pos + len {
            let tail = doc[i].text.split_off(offset - pos);
            let tail = Segment {
                identifier: doc[i].identifier.clone(),
                kind: doc[i].kind,
                text: tail,
            };
            doc.insert(i + 1, segment);
            doc.insert(i + 2, tail);
            return;
        }
        pos += len;
    }
    doc.push(segment);
}
