//! Final recount and order-preserving reassembly

use crate::compression::{Segment, TokenCounter};

/// Recompute every cached token count and return the total
pub fn recount(segments: &mut [Segment], counter: &dyn TokenCounter) -> usize {
    segments.iter_mut().map(|s| s.refresh_count(counter)).sum()
}

/// Join segment texts in original document order
pub fn assemble(segments: &[Segment]) -> String {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.start_offset);
    ordered.iter().map(|s| s.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{candidate_order, WordCounter};

    #[test]
    fn test_assemble_restores_document_order() {
        let mut segments = vec![
            Segment::new(0, "first ", 0, &WordCounter),
            Segment::new(1, "second ", 6, &WordCounter),
            Segment::new(2, "third", 13, &WordCounter),
        ];
        segments.reverse();
        assert_eq!(assemble(&segments), "first second third");
    }

    #[test]
    fn test_assemble_after_reordering_by_priority() {
        let mut segments = vec![
            Segment::new(0, "a ", 0, &WordCounter).with_relevance(9.0),
            Segment::new(1, "b b b ", 2, &WordCounter).with_relevance(1.0),
            Segment::new(2, "c", 8, &WordCounter).with_relevance(5.0),
        ];
        let order = candidate_order(&segments);
        let mut shuffled: Vec<Segment> = order.iter().map(|&i| segments[i].clone()).collect();
        shuffled[0].text = "b ".to_string();
        segments = shuffled;
        assert_eq!(assemble(&segments), "a b c");
    }

    #[test]
    fn test_recount_refreshes_stale_counts() {
        let mut segments = vec![Segment::new(0, "one two", 0, &WordCounter)];
        segments[0].text = "one two three".to_string();
        assert_eq!(recount(&mut segments, &WordCounter), 3);
        assert_eq!(segments[0].token_count, 3);
    }
}
