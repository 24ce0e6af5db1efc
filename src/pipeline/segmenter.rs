//! Markdown segmentation
//!
//! Blocks break before headings and at blank-line paragraph boundaries,
//! never inside fenced code. Blocks are then merged greedily up to a token
//! limit, and a heading always opens a new segment. Concatenating the
//! segments in order gives back the input byte for byte.

use crate::compression::{Segment, TokenCounter};

#[derive(Debug)]
struct Block<'a> {
    start: usize,
    text: &'a str,
    heading: bool,
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn is_heading(line: &str) -> bool {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return false;
    }
    let rest = line.trim_start_matches(' ');
    let hashes = rest.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes)
        && rest[hashes..].chars().next().map_or(true, char::is_whitespace)
}

fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut block_start = 0;
    let mut block_heading = false;
    let mut offset = 0;
    let mut in_fence = false;
    let mut prev_blank = false;

    for line in text.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        if !in_fence && offset > block_start {
            let heading = is_heading(line);
            if heading || (!blank && prev_blank) {
                blocks.push(Block {
                    start: block_start,
                    text: &text[block_start..offset],
                    heading: block_heading,
                });
                block_start = offset;
                block_heading = heading;
            }
        } else if offset == block_start {
            block_heading = !in_fence && is_heading(line);
        }

        if is_fence(line) {
            in_fence = !in_fence;
        }
        prev_blank = blank;
        offset += line.len();
    }

    if offset > block_start {
        blocks.push(Block {
            start: block_start,
            text: &text[block_start..offset],
            heading: block_heading,
        });
    }
    blocks
}

/// Split Markdown into segments of at most roughly `max_segment_tokens`.
///
/// A single block larger than the limit becomes its own segment; blocks
/// are never split internally.
pub fn split_markdown(
    text: &str,
    counter: &dyn TokenCounter,
    max_segment_tokens: usize,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<(usize, usize)> = None; // (start, end)
    let mut current_tokens = 0;

    for block in split_blocks(text) {
        let block_tokens = counter.count(block.text);
        let end = block.start + block.text.len();

        current = match current {
            Some((start, prev_end))
                if !block.heading && current_tokens + block_tokens <= max_segment_tokens =>
            {
                debug_assert_eq!(prev_end, block.start);
                current_tokens += block_tokens;
                Some((start, end))
            }
            Some((start, prev_end)) => {
                segments.push(Segment::new(
                    segments.len(),
                    &text[start..prev_end],
                    start,
                    counter,
                ));
                current_tokens = block_tokens;
                Some((block.start, end))
            }
            None => {
                current_tokens = block_tokens;
                Some((block.start, end))
            }
        };
    }

    if let Some((start, end)) = current {
        segments.push(Segment::new(segments.len(), &text[start..end], start, counter));
    }
    segments
}
