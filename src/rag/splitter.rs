use std::collections::VecDeque;

/// 递归字符切分器
///
/// 依次尝试按段落、换行、句号切分，片段仍超长时再用下一级分隔符，
/// 最后按字符硬切。相邻切片保留不超过 `chunk_overlap` 个字符的重叠。
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

const SEPARATORS: &[&str] = &["\n\n", "\n", "。"];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_from(text, 0)
            .into_iter()
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn split_from(&self, text: &str, level: usize) -> Vec<String> {
        let found = SEPARATORS
            .iter()
            .enumerate()
            .skip(level)
            .find(|(_, sep)| text.contains(**sep));

        let Some((index, separator)) = found else {
            return self.hard_split(text);
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in text.split_inclusive(*separator) {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            chunks.extend(self.split_from(piece, index + 1));
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// 合并小片段，超过长度后从头部丢弃片段直到满足重叠约束
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    let Some(dropped) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(dropped);
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_chunk(&mut chunks, &window);
        chunks
    }

    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.trim().to_string()];
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect::<String>().trim().to_string());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
