/// 句末标点
const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '!', '?'];

/// 无句末标点时截取的字符数
pub const SNIPPET_FALLBACK_CHARS: usize = 60;

/// 将多行文本折叠为单行，连续空白合并为一个空格
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 按字符截断，超出时以 `...` 结尾
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// 抽取文本的首句（不含句末标点）；找不到句末标点时取前60个字符
pub fn leading_sentence(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let sentence = text
        .find(SENTENCE_TERMINATORS)
        .map(|end| text[..end].trim())
        .filter(|s| !s.is_empty());

    let snippet = match sentence {
        Some(s) => s.to_string(),
        None => text.chars().take(SNIPPET_FALLBACK_CHARS).collect(),
    };
    let snippet = single_line(&snippet);
    if snippet.is_empty() { None } else { Some(snippet) }
}
