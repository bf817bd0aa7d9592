//! 出站内容消毒
//!
//! 线上投递前去掉内联的 base64 负载，协议不携带超长内嵌二进制内容。
//! 这是表现层卫生处理，不是安全边界；阈值为可调配置，默认 32。
//! 消毒后为空的内容以显式占位符投递，客户端据此渲染"内容已移除"。

/// 消毒后为空时的占位符
pub const EMPTY_PLACEHOLDER: &str = "[removed]";

/// 默认的 base64 片段判定长度
pub const DEFAULT_MIN_RUN: usize = 32;

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/'
}

/// 去掉 `data:<type>;base64,<payload>` 形式的内联数据 URL
fn strip_data_urls(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if matches_ignore_case(&chars, i, "data:") {
            // 媒体类型段：到 ';' 为止，不允许空白
            let mut j = i + 5;
            while j < chars.len() && chars[j] != ';' && !chars[j].is_whitespace() {
                j += 1;
            }
            if matches_ignore_case(&chars, j, ";base64,") {
                let mut k = j + 8;
                while k < chars.len() && (is_base64_char(chars[k]) || chars[k] == '=') {
                    k += 1;
                }
                if k > j + 8 {
                    i = k;
                    continue;
                }
            }
        }
        output.push(chars[i]);
        i += 1;
    }

    output
}

fn matches_ignore_case(chars: &[char], at: usize, needle: &str) -> bool {
    let needle: Vec<char> = needle.chars().collect();
    if at + needle.len() > chars.len() {
        return false;
    }
    chars[at..at + needle.len()]
        .iter()
        .zip(needle.iter())
        .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// 去掉孤立的 base64 样片段
///
/// 片段为极大化的 base64 字母表字符连续串，长度达到 min_run
/// 即整段移除，尾部至多吸收两个 '=' 填充符。
fn strip_base64_runs(input: &str, min_run: usize) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if is_base64_char(chars[i]) {
            let start = i;
            while i < chars.len() && is_base64_char(chars[i]) {
                i += 1;
            }
            let run_len = i - start;
            let mut padding = 0;
            while padding < 2 && i + padding < chars.len() && chars[i + padding] == '=' {
                padding += 1;
            }
            if run_len >= min_run {
                i += padding;
            } else {
                for c in &chars[start..i] {
                    output.push(*c);
                }
            }
        } else {
            output.push(chars[i]);
            i += 1;
        }
    }

    output
}

/// 对出站消息内容做消毒
pub fn sanitize_outgoing(input: &str, min_run: usize) -> String {
    let without_urls = strip_data_urls(input);
    let without_runs = strip_base64_runs(&without_urls, min_run.max(1));
    let trimmed = without_runs.trim();

    if trimmed.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}
