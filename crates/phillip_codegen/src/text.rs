/// Strip leading/trailing blank lines and the common leading whitespace.
pub fn dedent(text: &str) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    let start = lines.iter().position(|line| !line.trim().is_empty());
    let end = lines.iter().rposition(|line| !line.trim().is_empty());
    let (Some(start), Some(end)) = (start, end) else {
        return String::new();
    };
    let lines = &lines[start..=end];

    let margin = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(margin..).unwrap_or_else(|| line.trim_start()).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedent_strips_common_margin() {
        let body = "\n        int x = 1;\n\n          return x;\n    ";
        assert_eq!(dedent(body), "int x = 1;\n\n  return x;");
    }

    #[test]
    fn test_dedent_of_blank_text() {
        assert_eq!(dedent("\n   \n"), "");
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        assert_eq!(indent("a;\n\nb;", 4), "    a;\n\n    b;");
    }
}
