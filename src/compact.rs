use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const HTML5_DOCTYPE: &str = "<!DOCTYPE html>";

// Alternatives are tried leftmost-first:
// - `keep`: a <pre> or <textarea> region, left untouched. The closing `>` is
//   not consumed so whitespace after the region can still collapse.
// - `gap`: `>` followed by a whitespace run. Only removed when a `<` follows.
// - `tabs`: two or more tabs.
// - `eol`: two or more whitespace characters ending in a newline, removed
//   together with that newline.
static COMPACTION_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)(?P<keep><pre\b[^>]*>(?:.*?</pre\s*|.*)|<textarea\b[^>]*>(?:.*?</textarea\s*|.*))",
        r"|(?P<gap>>\s{2,})",
        r"|(?P<tabs>\t{2,})",
        r"|(?P<eol>\s{2,}\n)",
    ))
    .unwrap()
});

/// Line break emitted after the doctype and at the end of compacted output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    /// `\r\n` on Windows, `\n` everywhere else.
    #[default]
    Platform,
    /// Always `\n`.
    Lf,
    /// Always `\r\n`.
    CrLf,
}

impl Newline {
    /// Returns the line break sequence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Newline::Platform if cfg!(windows) => "\r\n",
            Newline::Platform | Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }
}

/// Collapses incidental whitespace in HTML text.
///
/// The compiled pattern is shared by every `Compactor` in the process, so
/// copies are cheap and can be handed to each response.
#[derive(Debug, Clone, Copy)]
pub struct Compactor {
    rule: &'static Regex,
    newline: Newline,
}

impl Compactor {
    /// Creates a compactor using the platform line break.
    pub fn new() -> Self {
        Self {
            rule: &COMPACTION_RULE,
            newline: Newline::Platform,
        }
    }

    /// Sets the line break used for the doctype line and the final newline.
    pub fn newline(mut self, newline: Newline) -> Self {
        self.newline = newline;
        self
    }

    /// Compacts `text`.
    ///
    /// Returns `None` when the input is empty or only whitespace, meaning
    /// there is nothing to emit.
    pub fn compact(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }

        let collapsed = self.collapse(text);
        let trimmed = collapsed.trim();
        let newline = self.newline.as_str();

        let mut output = String::with_capacity(trimmed.len() + 2 * newline.len());
        match trimmed.strip_prefix(HTML5_DOCTYPE) {
            Some(rest) => {
                // An existing line break is replaced, never doubled.
                let rest = rest
                    .strip_prefix("\r\n")
                    .or_else(|| rest.strip_prefix('\n'))
                    .unwrap_or(rest);
                output.push_str(HTML5_DOCTYPE);
                output.push_str(newline);
                output.push_str(rest);
            }
            None => output.push_str(trimmed),
        }
        output.push_str(newline);

        Some(output)
    }

    /// Applies the compaction rule once across `text`.
    fn collapse(&self, text: &str) -> String {
        let mut output = String::with_capacity(text.len());
        // `copied` trails `at` whenever a match is kept verbatim.
        let mut copied = 0;
        let mut at = 0;

        while let Some(caps) = self.rule.captures_at(text, at) {
            let Some(m) = caps.get(0) else { break };

            if caps.name("keep").is_some() {
                at = m.end();
            } else if caps.name("gap").is_some() {
                if text[m.end()..].starts_with('<') {
                    output.push_str(&text[copied..=m.start()]);
                    copied = m.end();
                    at = m.end();
                } else {
                    // Not between tags; rescan the run for the other cases.
                    at = m.start() + 1;
                }
            } else {
                output.push_str(&text[copied..m.start()]);
                copied = m.end();
                at = m.end();
            }
        }

        output.push_str(&text[copied..]);
        output
    }
}

impl Default for Compactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(text: &str) -> Option<String> {
        Compactor::new().newline(Newline::Lf).compact(text)
    }

    #[test]
    fn test_collapses_whitespace_between_tags() {
        assert_eq!(
            compact("<html>\n\n\t\t<body>   </body>\n\n</html>").as_deref(),
            Some("<html><body></body></html>\n")
        );
    }

    #[test]
    fn test_single_whitespace_between_tags_kept() {
        assert_eq!(
            compact("<ul>\n<li>a</li> <li>b</li>\n</ul>").as_deref(),
            Some("<ul>\n<li>a</li> <li>b</li>\n</ul>\n")
        );
    }

    #[test]
    fn test_no_matching_run_is_trim_plus_newline() {
        let input = "  <p>Hello, world. One space only.</p>\n";
        assert_eq!(compact(input), Some(format!("{}\n", input.trim())));
    }

    #[test]
    fn test_tab_runs_removed() {
        assert_eq!(compact("a\t\tb\tc").as_deref(), Some("ab\tc\n"));
    }

    #[test]
    fn test_run_before_newline_removed() {
        assert_eq!(
            compact("<p>a</p>x\n\n\ny").as_deref(),
            Some("<p>a</p>xy\n")
        );
        assert_eq!(
            compact("line one   \nline two").as_deref(),
            Some("line oneline two\n")
        );
    }

    #[test]
    fn test_crlf_run_removed() {
        assert_eq!(compact("one  \r\ntwo").as_deref(), Some("onetwo\n"));
    }

    #[test]
    fn test_single_line_break_kept() {
        assert_eq!(compact("one\ntwo\r\nthree").as_deref(), Some("one\ntwo\r\nthree\n"));
    }

    #[test]
    fn test_text_after_tag_keeps_leading_spaces() {
        assert_eq!(
            compact("<p>   hello</p>").as_deref(),
            Some("<p>   hello</p>\n")
        );
    }

    #[test]
    fn test_tabs_after_tag_without_following_tag() {
        assert_eq!(
            compact("<p> \t\thello</p>").as_deref(),
            Some("<p> hello</p>\n")
        );
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(compact(""), None);
        assert_eq!(compact(" \n\t\r\n "), None);
    }

    #[test]
    fn test_doctype_gets_own_line() {
        assert_eq!(
            compact("\n<!DOCTYPE html>\n\n<html>\n  <head></head>\n</html>\n\n").as_deref(),
            Some("<!DOCTYPE html>\n<html><head></head>\n</html>\n")
        );
    }

    #[test]
    fn test_doctype_prefix_is_case_sensitive() {
        assert_eq!(
            compact("<!doctype html>   <html></html>").as_deref(),
            Some("<!doctype html><html></html>\n")
        );
    }

    #[test]
    fn test_crlf_newline() {
        let compactor = Compactor::new().newline(Newline::CrLf);
        assert_eq!(
            compactor.compact("<!DOCTYPE html>  <p>x</p>").as_deref(),
            Some("<!DOCTYPE html>\r\n<p>x</p>\r\n")
        );
    }

    #[test]
    fn test_doctype_line_break_follows_configured_newline() {
        let crlf = Compactor::new().newline(Newline::CrLf);
        let once = crlf
            .compact("<!DOCTYPE html>\n<html>  <p>hi</p>  </html>")
            .unwrap();
        assert_eq!(once, "<!DOCTYPE html>\r\n<html><p>hi</p></html>\r\n");
        assert_eq!(crlf.compact(&once).unwrap(), once);

        assert_eq!(
            compact("<!DOCTYPE html>\r\n<p>x</p>").as_deref(),
            Some("<!DOCTYPE html>\n<p>x</p>\n")
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<html>\n\n\t\t<body>   </body>\n\n</html>",
            "<!DOCTYPE html>\n\n<html>\n  <head></head>\n</html>",
            "<p> \t\t text  \n more</p>\n\n\n",
            "<!DOCTYPE html>\r\n<p>a</p>\r\n\r\nb",
            "<div>\n  <pre>\n  keep\t\tthis  \n\n</pre>\n  </div>",
        ];
        for input in inputs {
            let once = compact(input).unwrap();
            let twice = compact(&once).unwrap();
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn test_pre_content_untouched() {
        let input = "<div>\n  <pre>\n  fn main() {\n\t\tprintln!();  \n\n\n  }\n</pre>\n  </div>";
        assert_eq!(
            compact(input).as_deref(),
            Some("<div><pre>\n  fn main() {\n\t\tprintln!();  \n\n\n  }\n</pre></div>\n")
        );
    }

    #[test]
    fn test_pre_with_nested_markup_untouched() {
        let input = "<pre class=\"code\"><b>x</b>   <i>y</i>\n\n\n<span>\t\tz</span></PRE>   <p>after</p>";
        assert_eq!(
            compact(input).as_deref(),
            Some(
                "<pre class=\"code\"><b>x</b>   <i>y</i>\n\n\n<span>\t\tz</span></PRE><p>after</p>\n"
            )
        );
    }

    #[test]
    fn test_multiple_pre_blocks() {
        let input = "<pre>a   \n\n</pre>  <p>  </p>  <pre>\t\tb</pre>";
        assert_eq!(
            compact(input).as_deref(),
            Some("<pre>a   \n\n</pre><p></p><pre>\t\tb</pre>\n")
        );
    }

    #[test]
    fn test_textarea_untouched() {
        let input = "<form>\n  <textarea>\n  line  \n\n\tend</textarea>\n  </form>";
        assert_eq!(
            compact(input).as_deref(),
            Some("<form><textarea>\n  line  \n\n\tend</textarea></form>\n")
        );
    }

    #[test]
    fn test_unterminated_pre_runs_to_end() {
        let input = "<p>x</p>   <pre>\n  a  \n\n\t\tb";
        assert_eq!(
            compact(input).as_deref(),
            Some("<p>x</p><pre>\n  a  \n\n\t\tb\n")
        );
    }

    #[test]
    fn test_preview_tag_is_not_preformatted() {
        assert_eq!(
            compact("<preview>a\t\tb</preview>").as_deref(),
            Some("<preview>ab</preview>\n")
        );
    }
}
