//! Chat command grammar.
//!
//! A command is `<prefix><keyword>` at the start of a message, matched
//! ASCII-case-insensitively with any configured prefix character. Keywords
//! are tried longest first so a keyword never shadows a longer one that
//! shares its start.

/// A recognized chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Greet,
    Ping,
    Status,
    Info,
    Test,
    Echo,
    Groups,
    /// Question for the assistant persona with this display name.
    Ask {
        persona: String,
    },
    MarketData,
    GenerateImage,
    Unrecognized,
}

/// Outcome of classifying a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub command: Command,
    /// Text after the keyword and its separator, trimmed. Empty when absent.
    pub argument: String,
}

impl Classified {
    fn unrecognized() -> Self {
        Self {
            command: Command::Unrecognized,
            argument: String::new(),
        }
    }
}

/// Built-in keywords, in declaration order.
const BUILTINS: &[(&str, Command)] = &[
    ("help", Command::Help),
    ("hallo", Command::Greet),
    ("ping", Command::Ping),
    ("status", Command::Status),
    ("info", Command::Info),
    ("test", Command::Test),
    ("echo", Command::Echo),
    ("groups", Command::Groups),
    ("idx", Command::MarketData),
    ("img", Command::GenerateImage),
];

/// Maps message bodies to commands.
#[derive(Debug, Clone)]
pub struct Classifier {
    prefixes: Vec<char>,
    /// Lowercase keyword table, longest keyword first.
    keywords: Vec<(String, Command)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&['!', '/'], &[])
    }
}

impl Classifier {
    /// Build a classifier from prefix characters and `(keyword, persona name)`
    /// pairs. A persona keyword equal to a built-in (or to an earlier persona)
    /// is ignored.
    pub fn new(prefixes: &[char], personas: &[(String, String)]) -> Self {
        let mut keywords: Vec<(String, Command)> = BUILTINS
            .iter()
            .map(|(kw, cmd)| (kw.to_string(), cmd.clone()))
            .collect();

        for (keyword, name) in personas {
            let keyword = keyword.trim().to_ascii_lowercase();
            if keyword.is_empty() || keywords.iter().any(|(kw, _)| *kw == keyword) {
                tracing::warn!("ignoring persona keyword '{keyword}': empty or already taken");
                continue;
            }
            keywords.push((
                keyword,
                Command::Ask {
                    persona: name.clone(),
                },
            ));
        }

        // Stable: equal-length keywords keep declaration order.
        keywords.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            prefixes: prefixes.to_vec(),
            keywords,
        }
    }

    /// Keywords in matching order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(kw, _)| kw.as_str())
    }

    /// Classify a message body.
    pub fn classify(&self, body: &str) -> Classified {
        let body = body.trim_start();
        let Some(first) = body.chars().next() else {
            return Classified::unrecognized();
        };
        if !self.prefixes.contains(&first) {
            return Classified::unrecognized();
        }
        let rest = &body[first.len_utf8()..];

        for (keyword, command) in &self.keywords {
            let Some(head) = rest.get(..keyword.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(keyword) {
                continue;
            }
            let tail = &rest[keyword.len()..];
            let argument = if tail.starts_with(char::is_whitespace) {
                tail.trim().to_string()
            } else {
                String::new()
            };
            return Classified {
                command: command.clone(),
                argument,
            };
        }

        Classified::unrecognized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(
            &['!', '/'],
            &[
                ("fiq".to_string(), "Fiq".to_string()),
                ("apik".to_string(), "!apik".to_string()),
            ],
        )
    }

    #[test]
    fn test_case_and_prefix_invariance() {
        let c = classifier();
        for body in ["!PING", "!ping", "/ping", "/PiNg"] {
            assert_eq!(c.classify(body).command, Command::Ping, "body {body:?}");
        }
    }

    #[test]
    fn test_every_builtin_keyword() {
        let c = classifier();
        let cases = [
            ("!help", Command::Help),
            ("!hallo", Command::Greet),
            ("!status", Command::Status),
            ("!info", Command::Info),
            ("!test", Command::Test),
            ("!echo hi", Command::Echo),
            ("!groups", Command::Groups),
            ("/idx", Command::MarketData),
            ("/img a cat", Command::GenerateImage),
        ];
        for (body, expected) in cases {
            assert_eq!(c.classify(body).command, expected, "body {body:?}");
        }
    }

    #[test]
    fn test_argument_is_trimmed() {
        let got = classifier().classify("!echo  hello world  ");
        assert_eq!(got.command, Command::Echo);
        assert_eq!(got.argument, "hello world");
    }

    #[test]
    fn test_missing_and_blank_argument_are_identical() {
        let c = classifier();
        assert_eq!(c.classify("!echo"), c.classify("!echo   "));
        assert_eq!(c.classify("!echo").argument, "");
    }

    #[test]
    fn test_argument_preserves_inner_case() {
        let got = classifier().classify("/FIQ What Is Rust?");
        assert_eq!(
            got.command,
            Command::Ask {
                persona: "Fiq".into()
            }
        );
        assert_eq!(got.argument, "What Is Rust?");
    }

    #[test]
    fn test_persona_keywords_map_to_names() {
        let got = classifier().classify("!apik hi");
        assert_eq!(
            got.command,
            Command::Ask {
                persona: "!apik".into()
            }
        );
    }

    #[test]
    fn test_unrecognized_inputs() {
        let c = classifier();
        for body in ["", "   ", "hello", "ping", "#ping", "!", "!unknown", "!hel"] {
            assert_eq!(
                c.classify(body).command,
                Command::Unrecognized,
                "body {body:?}"
            );
        }
    }

    #[test]
    fn test_longer_keyword_wins_over_shared_start() {
        // "in" would shadow "info" if it were tried first.
        let c = Classifier::new(&['!'], &[("in".to_string(), "Inna".to_string())]);
        assert_eq!(c.classify("!info").command, Command::Info);
        assert_eq!(
            c.classify("!in hello").command,
            Command::Ask {
                persona: "Inna".into()
            }
        );
        let order: Vec<&str> = c.keywords().collect();
        let info = order.iter().position(|k| *k == "info").unwrap();
        let inn = order.iter().position(|k| *k == "in").unwrap();
        assert!(info < inn);
    }

    #[test]
    fn test_keyword_order_is_longest_first() {
        let lengths: Vec<usize> = classifier().keywords().map(str::len).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_persona_cannot_shadow_builtin() {
        let c = Classifier::new(&['!'], &[("help".to_string(), "Helper".to_string())]);
        assert_eq!(c.classify("!help").command, Command::Help);
    }

    #[test]
    fn test_keyword_glued_to_text_has_no_argument() {
        let got = classifier().classify("!echohello");
        assert_eq!(got.command, Command::Echo);
        assert_eq!(got.argument, "");
    }

    #[test]
    fn test_non_ascii_body_does_not_panic() {
        let c = classifier();
        assert_eq!(c.classify("!é").command, Command::Unrecognized);
        assert_eq!(c.classify("¡ping").command, Command::Unrecognized);
        assert_eq!(c.classify("!echo héllo").argument, "héllo");
    }
}
