//! Symbol translation: embedded math markup → Unicode / plain text.
//!
//! Problem statements write math in a LaTeX dialect (`1 \leq N \leq 10^5`,
//! `\frac{a}{b}`, `A_{i+1}`). PDF readers and text consumers want the symbols,
//! not the commands, so [`translate`] rewrites one math expression into a
//! linear plain-text form:
//!
//! | Markup | Output |
//! |--------|--------|
//! | `\leq`, `\alpha`, `\to` | `≤`, `α`, `→` (table lookup) |
//! | `\frac{a}{b}` | `a/b` (operands parenthesised when compound) |
//! | `\sqrt{x}`, `\sqrt[n]{x}` | `√(x)`, `ⁿ√(x)` |
//! | `x_i`, `x_{i+1}` | `x[i]`, `x[i+1]` |
//! | `x^2`, `x^{n-1}` | `x^2`, `x^(n-1)` |
//! | `\textbf{w}`, `\mathrm{w}` | `w` |
//!
//! Sub- and superscripts become bracketed inline text rather than Unicode
//! sub/superscript glyphs, which few PDF fonts carry.
//!
//! The function is total: an unknown command is emitted unchanged (with its
//! backslash) and logged at `debug`.

use once_cell::sync::Lazy;
use tracing::debug;

/// Command → replacement table.
///
/// Keys include the leading backslash. Lookup is longest-match-first (see
/// [`SORTED_TABLE`]) so `\infty` wins over `\in` and `\leqslant` over `\leq`.
static SYMBOL_TABLE: &[(&str, &str)] = &[
    // ── Comparison ───────────────────────────────────────────────────────
    ("\\leq", "≤"),
    ("\\le", "≤"),
    ("\\leqq", "≦"),
    ("\\leqslant", "⩽"),
    ("\\geq", "≥"),
    ("\\ge", "≥"),
    ("\\geqq", "≧"),
    ("\\geqslant", "⩾"),
    ("\\neq", "≠"),
    ("\\ne", "≠"),
    ("\\lt", "<"),
    ("\\gt", ">"),
    ("\\ll", "≪"),
    ("\\gg", "≫"),
    ("\\approx", "≈"),
    ("\\equiv", "≡"),
    ("\\sim", "∼"),
    ("\\simeq", "≃"),
    ("\\cong", "≅"),
    ("\\propto", "∝"),
    ("\\prec", "≺"),
    ("\\succ", "≻"),
    ("\\preceq", "⪯"),
    ("\\succeq", "⪰"),
    // ── Arithmetic ───────────────────────────────────────────────────────
    ("\\times", "×"),
    ("\\div", "÷"),
    ("\\pm", "±"),
    ("\\mp", "∓"),
    ("\\cdot", "⋅"),
    ("\\ast", "∗"),
    ("\\star", "⋆"),
    ("\\circ", "∘"),
    ("\\bullet", "•"),
    ("\\oplus", "⊕"),
    ("\\ominus", "⊖"),
    ("\\otimes", "⊗"),
    ("\\odot", "⊙"),
    ("\\sum", "∑"),
    ("\\prod", "∏"),
    ("\\coprod", "∐"),
    ("\\int", "∫"),
    ("\\iint", "∬"),
    ("\\oint", "∮"),
    ("\\infty", "∞"),
    ("\\partial", "∂"),
    ("\\nabla", "∇"),
    ("\\mid", "∣"),
    ("\\nmid", "∤"),
    ("\\parallel", "∥"),
    ("\\perp", "⊥"),
    ("\\mod", " mod "),
    ("\\bmod", " mod "),
    ("\\prime", "′"),
    ("\\degree", "°"),
    // ── Sets ─────────────────────────────────────────────────────────────
    ("\\in", "∈"),
    ("\\notin", "∉"),
    ("\\ni", "∋"),
    ("\\subset", "⊂"),
    ("\\supset", "⊃"),
    ("\\subseteq", "⊆"),
    ("\\supseteq", "⊇"),
    ("\\subsetneq", "⊊"),
    ("\\supsetneq", "⊋"),
    ("\\cap", "∩"),
    ("\\cup", "∪"),
    ("\\bigcap", "⋂"),
    ("\\bigcup", "⋃"),
    ("\\setminus", "∖"),
    ("\\emptyset", "∅"),
    ("\\varnothing", "∅"),
    // ── Logic ────────────────────────────────────────────────────────────
    ("\\land", "∧"),
    ("\\wedge", "∧"),
    ("\\lor", "∨"),
    ("\\vee", "∨"),
    ("\\neg", "¬"),
    ("\\lnot", "¬"),
    ("\\forall", "∀"),
    ("\\exists", "∃"),
    ("\\nexists", "∄"),
    ("\\implies", "⟹"),
    ("\\impliedby", "⟸"),
    ("\\iff", "⟺"),
    ("\\therefore", "∴"),
    ("\\because", "∵"),
    ("\\top", "⊤"),
    ("\\bot", "⊥"),
    ("\\xor", "⊕"),
    // ── Greek, lower case ────────────────────────────────────────────────
    ("\\alpha", "α"),
    ("\\beta", "β"),
    ("\\gamma", "γ"),
    ("\\delta", "δ"),
    ("\\epsilon", "ϵ"),
    ("\\varepsilon", "ε"),
    ("\\zeta", "ζ"),
    ("\\eta", "η"),
    ("\\theta", "θ"),
    ("\\vartheta", "ϑ"),
    ("\\iota", "ι"),
    ("\\kappa", "κ"),
    ("\\lambda", "λ"),
    ("\\mu", "μ"),
    ("\\nu", "ν"),
    ("\\xi", "ξ"),
    ("\\omicron", "ο"),
    ("\\pi", "π"),
    ("\\varpi", "ϖ"),
    ("\\rho", "ρ"),
    ("\\varrho", "ϱ"),
    ("\\sigma", "σ"),
    ("\\varsigma", "ς"),
    ("\\tau", "τ"),
    ("\\upsilon", "υ"),
    ("\\phi", "ϕ"),
    ("\\varphi", "φ"),
    ("\\chi", "χ"),
    ("\\psi", "ψ"),
    ("\\omega", "ω"),
    // ── Greek, upper case ────────────────────────────────────────────────
    ("\\Gamma", "Γ"),
    ("\\Delta", "Δ"),
    ("\\Theta", "Θ"),
    ("\\Lambda", "Λ"),
    ("\\Xi", "Ξ"),
    ("\\Pi", "Π"),
    ("\\Sigma", "Σ"),
    ("\\Upsilon", "Υ"),
    ("\\Phi", "Φ"),
    ("\\Psi", "Ψ"),
    ("\\Omega", "Ω"),
    // ── Arrows ───────────────────────────────────────────────────────────
    ("\\to", "→"),
    ("\\rightarrow", "→"),
    ("\\leftarrow", "←"),
    ("\\gets", "←"),
    ("\\leftrightarrow", "↔"),
    ("\\Rightarrow", "⇒"),
    ("\\Leftarrow", "⇐"),
    ("\\Leftrightarrow", "⇔"),
    ("\\longrightarrow", "⟶"),
    ("\\longleftarrow", "⟵"),
    ("\\Longrightarrow", "⟹"),
    ("\\Longleftrightarrow", "⟺"),
    ("\\mapsto", "↦"),
    ("\\uparrow", "↑"),
    ("\\downarrow", "↓"),
    ("\\updownarrow", "↕"),
    ("\\nearrow", "↗"),
    ("\\searrow", "↘"),
    // ── Brackets ─────────────────────────────────────────────────────────
    ("\\{", "{"),
    ("\\}", "}"),
    ("\\lbrace", "{"),
    ("\\rbrace", "}"),
    ("\\lbrack", "["),
    ("\\rbrack", "]"),
    ("\\langle", "⟨"),
    ("\\rangle", "⟩"),
    ("\\lfloor", "⌊"),
    ("\\rfloor", "⌋"),
    ("\\lceil", "⌈"),
    ("\\rceil", "⌉"),
    ("\\lvert", "|"),
    ("\\rvert", "|"),
    ("\\vert", "|"),
    ("\\lVert", "‖"),
    ("\\rVert", "‖"),
    ("\\Vert", "‖"),
    ("\\|", "‖"),
    // ── Dots ─────────────────────────────────────────────────────────────
    ("\\ldots", "…"),
    ("\\dots", "…"),
    ("\\dotsc", "…"),
    ("\\dotsb", "⋯"),
    ("\\cdots", "⋯"),
    ("\\vdots", "⋮"),
    ("\\ddots", "⋱"),
    // ── Named functions ──────────────────────────────────────────────────
    ("\\max", "max"),
    ("\\min", "min"),
    ("\\gcd", "gcd"),
    ("\\lcm", "lcm"),
    ("\\log", "log"),
    ("\\ln", "ln"),
    ("\\lg", "lg"),
    ("\\exp", "exp"),
    ("\\sin", "sin"),
    ("\\cos", "cos"),
    ("\\tan", "tan"),
    ("\\lim", "lim"),
    ("\\sup", "sup"),
    ("\\inf", "inf"),
    ("\\det", "det"),
    ("\\deg", "deg"),
    ("\\dim", "dim"),
    ("\\arg", "arg"),
    // ── Misc symbols ─────────────────────────────────────────────────────
    ("\\angle", "∠"),
    ("\\triangle", "△"),
    ("\\square", "□"),
    ("\\ell", "ℓ"),
    ("\\hbar", "ℏ"),
    ("\\aleph", "ℵ"),
    ("\\dagger", "†"),
    ("\\checkmark", "✓"),
    // ── Spacing ──────────────────────────────────────────────────────────
    ("\\,", " "),
    ("\\;", " "),
    ("\\:", " "),
    ("\\ ", " "),
    ("\\!", ""),
    ("\\quad", " "),
    ("\\qquad", " "),
    ("\\\\", " "),
    // ── Escaped characters ───────────────────────────────────────────────
    ("\\%", "%"),
    ("\\$", "$"),
    ("\\&", "&"),
    ("\\#", "#"),
    ("\\_", "_"),
    // ── Style switches with no visible output ────────────────────────────
    ("\\displaystyle", ""),
    ("\\textstyle", ""),
    ("\\scriptstyle", ""),
    ("\\limits", ""),
    ("\\nolimits", ""),
    ("\\bf", ""),
    ("\\it", ""),
    ("\\rm", ""),
];

/// [`SYMBOL_TABLE`] sorted by descending key length, ties in table order.
static SORTED_TABLE: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut v: Vec<_> = SYMBOL_TABLE.to_vec();
    v.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    v
});

/// The documented command table, in declaration order.
pub fn symbol_table() -> &'static [(&'static str, &'static str)] {
    SYMBOL_TABLE
}

/// Longest table key that `input` starts with.
///
/// A key ending in a letter only matches at a word boundary, so `\in` does
/// not match the start of `\inner`.
fn longest_match(input: &str) -> Option<(&'static str, &'static str)> {
    SORTED_TABLE.iter().copied().find(|(key, _)| {
        if !input.starts_with(key) {
            return false;
        }
        let ends_alpha = key.chars().last().is_some_and(|c| c.is_ascii_alphabetic());
        !ends_alpha
            || !input[key.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
    })
}

/// Translate one math expression to Unicode / plain text.
///
/// Never fails; unknown commands pass through unchanged.
pub fn translate(token: &str) -> String {
    Translator { src: token, pos: 0 }.until(None)
}

// ── Recursive-descent translator ─────────────────────────────────────────

struct Translator<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Translator<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(|c| c == ' ') {
            self.pos += 1;
        }
    }

    /// Translate until `close` (consumed) or end of input.
    fn until(&mut self, close: Option<char>) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if Some(c) == close {
                self.pos += c.len_utf8();
                return out;
            }
            match c {
                '\\' => self.command(&mut out),
                '{' => {
                    self.pos += 1;
                    let inner = self.until(Some('}'));
                    out.push_str(&inner);
                }
                // Unbalanced closing brace.
                '}' => self.pos += 1,
                '_' => {
                    self.pos += 1;
                    let arg = self.argument();
                    let arg = arg.trim();
                    if arg.is_empty() {
                        out.push('_');
                    } else {
                        out.push('[');
                        out.push_str(arg);
                        out.push(']');
                    }
                }
                '^' => {
                    self.pos += 1;
                    let arg = self.argument();
                    push_superscript(&mut out, arg.trim());
                }
                '~' => {
                    self.pos += 1;
                    out.push(' ');
                }
                // Stray inline-math delimiter.
                '$' => self.pos += 1,
                _ => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        out
    }

    /// One macro argument: a `{group}`, a command, or a single character.
    fn argument(&mut self) -> String {
        self.skip_spaces();
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.until(Some('}'))
            }
            Some('\\') => {
                let mut out = String::new();
                self.command(&mut out);
                out
            }
            Some(_) => self.bump().map(String::from).unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Optional `[...]` argument.
    fn optional_argument(&mut self) -> Option<String> {
        self.skip_spaces();
        if self.peek() == Some('[') {
            self.pos += 1;
            Some(self.until(Some(']')))
        } else {
            None
        }
    }

    /// Handle a command starting at the current backslash.
    fn command(&mut self, out: &mut String) {
        let start = self.pos;
        let after = &self.src[start + 1..];
        let name_len: usize = after
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .map(char::len_utf8)
            .sum();
        let name = &after[..name_len];

        if !name.is_empty() && self.structural(name, out) {
            return;
        }

        if let Some((key, value)) = longest_match(self.rest()) {
            self.pos += key.len();
            out.push_str(value);
            return;
        }

        // Unknown: emit verbatim.
        let consumed = if name.is_empty() {
            1 + after.chars().next().map_or(0, char::len_utf8)
        } else {
            1 + name_len
        };
        let raw = &self.src[start..start + consumed];
        debug!(command = raw, "no translation for math command");
        out.push_str(raw);
        self.pos = start + consumed;
    }

    /// Commands that take arguments. Returns false when `name` is not one.
    fn structural(&mut self, name: &str, out: &mut String) -> bool {
        let advance = 1 + name.len();
        match name {
            "frac" | "dfrac" | "tfrac" | "cfrac" => {
                self.pos += advance;
                let num = self.argument();
                let den = self.argument();
                out.push_str(&linear_operand(&num));
                out.push('/');
                out.push_str(&linear_operand(&den));
            }
            "sqrt" => {
                self.pos += advance;
                let index = self.optional_argument();
                let radicand = self.argument();
                if let Some(n) = index {
                    out.push_str(&superscript_index(n.trim()));
                }
                out.push_str("√(");
                out.push_str(radicand.trim());
                out.push(')');
            }
            "binom" | "dbinom" | "tbinom" => {
                self.pos += advance;
                let n = self.argument();
                let k = self.argument();
                out.push_str(&format!("C({}, {})", n.trim(), k.trim()));
            }
            "pmod" => {
                self.pos += advance;
                let m = self.argument();
                out.push_str(&format!(" (mod {})", m.trim()));
            }
            "text" | "textrm" | "textnormal" | "mathrm" | "textbf" | "mathbf" | "textit"
            | "mathit" | "emph" | "texttt" | "mathtt" | "textsf" | "mathsf" | "mathcal"
            | "mathscr" | "mathfrak" | "boldsymbol" | "operatorname" | "mbox" | "hbox"
            | "underline" | "overbrace" | "underbrace" => {
                self.pos += advance;
                let arg = self.argument();
                out.push_str(&arg);
            }
            "mathbb" => {
                self.pos += advance;
                let arg = self.argument();
                out.push_str(&blackboard(arg.trim()));
            }
            "bar" | "overline" | "hat" | "widehat" | "tilde" | "widetilde" | "vec" | "dot"
            | "ddot" => {
                self.pos += advance;
                let arg = self.argument();
                let mark = match name {
                    "bar" => '\u{0304}',
                    "overline" => '\u{0305}',
                    "hat" | "widehat" => '\u{0302}',
                    "tilde" | "widetilde" => '\u{0303}',
                    "vec" => '\u{20D7}',
                    "dot" => '\u{0307}',
                    _ => '\u{0308}',
                };
                for c in arg.trim().chars() {
                    out.push(c);
                    out.push(mark);
                }
            }
            "left" | "right" | "middle" | "big" | "Big" | "bigg" | "Bigg" | "bigl" | "bigr"
            | "Bigl" | "Bigr" | "biggl" | "biggr" | "Biggl" | "Biggr" => {
                self.pos += advance;
                self.skip_spaces();
                // `\left.` is an invisible delimiter.
                if self.peek() == Some('.') {
                    self.pos += 1;
                }
            }
            "not" => {
                self.pos += advance;
                self.skip_spaces();
                let arg = self.argument();
                match arg.as_str() {
                    "=" => out.push('≠'),
                    "∈" => out.push('∉'),
                    "<" => out.push('≮'),
                    ">" => out.push('≯'),
                    "≤" => out.push('≰'),
                    "≥" => out.push('≱'),
                    "⊂" => out.push('⊄'),
                    "⊆" => out.push('⊈'),
                    other => {
                        out.push_str(other);
                        out.push('\u{0338}');
                    }
                }
            }
            _ => return false,
        }
        true
    }
}

/// `a` stays `a`, `a+b` becomes `(a+b)` so `a/b` stays unambiguous.
fn linear_operand(s: &str) -> String {
    let s = s.trim();
    let simple = s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '[' || c == ']');
    if simple && !s.is_empty() {
        s.to_string()
    } else {
        format!("({s})")
    }
}

fn push_superscript(out: &mut String, arg: &str) {
    match arg {
        "" => out.push('^'),
        "′" | "″" | "∗" | "*" => out.push_str(arg),
        _ if arg.chars().all(|c| c.is_alphanumeric()) => {
            out.push('^');
            out.push_str(arg);
        }
        _ => {
            out.push_str("^(");
            out.push_str(arg);
            out.push(')');
        }
    }
}

/// Root index as superscript glyphs (`3` → `³`), or plain text if any
/// character has no superscript form.
fn superscript_index(n: &str) -> String {
    let mapped: Option<String> = n
        .chars()
        .map(|c| match c {
            '0' => Some('⁰'),
            '1' => Some('¹'),
            '2' => Some('²'),
            '3' => Some('³'),
            '4' => Some('⁴'),
            '5' => Some('⁵'),
            '6' => Some('⁶'),
            '7' => Some('⁷'),
            '8' => Some('⁸'),
            '9' => Some('⁹'),
            'n' => Some('ⁿ'),
            'i' => Some('ⁱ'),
            '+' => Some('⁺'),
            '-' => Some('⁻'),
            _ => None,
        })
        .collect();
    mapped.unwrap_or_else(|| n.to_string())
}

fn blackboard(arg: &str) -> String {
    match arg {
        "R" => "ℝ".to_string(),
        "N" => "ℕ".to_string(),
        "Z" => "ℤ".to_string(),
        "Q" => "ℚ".to_string(),
        "C" => "ℂ".to_string(),
        "P" => "ℙ".to_string(),
        other => other.to_string(),
    }
}
