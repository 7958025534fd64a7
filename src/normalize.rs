//! Best-effort conversion of chat text to plain text for a basic Latin font.
//!
//! Math macros are rewritten by a fixed, ordered set of rules; anything the
//! rules do not match (unbalanced braces, unknown macros) is left as-is.

use std::sync::LazyLock;

use regex::Regex;

static UNDERBRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\underbrace\{([^}]+)\}_\{([^}]+)\}").unwrap());
static FRAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\frac\{([^}]+)\}\{([^}]+)\}").unwrap());
static SQRT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\sqrt\{([^}]+)\}").unwrap());
static TEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\text\{([^}]+)\}").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Macro name to ASCII replacement.
const SYMBOLS: &[(&str, &str)] = &[
    ("alpha", "alpha"),
    ("beta", "beta"),
    ("gamma", "gamma"),
    ("delta", "delta"),
    ("theta", "theta"),
    ("pi", "pi"),
    ("Delta", "Delta"),
    ("sigma", "sigma"),
    ("Sigma", "Sigma"),
    ("omega", "omega"),
    ("Omega", "Omega"),
    ("phi", "phi"),
    ("mu", "mu"),
    ("lambda", "lambda"),
    ("rho", "rho"),
    ("epsilon", "epsilon"),
    ("tau", "tau"),
    ("infty", "infinity"),
    ("pm", "+/-"),
    ("approx", "~"),
    ("neq", "!="),
    ("le", "<="),
    ("leq", "<="),
    ("ge", ">="),
    ("geq", ">="),
    ("times", "*"),
    ("cdot", "."),
    ("div", "/"),
    ("circ", "deg"),
    ("degree", "deg"),
    ("rightarrow", "->"),
    ("Rightarrow", "=>"),
    ("implies", "=>"),
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("log", "log"),
    ("ln", "ln"),
];

// A macro name runs to its last letter, so `\le` never matches the start of
// `\left` while `\theta_0` still matches `\theta`.
static MACRO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());

fn symbol_replacement(name: &str) -> Option<&'static str> {
    SYMBOLS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ascii)| *ascii)
}

/// Rewrites math macros into readable ASCII.
///
/// Stages run in order: underbraces (repeated until none remain), one pass of
/// fractions, square roots, `\text{}`, the symbol table, then whitespace
/// collapsing.
pub fn clean_latex(text: &str) -> String {
    let mut cleaned = text.to_string();

    while UNDERBRACE.is_match(&cleaned) {
        cleaned = UNDERBRACE.replace_all(&cleaned, "${1} (${2})").into_owned();
    }

    cleaned = FRAC.replace_all(&cleaned, "(${1})/(${2})").into_owned();
    cleaned = SQRT.replace_all(&cleaned, "sqrt(${1})").into_owned();
    cleaned = TEXT.replace_all(&cleaned, "${1}").into_owned();
    cleaned = MACRO
        .replace_all(&cleaned, |caps: &regex::Captures| {
            match symbol_replacement(&caps[1]) {
                Some(ascii) => format!(" {ascii} "),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    WHITESPACE.replace_all(&cleaned, " ").into_owned()
}

/// Drops emphasis, heading, inline-code and math delimiters, keeping the
/// text they wrap.
pub fn strip_markup(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '#' | '`' | '$'))
        .collect()
}

/// Full normalization applied to transcript text.
///
/// Whitespace is collapsed once more after stripping so that removed markers
/// do not leave double spaces behind.
pub fn clean_text(text: &str) -> String {
    WHITESPACE
        .replace_all(&strip_markup(&clean_latex(text)), " ")
        .into_owned()
}
