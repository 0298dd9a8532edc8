//! Classification of one input line into the handler that receives it.
//!
//! Routing is pure: [`route`] never touches the session, so the priority
//! order can be tested without any I/O. Exact built-ins are tried first,
//! then the prefix built-ins, and everything else is generic execution.

/// The handler an input line is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Empty,
    List,
    DiskUsage,
    UsbDevices,
    About,
    Troubleshooting,
    /// `capk <package>`, with the package name.
    PackageCheck(&'a str),
    /// `cd` with its (possibly empty) argument.
    ChangeDir(&'a str),
    /// Text after the question sigil.
    Question(&'a str),
    /// Everything else, run through the language classifier.
    Execute(&'a str),
}

const EXACT_BUILTINS: &[(&str, Route<'static>)] = &[
    ("ls", Route::List),
    ("ls -l", Route::List),
    ("ls -la", Route::List),
    ("disk usage", Route::DiskUsage),
    ("df -h", Route::DiskUsage),
    ("lsusb", Route::UsbDevices),
    ("about", Route::About),
    ("troubleshooting", Route::Troubleshooting),
];

/// Splits `line` into a word-delimited command and its argument.
///
/// `cd` matches `cd` and `cd foo` but not `cdrecord`.
fn strip_command<'a>(line: &'a str, command: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(command)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Routes `raw`; `question_sigil` marks AI questions.
///
/// Matching ignores surrounding whitespace, but generic execution receives
/// the line untouched so indentation reaches the interpreter.
pub fn route<'a>(raw: &'a str, question_sigil: &str) -> Route<'a> {
    let line = raw.trim();
    if line.is_empty() {
        return Route::Empty;
    }

    if let Some((_, route)) = EXACT_BUILTINS.iter().find(|(text, _)| *text == line) {
        return *route;
    }

    if let Some(package) = strip_command(line, "capk") {
        return Route::PackageCheck(package);
    }
    if let Some(dir) = strip_command(line, "cd") {
        return Route::ChangeDir(dir);
    }
    if !question_sigil.is_empty() {
        if let Some(question) = line.strip_prefix(question_sigil) {
            return Route::Question(question.trim());
        }
    }

    Route::Execute(raw)
}
